// SPDX-FileCopyrightText: © 2025 Huawei Cloud Computing Technologies Co., Ltd
// SPDX-License-Identifier: Apache-2.0
//
// Copyright 2025 Huawei Cloud Computing Technologies Co., Ltd
//
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//

pub mod cluster_impl;
pub use cluster_impl::{ClusterImplConfig, DropCategory, LbPolicyConfig, LoadReportingServer};
pub mod common;
pub mod core;
pub use self::core::Locality;
pub mod log;
pub use log::LogConfig;

pub use crate::config::common::*;
use crate::{options::Options, Result};
use compact_str::CompactString;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs::File, net::SocketAddr, num::NonZeroUsize, path::Path, time::Duration};

/// Top level document read by the simulator.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(skip_serializing_if = "is_default", default)]
    pub logging: LogConfig,
    pub cluster: Cluster,
    #[serde(skip_serializing_if = "is_default", default)]
    pub load_reporting: LoadReporting,
    #[serde(default)]
    pub traffic: Traffic,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Cluster {
    #[serde(default = "default_authority")]
    pub authority: CompactString,
    pub policy: ClusterImplConfig,
    pub endpoints: Vec<Endpoint>,
}

fn default_authority() -> CompactString {
    CompactString::const_new("localhost")
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Endpoint {
    pub address: SocketAddr,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub locality: Option<Locality>,
}

/// Load reporting servers the simulated control plane knows about. Clusters pointing at any other
/// server get no stats.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoadReporting {
    #[serde(skip_serializing_if = "is_default", default)]
    pub servers: Vec<CompactString>,
    #[serde(with = "humantime_serde", default = "default_report_interval")]
    pub report_interval: Duration,
}

fn default_report_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for LoadReporting {
    fn default() -> Self {
        Self { servers: Vec::new(), report_interval: default_report_interval() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Traffic {
    pub requests: NonZeroUsize,
    pub workers: NonZeroUsize,
    /// Fraction of admitted calls that finish with an error.
    pub failure_ratio: f64,
    #[serde(with = "humantime_serde")]
    pub min_latency: Duration,
    #[serde(with = "humantime_serde")]
    pub max_latency: Duration,
}

impl Default for Traffic {
    fn default() -> Self {
        Self {
            requests: NonZeroUsize::MIN.saturating_add(999),
            workers: NonZeroUsize::MIN.saturating_add(3),
            failure_ratio: 0.0,
            min_latency: Duration::from_millis(1),
            max_latency: Duration::from_millis(10),
        }
    }
}

impl Config {
    fn apply_options(self, opt: &Options) -> Self {
        let traffic = Traffic {
            requests: opt.requests.unwrap_or(self.traffic.requests),
            workers: opt.workers.unwrap_or(self.traffic.workers),
            ..self.traffic
        };
        if traffic.min_latency > traffic.max_latency {
            tracing::warn!(
                min_latency = ?traffic.min_latency,
                max_latency = ?traffic.max_latency,
                "min_latency is above max_latency, calls will use min_latency"
            );
        }
        if !(0.0..=1.0).contains(&traffic.failure_ratio) {
            tracing::warn!(failure_ratio = traffic.failure_ratio, "failure_ratio will be clamped to [0, 1]");
        }
        let load_reporting = LoadReporting {
            report_interval: opt
                .report_interval_ms
                .map_or(self.load_reporting.report_interval, |ms| Duration::from_millis(ms.get())),
            ..self.load_reporting
        };
        Self { traffic, load_reporting, ..self }
    }

    pub fn new(opt: &Options) -> Result<Self> {
        deserialize_yaml::<Self>(&opt.config).map(|conf| conf.apply_options(opt))
    }
}

pub fn deserialize_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    serde_path_to_error::deserialize(serde_yaml::Deserializer::from_reader(&file)).map_err(crate::Error::from)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    #[test]
    fn new_loads_the_file_and_applies_overrides() {
        let mut options = Options::from_path("tests/config.yaml");
        options.workers = NonZeroUsize::new(2);
        options.report_interval_ms = std::num::NonZeroU64::new(50);
        let config = Config::new(&options).unwrap();
        assert_eq!(config.cluster.policy.cluster_name, "backend");
        assert_eq!(config.traffic.workers.get(), 2);
        assert_eq!(config.traffic.requests.get(), 2000);
        assert_eq!(config.load_reporting.report_interval, Duration::from_millis(50));
    }
}
