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

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::{Duration, Instant},
};

use compact_str::CompactString;
use orion_lb_config::config::{Locality, LoadReportingServer};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::{
    ClusterDropStats, ClusterLocalityStats, DropStatsSink, DropStatsSnapshot, LoadReporter, LocalityStatsSink,
    LocalityStatsSnapshot,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct StatsKey {
    server_uri: CompactString,
    cluster: CompactString,
    eds_service_name: CompactString,
}

#[derive(Debug)]
struct ClusterEntry {
    drop_stats: Option<Arc<ClusterDropStats>>,
    locality_stats: BTreeMap<Locality, Arc<ClusterLocalityStats>>,
    last_report: Instant,
}

impl ClusterEntry {
    fn new() -> Self {
        Self { drop_stats: None, locality_stats: BTreeMap::new(), last_report: Instant::now() }
    }

    fn is_unused(&self) -> bool {
        self.drop_stats.is_none() && self.locality_stats.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalityLoadReport {
    pub locality: Locality,
    #[serde(flatten)]
    pub stats: LocalityStatsSnapshot,
}

/// Everything recorded for one (server, cluster, EDS service) since the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterLoadReport {
    pub server_uri: CompactString,
    pub cluster: CompactString,
    pub eds_service_name: CompactString,
    pub drops: DropStatsSnapshot,
    pub localities: Vec<LocalityLoadReport>,
    pub load_report_interval: Duration,
}

impl ClusterLoadReport {
    pub fn locality(&self, locality: &Locality) -> Option<&LocalityStatsSnapshot> {
        self.localities.iter().find(|report| &report.locality == locality).map(|report| &report.stats)
    }
}

/// In-process stand-in for an LRS client: hands out stats sinks and turns them into reports.
///
/// Only the configured servers are known; asking for stats on any other server yields nothing.
#[derive(Debug, Default)]
pub struct LoadReportStore {
    servers: BTreeSet<CompactString>,
    clusters: Mutex<BTreeMap<StatsKey, ClusterEntry>>,
}

impl LoadReportStore {
    pub fn new<S: Into<CompactString>>(servers: impl IntoIterator<Item = S>) -> Self {
        Self { servers: servers.into_iter().map(Into::into).collect(), clusters: Mutex::default() }
    }

    fn key(&self, server: &LoadReportingServer, cluster: &str, eds_service_name: &str) -> Option<StatsKey> {
        self.servers.contains(&server.server_uri).then(|| StatsKey {
            server_uri: server.server_uri.clone(),
            cluster: cluster.into(),
            eds_service_name: eds_service_name.into(),
        })
    }

    /// Collects and resets the counters of every cluster, then forgets the stats nobody holds
    /// anymore. Clusters with nothing to report are left out.
    pub fn take_snapshot(&self) -> Vec<ClusterLoadReport> {
        let now = Instant::now();
        let mut clusters = self.clusters.lock();
        let mut reports = Vec::new();
        for (key, entry) in clusters.iter_mut() {
            // Decided before snapshotting: a sink only the store holds can no longer be written to.
            let drops_released = entry.drop_stats.as_ref().is_some_and(|stats| Arc::strong_count(stats) == 1);
            let localities_released: Vec<Locality> = entry
                .locality_stats
                .iter()
                .filter(|(_, stats)| Arc::strong_count(stats) == 1 && stats.requests_in_progress() == 0)
                .map(|(locality, _)| locality.clone())
                .collect();

            let drops = entry.drop_stats.as_ref().map(|stats| stats.snapshot_and_reset()).unwrap_or_default();
            let localities: Vec<_> = entry
                .locality_stats
                .iter()
                .map(|(locality, stats)| LocalityLoadReport { locality: locality.clone(), stats: stats.snapshot_and_reset() })
                .filter(|report| !report.stats.is_empty())
                .collect();
            let load_report_interval = now.duration_since(entry.last_report);
            entry.last_report = now;

            if drops_released {
                entry.drop_stats = None;
            }
            for locality in &localities_released {
                entry.locality_stats.remove(locality);
            }

            if !drops.is_empty() || !localities.is_empty() {
                reports.push(ClusterLoadReport {
                    server_uri: key.server_uri.clone(),
                    cluster: key.cluster.clone(),
                    eds_service_name: key.eds_service_name.clone(),
                    drops,
                    localities,
                    load_report_interval,
                });
            }
        }
        let before = clusters.len();
        clusters.retain(|_, entry| !entry.is_unused());
        if clusters.len() != before {
            debug!(removed = before - clusters.len(), "pruned unused load report entries");
        }
        reports
    }
}

impl LoadReporter for LoadReportStore {
    fn add_drop_stats(
        &self,
        server: &LoadReportingServer,
        cluster: &str,
        eds_service_name: &str,
    ) -> Option<Arc<dyn DropStatsSink>> {
        let key = self.key(server, cluster, eds_service_name)?;
        let mut clusters = self.clusters.lock();
        let entry = clusters.entry(key).or_insert_with(ClusterEntry::new);
        let stats = entry.drop_stats.get_or_insert_with(Arc::default);
        Some(Arc::clone(stats) as Arc<dyn DropStatsSink>)
    }

    fn add_locality_stats(
        &self,
        server: &LoadReportingServer,
        cluster: &str,
        eds_service_name: &str,
        locality: Option<Arc<Locality>>,
    ) -> Option<Arc<dyn LocalityStatsSink>> {
        let key = self.key(server, cluster, eds_service_name)?;
        let locality = locality.map(|locality| Locality::clone(&locality)).unwrap_or_default();
        let mut clusters = self.clusters.lock();
        let entry = clusters.entry(key).or_insert_with(ClusterEntry::new);
        let stats = entry.locality_stats.entry(locality).or_default();
        Some(Arc::clone(stats) as Arc<dyn LocalityStatsSink>)
    }
}
