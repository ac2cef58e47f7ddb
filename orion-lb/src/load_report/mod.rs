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

//! Load report accounting: what a cluster-impl policy records, and a store that aggregates it.

mod stats;
mod store;

use std::{fmt::Debug, sync::Arc};

use orion_lb_config::config::{Locality, LoadReportingServer};

pub use stats::{ClusterDropStats, ClusterLocalityStats, DropStatsSnapshot, LocalityStatsSnapshot};
pub use store::{ClusterLoadReport, LoadReportStore, LocalityLoadReport};

/// Receives the calls a cluster-impl picker drops.
pub trait DropStatsSink: Debug + Send + Sync {
    /// Dropped by the circuit breaker.
    fn add_uncategorized_drop(&self);
    /// Dropped under an EDS drop category.
    fn add_call_dropped(&self, category: &str);
}

/// Receives the calls sent to the backends of one locality.
pub trait LocalityStatsSink: Debug + Send + Sync {
    fn add_call_started(&self);
    fn add_call_finished(&self, failed: bool);
}

/// The client that reports load to an LRS server. Either lookup may fail, in which case the
/// caller carries on without reporting.
pub trait LoadReporter: Send + Sync {
    fn add_drop_stats(
        &self,
        server: &LoadReportingServer,
        cluster: &str,
        eds_service_name: &str,
    ) -> Option<Arc<dyn DropStatsSink>>;

    fn add_locality_stats(
        &self,
        server: &LoadReportingServer,
        cluster: &str,
        eds_service_name: &str,
        locality: Option<Arc<Locality>>,
    ) -> Option<Arc<dyn LocalityStatsSink>>;
}
