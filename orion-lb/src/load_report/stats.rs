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
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use compact_str::CompactString;
use dashmap::DashMap;
use serde::Serialize;

use super::{DropStatsSink, LocalityStatsSink};

#[derive(Debug, Default)]
pub struct ClusterDropStats {
    uncategorized: AtomicU64,
    categorized: DashMap<CompactString, AtomicU64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DropStatsSnapshot {
    pub uncategorized_drops: u64,
    pub categorized_drops: BTreeMap<CompactString, u64>,
}

impl DropStatsSnapshot {
    pub fn total(&self) -> u64 {
        self.uncategorized_drops + self.categorized_drops.values().sum::<u64>()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl ClusterDropStats {
    pub fn snapshot_and_reset(&self) -> DropStatsSnapshot {
        let categorized_drops = self
            .categorized
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().swap(0, Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();
        DropStatsSnapshot { uncategorized_drops: self.uncategorized.swap(0, Ordering::Relaxed), categorized_drops }
    }
}

impl DropStatsSink for ClusterDropStats {
    fn add_uncategorized_drop(&self) {
        self.uncategorized.fetch_add(1, Ordering::Relaxed);
    }

    fn add_call_dropped(&self, category: &str) {
        if let Some(counter) = self.categorized.get(category) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            self.categorized.entry(category.into()).or_default().fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Default)]
pub struct ClusterLocalityStats {
    total_issued_requests: AtomicU64,
    total_successful_requests: AtomicU64,
    total_error_requests: AtomicU64,
    total_requests_in_progress: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocalityStatsSnapshot {
    pub total_issued_requests: u64,
    pub total_successful_requests: u64,
    pub total_error_requests: u64,
    /// A gauge: not reset by snapshots.
    pub total_requests_in_progress: u64,
}

impl LocalityStatsSnapshot {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl ClusterLocalityStats {
    pub fn requests_in_progress(&self) -> u64 {
        self.total_requests_in_progress.load(Ordering::Relaxed)
    }

    pub fn snapshot_and_reset(&self) -> LocalityStatsSnapshot {
        LocalityStatsSnapshot {
            total_issued_requests: self.total_issued_requests.swap(0, Ordering::Relaxed),
            total_successful_requests: self.total_successful_requests.swap(0, Ordering::Relaxed),
            total_error_requests: self.total_error_requests.swap(0, Ordering::Relaxed),
            total_requests_in_progress: self.total_requests_in_progress.load(Ordering::Relaxed),
        }
    }
}

impl LocalityStatsSink for ClusterLocalityStats {
    fn add_call_started(&self) {
        self.total_issued_requests.fetch_add(1, Ordering::Relaxed);
        self.total_requests_in_progress.fetch_add(1, Ordering::Relaxed);
    }

    fn add_call_finished(&self, failed: bool) {
        let finished = if failed { &self.total_error_requests } else { &self.total_successful_requests };
        finished.fetch_add(1, Ordering::Relaxed);
        self.total_requests_in_progress.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_are_reset_by_snapshots() {
        let stats = ClusterDropStats::default();
        stats.add_uncategorized_drop();
        stats.add_call_dropped("lb");
        stats.add_call_dropped("lb");
        stats.add_call_dropped("throttle");

        let snapshot = stats.snapshot_and_reset();
        assert_eq!(snapshot.uncategorized_drops, 1);
        assert_eq!(snapshot.categorized_drops.get("lb"), Some(&2));
        assert_eq!(snapshot.categorized_drops.get("throttle"), Some(&1));
        assert_eq!(snapshot.total(), 4);

        assert!(stats.snapshot_and_reset().is_empty());
    }

    #[test]
    fn in_progress_survives_snapshots() {
        let stats = ClusterLocalityStats::default();
        stats.add_call_started();
        stats.add_call_started();
        stats.add_call_finished(true);

        let snapshot = stats.snapshot_and_reset();
        assert_eq!(
            snapshot,
            LocalityStatsSnapshot {
                total_issued_requests: 2,
                total_successful_requests: 0,
                total_error_requests: 1,
                total_requests_in_progress: 1,
            }
        );

        stats.add_call_finished(false);
        let snapshot = stats.snapshot_and_reset();
        assert_eq!(snapshot.total_successful_requests, 1);
        assert_eq!(snapshot.total_requests_in_progress, 0);
    }
}
