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

//! In-flight request counters shared by every policy instance balancing the same cluster.
//!
//! Circuit breaking limits concurrent requests per cluster, not per policy instance, so two
//! policies built for the same (cluster, EDS service) pair must see the same counter. The registry
//! only keeps weak entries: a counter lives as long as some picker or call tracker holds it.

use std::{
    collections::HashMap,
    fmt::Debug,
    ptr,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, LazyLock, Weak,
    },
};

use compact_str::CompactString;
use parking_lot::Mutex;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey {
    pub cluster: CompactString,
    pub eds_service_name: CompactString,
}

impl ClusterKey {
    pub fn new(cluster: impl Into<CompactString>, eds_service_name: impl Into<CompactString>) -> Self {
        Self { cluster: cluster.into(), eds_service_name: eds_service_name.into() }
    }
}

type CounterMap = HashMap<ClusterKey, Weak<CounterShared>>;

static CALL_COUNTERS: LazyLock<CallCounterRegistry> = LazyLock::new(CallCounterRegistry::new);

#[derive(Debug, Clone, Default)]
pub struct CallCounterRegistry {
    map: Arc<Mutex<CounterMap>>,
}

impl CallCounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Self {
        &CALL_COUNTERS
    }

    /// Returns the live counter for `key`, or installs a fresh one if there is none.
    ///
    /// An entry whose counter is being released is stale: it can no longer be upgraded and is
    /// replaced here. The releasing counter then leaves the new entry alone.
    pub fn get_or_create(&self, cluster: &str, eds_service_name: &str) -> CallCounter {
        let key = ClusterKey::new(cluster, eds_service_name);
        let mut map = self.map.lock();
        if let Some(existing) = map.get(&key).and_then(Weak::upgrade) {
            return CallCounter(existing);
        }
        let stale = map.contains_key(&key);
        let counter = Arc::new(CounterShared {
            key: key.clone(),
            in_flight: AtomicU32::new(0),
            registry: Arc::downgrade(&self.map),
        });
        map.insert(key, Arc::downgrade(&counter));
        debug!(cluster, eds_service_name, stale, "created call counter");
        CallCounter(counter)
    }

    /// Number of entries, live or stale.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct CounterShared {
    key: ClusterKey,
    in_flight: AtomicU32,
    registry: Weak<Mutex<CounterMap>>,
}

impl Debug for CounterShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallCounter")
            .field("key", &self.key)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl Drop for CounterShared {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let this: *const Self = self;
        let mut map = registry.lock();
        let is_current = map.get(&self.key).is_some_and(|entry| ptr::eq(entry.as_ptr(), this));
        if is_current {
            map.remove(&self.key);
        }
    }
}

/// Strong handle on a cluster's in-flight counter.
#[derive(Debug, Clone)]
pub struct CallCounter(Arc<CounterShared>);

impl CallCounter {
    pub fn key(&self) -> &ClusterKey {
        &self.0.key
    }

    pub fn load(&self) -> u32 {
        self.0.in_flight.load(Ordering::Acquire)
    }

    pub fn increment(&self) {
        self.0.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decrement(&self) {
        let result = self.0.in_flight.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        debug_assert!(result.is_ok(), "call counter for {:?} decremented below zero", self.0.key);
        if result.is_err() {
            error!(key = ?self.0.key, "call counter decremented below zero");
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
