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

use std::sync::Arc;

use tracing::trace;

use super::{
    call_counter::CallCounter, call_tracker::ClusterImplCallTracker, drop_config::DropDecision,
    subchannel::StatsSubchannel,
};
use crate::{
    load_report::DropStatsSink,
    policy::{PickArgs, PickResult, Picker, Status},
};

pub const CIRCUIT_BREAKER_DROP: &str = "circuit breaker drop";
pub const NO_CHILD_PICKER: &str = "cluster_impl picker not given any child picker";

pub fn eds_drop_message(category: &str) -> String {
    format!("EDS-configured drop: {category}")
}

/// Snapshot of everything a pick needs. Built on the control plane, then only read.
#[derive(Debug)]
pub struct ClusterImplPicker {
    call_counter: CallCounter,
    max_concurrent_requests: u32,
    drop_config: Arc<dyn DropDecision>,
    drop_stats: Option<Arc<dyn DropStatsSink>>,
    picker: Option<Arc<dyn Picker>>,
}

impl ClusterImplPicker {
    pub fn new(
        call_counter: CallCounter,
        max_concurrent_requests: u32,
        drop_config: Arc<dyn DropDecision>,
        drop_stats: Option<Arc<dyn DropStatsSink>>,
        picker: Option<Arc<dyn Picker>>,
    ) -> Self {
        Self { call_counter, max_concurrent_requests, drop_config, drop_stats, picker }
    }
}

impl Picker for ClusterImplPicker {
    fn pick(&self, args: &PickArgs<'_>) -> PickResult {
        if let Some(category) = self.drop_config.should_drop() {
            if let Some(drop_stats) = &self.drop_stats {
                drop_stats.add_call_dropped(category);
            }
            trace!(category, path = args.path, "dropping call");
            return PickResult::Drop(Status::unavailable(eds_drop_message(category)));
        }

        // Load and later increment are not atomic together: concurrent picks can all pass the
        // check and overshoot the limit by a few calls.
        if self.call_counter.load() >= self.max_concurrent_requests {
            if let Some(drop_stats) = &self.drop_stats {
                drop_stats.add_uncategorized_drop();
            }
            trace!(max = self.max_concurrent_requests, path = args.path, "circuit breaker open");
            return PickResult::Drop(Status::unavailable(CIRCUIT_BREAKER_DROP));
        }

        let Some(picker) = &self.picker else {
            return PickResult::Fail(Status::internal(NO_CHILD_PICKER));
        };

        match picker.pick(args) {
            PickResult::Complete(mut complete) => {
                let (subchannel, locality_stats) =
                    match complete.subchannel.as_any().downcast_ref::<StatsSubchannel>() {
                        Some(wrapper) => (Arc::clone(wrapper.wrapped()), Some(Arc::clone(wrapper.locality_stats()))),
                        None => (Arc::clone(&complete.subchannel), None),
                    };
                complete.subchannel = subchannel;
                complete.call_tracker = Some(Box::new(ClusterImplCallTracker::new(
                    complete.call_tracker.take(),
                    locality_stats,
                    self.call_counter.clone(),
                )));
                PickResult::Complete(complete)
            },
            other => other,
        }
    }
}
