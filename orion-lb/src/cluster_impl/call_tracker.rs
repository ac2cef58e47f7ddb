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

use super::call_counter::CallCounter;
use crate::{
    load_report::LocalityStatsSink,
    policy::{CallTracker, Status},
};

/// Wraps the child's tracker with in-flight counting and locality accounting.
///
/// On start the counter and locality stats are updated before the wrapped tracker runs; on finish
/// the wrapped tracker runs first. The counter thus covers the whole lifetime the child sees.
pub struct ClusterImplCallTracker {
    wrapped: Option<Box<dyn CallTracker>>,
    locality_stats: Option<Arc<dyn LocalityStatsSink>>,
    call_counter: CallCounter,
    #[cfg(debug_assertions)]
    started: bool,
}

impl ClusterImplCallTracker {
    pub fn new(
        wrapped: Option<Box<dyn CallTracker>>,
        locality_stats: Option<Arc<dyn LocalityStatsSink>>,
        call_counter: CallCounter,
    ) -> Self {
        Self {
            wrapped,
            locality_stats,
            call_counter,
            #[cfg(debug_assertions)]
            started: false,
        }
    }
}

impl CallTracker for ClusterImplCallTracker {
    fn start(&mut self) {
        self.call_counter.increment();
        if let Some(stats) = &self.locality_stats {
            stats.add_call_started();
        }
        if let Some(wrapped) = &mut self.wrapped {
            wrapped.start();
        }
        #[cfg(debug_assertions)]
        {
            debug_assert!(!self.started, "call tracker started twice");
            self.started = true;
        }
    }

    fn finish(&mut self, status: &Status) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.started, "call tracker finished before it was started");
            self.started = false;
        }
        if let Some(wrapped) = &mut self.wrapped {
            wrapped.finish(status);
        }
        if let Some(stats) = &self.locality_stats {
            stats.add_call_finished(!status.is_ok());
        }
        self.call_counter.decrement();
    }
}

#[cfg(debug_assertions)]
impl Drop for ClusterImplCallTracker {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(!self.started, "call tracker dropped while the call was in flight");
        }
    }
}
