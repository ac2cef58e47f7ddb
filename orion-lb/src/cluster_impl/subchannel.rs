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

use std::{any::Any, sync::Arc};

use crate::{
    load_report::LocalityStatsSink,
    policy::{EndpointAddress, Subchannel},
};

/// A subchannel that remembers which locality stats its calls are reported to.
///
/// The picker unwraps it before handing the subchannel to the channel.
#[derive(Debug)]
pub struct StatsSubchannel {
    wrapped: Arc<dyn Subchannel>,
    locality_stats: Arc<dyn LocalityStatsSink>,
}

impl StatsSubchannel {
    pub fn new(wrapped: Arc<dyn Subchannel>, locality_stats: Arc<dyn LocalityStatsSink>) -> Self {
        Self { wrapped, locality_stats }
    }

    pub fn wrapped(&self) -> &Arc<dyn Subchannel> {
        &self.wrapped
    }

    pub fn locality_stats(&self) -> &Arc<dyn LocalityStatsSink> {
        &self.locality_stats
    }
}

impl Subchannel for StatsSubchannel {
    fn address(&self) -> &EndpointAddress {
        self.wrapped.address()
    }

    fn request_connection(&self) {
        self.wrapped.request_connection();
    }

    fn reset_backoff(&self) {
        self.wrapped.reset_backoff();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
