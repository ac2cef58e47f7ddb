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

//! Contracts between a load-balancing policy, the policies nested under it and the channel above.

pub mod picker;
pub mod status;
pub mod subchannel;

use std::{collections::BTreeMap, sync::Arc};

use compact_str::CompactString;
use orion_lb_config::config::LbPolicyConfig;

pub use picker::{CallTracker, CompletePick, FailPicker, PickArgs, PickResult, Picker, QueuePicker};
pub use status::{ConnectivityState, Status, StatusCode};
pub use subchannel::{EndpointAddress, Subchannel};

/// Channel argument carrying the name of the cluster a child policy balances.
pub const ARG_CLUSTER_NAME: &str = "orion.lb.cluster_name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceSeverity {
    Info,
    Warning,
    Error,
}

/// Free-form string attributes passed down the policy tree along with an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelArgs(BTreeMap<CompactString, CompactString>);

impl ChannelArgs {
    #[must_use]
    pub fn with(mut self, key: impl Into<CompactString>, value: impl Into<CompactString>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(CompactString::as_str)
    }
}

/// A resolver result plus the policy config that applies to it.
#[derive(Debug, Clone)]
pub struct UpdateArgs<C = LbPolicyConfig> {
    pub addresses: Result<Vec<EndpointAddress>, Status>,
    pub config: C,
    pub args: ChannelArgs,
}

/// Callbacks a policy uses to reach the layer above it.
///
/// Every method except [`ChannelControlHelper::authority`] is only called from the control-plane
/// work queue.
pub trait ChannelControlHelper: Send + Sync {
    fn create_subchannel(&self, address: EndpointAddress) -> Option<Arc<dyn Subchannel>>;
    fn update_state(&self, state: ConnectivityState, status: Status, picker: Arc<dyn Picker>);
    fn request_reresolution(&self);
    fn authority(&self) -> CompactString;
    fn add_trace_event(&self, severity: TraceSeverity, message: &str);
}

pub trait LoadBalancingPolicy: Send {
    fn name(&self) -> &'static str;
    fn update(&mut self, args: UpdateArgs) -> Result<(), Status>;
    fn exit_idle(&mut self);
    fn reset_backoff(&mut self);
    fn shutdown(&mut self);
}

pub trait LoadBalancingPolicyFactory: Send + Sync {
    fn name(&self) -> &'static str;
    fn create(&self, helper: Arc<dyn ChannelControlHelper>) -> Box<dyn LoadBalancingPolicy>;
}
