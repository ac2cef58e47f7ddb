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

//! The `xds_cluster_impl` balancer: sits between the cluster's child policy and the channel and
//! applies per-cluster circuit breaking, EDS drop categories and per-locality load reporting.

pub mod call_counter;
mod call_tracker;
pub mod drop_config;
mod helper;
pub mod picker;
mod policy;
pub mod subchannel;


pub use call_counter::{CallCounter, CallCounterRegistry, ClusterKey};
pub use call_tracker::ClusterImplCallTracker;
pub use drop_config::{DropConfig, DropDecision};
pub use picker::ClusterImplPicker;
pub use policy::{ClusterImplArgs, ClusterImplPolicy, ClusterImplUpdate, PolicyPhase};
pub use subchannel::StatsSubchannel;
