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

pub mod channel;
pub mod child;
pub mod cluster_impl;
mod error;
pub mod load_report;
pub mod policy;
pub mod policy_worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use channel::Channel;
pub use cluster_impl::{ClusterImplArgs, ClusterImplPolicy, ClusterImplUpdate};
pub use error::{Error, IdentityField};
pub use load_report::LoadReportStore;
pub use policy_worker::{spawn_policy, PolicyHandle};

pub type Result<T> = ::core::result::Result<T, Error>;
