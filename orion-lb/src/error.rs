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

use std::fmt::Display;

use compact_str::CompactString;

use crate::policy::Status;

/// Configuration fields that identify the stats a policy instance reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    ClusterName,
    EdsServiceName,
    LrsServer,
}

impl Display for IdentityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ClusterName => "cluster name",
            Self::EdsServiceName => "EDS service name",
            Self::LrsServer => "LRS server",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cluster_impl policy requires a load reporting client")]
    MissingLoadReporter,
    /// The parent changed a field that is fixed for the policy's lifetime; it has to build a new
    /// policy instead.
    #[error("invariant violation: {field} changed from {previous:?} to {current:?}")]
    InvariantViolation { field: IdentityField, previous: CompactString, current: CompactString },
    #[error("unknown child policy {0}")]
    UnknownChildPolicy(CompactString),
    #[error("child policy rejected update: {0}")]
    ChildPolicy(Status),
    #[error("policy worker has exited")]
    WorkerClosed,
}

impl Error {
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}
