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
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
};

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(about = "Drives synthetic traffic through a cluster-impl load balancer")]
pub struct Options {
    #[arg(help = "Configuration file", short = 'c', long = "config")]
    pub config: PathBuf,
    #[arg(help = "Total number of picks to issue", short = 'n', long = "requests")]
    pub requests: Option<NonZeroUsize>,
    #[arg(help = "Number of concurrent workers issuing picks", short = 'w', long = "workers")]
    pub workers: Option<NonZeroUsize>,
    #[arg(help = "Milliseconds between two load reports", long = "report-interval-ms")]
    pub report_interval_ms: Option<NonZeroU64>,
    #[arg(
        help = "Specify the queue length (channel) toward the policy worker",
        long = "policy-queue-length",
        default_value_t = NonZeroUsize::MIN.saturating_add(127)
    )]
    pub policy_queue_length: NonZeroUsize,
}

impl Options {
    pub fn parse_options() -> Self {
        Options::parse()
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config: path.into(),
            requests: None,
            workers: None,
            report_interval_ms: None,
            policy_queue_length: NonZeroUsize::MIN.saturating_add(127),
        }
    }
}
