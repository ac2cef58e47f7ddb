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

use std::num::NonZeroUsize;

use orion_lb_config::{config::Config, options::Options};
use orion_lb_sim::Simulation;
use tracing_test::traced_test;

fn load(file_path: &str, requests: usize) -> Config {
    // file_path is relative to crate root
    let mut options = Options::from_path(file_path);
    options.requests = NonZeroUsize::new(requests);
    Config::new(&options).unwrap()
}

#[traced_test]
#[test]
fn shipped_config_parses() {
    let config = load("conf/sim.yaml", 100);
    assert_eq!(config.cluster.policy.cluster_name, "echo");
    assert_eq!(config.cluster.endpoints.len(), 3);
    assert_eq!(config.traffic.requests.get(), 100);
    assert_eq!(config.load_reporting.servers, ["lrs.example.com:443"]);
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn shipped_config_runs() {
    let Config { cluster, load_reporting, traffic, .. } = load("conf/sim.yaml", 300);
    let outcome =
        Simulation::new(cluster, load_reporting, traffic, NonZeroUsize::MIN).run().await.unwrap();
    assert_eq!(outcome.admitted() + outcome.dropped() + outcome.rejected, 300);
    assert_eq!(outcome.reported_issued, outcome.admitted());
    assert_eq!(outcome.reported_drops, outcome.dropped());
    assert!(logs_contain("cluster_impl policy activated"));
}
