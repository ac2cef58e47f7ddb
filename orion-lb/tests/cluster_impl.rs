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

use std::{sync::Arc, thread};

use http::HeaderMap;
use orion_lb::{
    child::round_robin::ROUND_ROBIN,
    cluster_impl::{picker::CIRCUIT_BREAKER_DROP, CallCounterRegistry, ClusterImplArgs},
    policy::{ChannelArgs, CompletePick, ConnectivityState, EndpointAddress, PickArgs, PickResult, Status, StatusCode, UpdateArgs},
    spawn_policy, Channel, ClusterImplPolicy, ClusterImplUpdate, Error, LoadReportStore,
};
use orion_lb_config::config::{ClusterImplConfig, DropCategory, LbPolicyConfig, Locality, LoadReportingServer};
use serde_json::json;

const LRS: &str = "lrs.example.com:443";

struct Setup {
    channel: Arc<Channel>,
    store: Arc<LoadReportStore>,
    policy: ClusterImplPolicy,
}

fn setup() -> Setup {
    let channel = Arc::new(Channel::new("svc.example.com"));
    let store = Arc::new(LoadReportStore::new([LRS]));
    let policy = ClusterImplPolicy::new(
        ClusterImplArgs::builder()
            .with_helper(channel.clone())
            .with_load_reporter(store.clone())
            .with_call_counters(CallCounterRegistry::new())
            .build(),
    )
    .unwrap();
    Setup { channel, store, policy }
}

fn locality() -> Locality {
    Locality::new("us-east", "us-east-1a", "")
}

fn config() -> ClusterImplConfig {
    ClusterImplConfig::new("backend", LbPolicyConfig::new(ROUND_ROBIN, json!({})))
        .with_eds_service_name("backend-eds")
        .with_lrs_server(LoadReportingServer::new(LRS))
}

fn update(config: ClusterImplConfig) -> ClusterImplUpdate {
    let addresses = (8080..8083)
        .map(|port| EndpointAddress::new(([10, 0, 0, 1], port).into()).with_locality(locality()))
        .collect();
    UpdateArgs { addresses: Ok(addresses), config: Arc::new(config), args: ChannelArgs::default() }
}

fn pick(channel: &Channel) -> PickResult {
    let headers = HeaderMap::new();
    channel.pick(&PickArgs::new("/echo.Echo/Call", &headers))
}

fn started(channel: &Channel) -> CompletePick {
    match pick(channel) {
        PickResult::Complete(mut complete) => {
            if let Some(tracker) = complete.call_tracker.as_mut() {
                tracker.start();
            }
            complete
        },
        other => panic!("expected a completed pick, got {other:?}"),
    }
}

fn finish(mut complete: CompletePick, status: &Status) {
    if let Some(tracker) = complete.call_tracker.as_mut() {
        tracker.finish(status);
    }
}

#[test]
fn circuit_breaker_admits_again_after_a_call_finishes() {
    let mut setup = setup();
    setup.policy.update(update(config().with_max_concurrent_requests(2))).unwrap();
    assert_eq!(setup.channel.state(), ConnectivityState::Ready);

    let first = started(&setup.channel);
    let second = started(&setup.channel);
    match pick(&setup.channel) {
        PickResult::Drop(status) => {
            assert_eq!(status.code(), StatusCode::Unavailable);
            assert_eq!(status.message(), CIRCUIT_BREAKER_DROP);
        },
        other => panic!("expected a circuit breaker drop, got {other:?}"),
    }

    finish(first, &Status::ok());
    let third = started(&setup.channel);
    finish(second, &Status::unavailable("backend went away"));
    finish(third, &Status::ok());
    assert_eq!(setup.policy.call_counter().map(|c| c.load()), Some(0));

    let reports = setup.store.take_snapshot();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.cluster, "backend");
    assert_eq!(report.eds_service_name, "backend-eds");
    assert_eq!(report.drops.uncategorized_drops, 1);
    let stats = report.locality(&locality()).unwrap();
    assert_eq!(stats.total_issued_requests, 3);
    assert_eq!(stats.total_successful_requests, 2);
    assert_eq!(stats.total_error_requests, 1);
    assert_eq!(stats.total_requests_in_progress, 0);
}

#[test]
fn drop_all_is_ready_before_the_child_reports() {
    let mut setup = setup();
    let config = config().with_drop_categories(vec![DropCategory::new("maintenance", 1_000_000)]);
    let mut update = update(config);
    update.addresses = Ok(Vec::new());
    assert!(matches!(setup.policy.update(update), Err(Error::ChildPolicy(_))));

    let published = setup.channel.published().unwrap();
    assert_eq!(published.state, ConnectivityState::Ready);
    assert_eq!(published.generation, 2);
    match pick(&setup.channel) {
        PickResult::Drop(status) => assert!(status.message().contains("maintenance")),
        other => panic!("expected an EDS drop, got {other:?}"),
    }
    let reports = setup.store.take_snapshot();
    assert_eq!(reports[0].drops.categorized_drops.get("maintenance"), Some(&1));
}

#[test]
fn concurrent_calls_leave_the_counter_balanced() {
    let mut setup = setup();
    setup.policy.update(update(config().with_max_concurrent_requests(64))).unwrap();
    let channel = Arc::clone(&setup.channel);

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let mut dropped = 0_u64;
                for call in 0..200 {
                    match pick(&channel) {
                        PickResult::Complete(mut complete) => {
                            let status =
                                if (worker + call) % 5 == 0 { Status::unavailable("flaky") } else { Status::ok() };
                            if let Some(tracker) = complete.call_tracker.as_mut() {
                                tracker.start();
                                tracker.finish(&status);
                            }
                        },
                        PickResult::Drop(_) => dropped += 1,
                        other => panic!("unexpected pick result {other:?}"),
                    }
                }
                dropped
            })
        })
        .collect();
    let dropped: u64 = workers.into_iter().map(|worker| worker.join().unwrap()).sum();

    assert_eq!(setup.policy.call_counter().map(|c| c.load()), Some(0));
    let reports = setup.store.take_snapshot();
    let stats = reports[0].locality(&locality()).unwrap();
    assert_eq!(stats.total_issued_requests + dropped, 1600);
    assert_eq!(stats.total_successful_requests + stats.total_error_requests, stats.total_issued_requests);
    assert_eq!(reports[0].drops.uncategorized_drops, dropped);
}

#[test]
fn limit_change_takes_effect_on_the_next_pick() {
    let mut setup = setup();
    setup.policy.update(update(config().with_max_concurrent_requests(1))).unwrap();
    let first = started(&setup.channel);
    assert!(matches!(pick(&setup.channel), PickResult::Drop(_)));

    let generation = setup.channel.generation();
    setup.policy.update(update(config().with_max_concurrent_requests(2))).unwrap();
    assert!(setup.channel.generation() > generation);
    let second = started(&setup.channel);
    finish(first, &Status::ok());
    finish(second, &Status::ok());
}

#[tokio::test]
async fn worker_drives_the_policy() {
    let Setup { channel, store, policy } = setup();
    let (handle, task) = spawn_policy(policy, 16);
    handle.update(update(config())).await.unwrap();
    assert_eq!(channel.state(), ConnectivityState::Ready);
    assert_eq!(channel.subchannels_created(), 3);

    let call = started(&channel);
    finish(call, &Status::ok());

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    let reports = store.take_snapshot();
    assert_eq!(reports[0].locality(&locality()).map(|s| s.total_successful_requests), Some(1));
    assert!(store.take_snapshot().is_empty());
}
