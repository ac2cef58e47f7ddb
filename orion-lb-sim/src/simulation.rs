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
    collections::BTreeMap,
    fmt::Display,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use http::HeaderMap;
use orion_lb::{
    cluster_impl::{picker::CIRCUIT_BREAKER_DROP, ClusterImplArgs},
    load_report::ClusterLoadReport,
    policy::{ChannelArgs, EndpointAddress, PickArgs, PickResult, Status, UpdateArgs},
    spawn_policy, Channel, ClusterImplPolicy, LoadReportStore,
};
use orion_lb_config::config::{Cluster, LoadReporting, Traffic};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tokio::{sync::oneshot, task::JoinHandle, time};
use tracing::{debug, info, warn};

use crate::Result;

const PICK_PATH: &str = "/orion.lb.sim.Backend/Call";
const QUEUE_RETRY: Duration = Duration::from_millis(1);

/// What happened to the calls of one run, as seen by the callers and by the load reports.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
    pub circuit_breaker_drops: u64,
    pub category_drops: BTreeMap<String, u64>,
    pub queued: u64,
    pub reports: u64,
    pub reported_issued: u64,
    pub reported_errors: u64,
    pub reported_drops: u64,
}

impl Outcome {
    pub fn admitted(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn dropped(&self) -> u64 {
        self.circuit_breaker_drops + self.category_drops.values().sum::<u64>()
    }

    fn merge(&mut self, other: Outcome) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.rejected += other.rejected;
        self.circuit_breaker_drops += other.circuit_breaker_drops;
        for (category, count) in other.category_drops {
            *self.category_drops.entry(category).or_default() += count;
        }
        self.queued += other.queued;
    }

    fn record_reports(&mut self, reports: &[ClusterLoadReport]) {
        for report in reports {
            self.reports += 1;
            self.reported_drops += report.drops.total();
            for locality in &report.localities {
                self.reported_issued += locality.stats.total_issued_requests;
                self.reported_errors += locality.stats.total_error_requests;
            }
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "admitted {} (succeeded {}, failed {}), rejected {}, dropped {} (circuit breaker {}",
            self.admitted(),
            self.succeeded,
            self.failed,
            self.rejected,
            self.dropped(),
            self.circuit_breaker_drops
        )?;
        for (category, count) in &self.category_drops {
            write!(f, ", {category} {count}")?;
        }
        write!(
            f,
            "), queued picks {}; {} load reports: issued {}, errors {}, drops {}",
            self.queued, self.reports, self.reported_issued, self.reported_errors, self.reported_drops
        )
    }
}

pub struct Simulation {
    cluster: Cluster,
    load_reporting: LoadReporting,
    traffic: Traffic,
    queue_length: NonZeroUsize,
}

impl Simulation {
    pub fn new(cluster: Cluster, load_reporting: LoadReporting, traffic: Traffic, queue_length: NonZeroUsize) -> Self {
        Self { cluster, load_reporting, traffic, queue_length }
    }

    /// Activates a cluster-impl policy over round-robin, issues every configured request against it
    /// and collects the load reports produced along the way.
    pub async fn run(self) -> Result<Outcome> {
        let Self { cluster, load_reporting, traffic, queue_length } = self;
        let channel = Arc::new(Channel::new(cluster.authority.clone()));
        let store = Arc::new(LoadReportStore::new(load_reporting.servers.iter().cloned()));
        let policy = ClusterImplPolicy::new(
            ClusterImplArgs::builder().with_helper(channel.clone()).with_load_reporter(store.clone()).build(),
        )?;
        let (handle, policy_task) = spawn_policy(policy, queue_length.get());

        let addresses = cluster
            .endpoints
            .iter()
            .map(|endpoint| {
                let address = EndpointAddress::new(endpoint.address);
                match &endpoint.locality {
                    Some(locality) => address.with_locality(locality.clone()),
                    None => address,
                }
            })
            .collect();
        let update = UpdateArgs { addresses: Ok(addresses), config: Arc::new(cluster.policy), args: ChannelArgs::default() };
        match handle.update(update).await {
            Ok(()) => {},
            Err(orion_lb::Error::ChildPolicy(status)) => warn!(%status, "child policy rejected the endpoints"),
            Err(e) => return Err(e.into()),
        }
        info!(
            authority = %cluster.authority,
            state = %channel.state(),
            requests = traffic.requests.get(),
            workers = traffic.workers.get(),
            "starting simulation"
        );

        let (stop_tx, stop_rx) = oneshot::channel();
        let reporter = tokio::spawn(report_loop(Arc::clone(&store), load_reporting.report_interval, stop_rx));

        let traffic = Arc::new(CallProfile::from(&traffic));
        let next_request = Arc::new(AtomicUsize::new(0));
        let workers: Vec<JoinHandle<Outcome>> = (0..traffic.workers)
            .map(|worker| {
                let channel = Arc::clone(&channel);
                let traffic = Arc::clone(&traffic);
                let next_request = Arc::clone(&next_request);
                tokio::spawn(async move { issue_calls(worker, &channel, &traffic, &next_request).await })
            })
            .collect();

        let mut outcome = Outcome::default();
        for worker in workers {
            outcome.merge(worker.await?);
        }

        let _ = stop_tx.send(());
        let reports = reporter.await?;
        outcome.record_reports(&reports);

        handle.shutdown().await?;
        policy_task.await?;
        let last = store.take_snapshot();
        log_reports(&last);
        outcome.record_reports(&last);
        Ok(outcome)
    }
}

/// Traffic settings normalized for the workers.
#[derive(Debug)]
struct CallProfile {
    requests: usize,
    workers: usize,
    failure_ratio: f64,
    min_latency: Duration,
    max_latency: Duration,
}

impl From<&Traffic> for CallProfile {
    fn from(traffic: &Traffic) -> Self {
        let failure_ratio = if traffic.failure_ratio.is_nan() { 0.0 } else { traffic.failure_ratio.clamp(0.0, 1.0) };
        Self {
            requests: traffic.requests.get(),
            workers: traffic.workers.get(),
            failure_ratio,
            min_latency: traffic.min_latency,
            max_latency: traffic.max_latency.max(traffic.min_latency),
        }
    }
}

async fn issue_calls(worker: usize, channel: &Channel, profile: &CallProfile, next_request: &AtomicUsize) -> Outcome {
    let mut rng = SmallRng::from_entropy();
    let headers = HeaderMap::new();
    let mut outcome = Outcome::default();
    while next_request.fetch_add(1, Ordering::Relaxed) < profile.requests {
        let pick = loop {
            match channel.pick(&PickArgs::new(PICK_PATH, &headers)) {
                PickResult::Queue => {
                    outcome.queued += 1;
                    time::sleep(QUEUE_RETRY).await;
                },
                other => break other,
            }
        };
        match pick {
            PickResult::Complete(mut complete) => {
                if let Some(tracker) = complete.call_tracker.as_mut() {
                    tracker.start();
                }
                time::sleep(rng.gen_range(profile.min_latency..=profile.max_latency)).await;
                let status = if rng.gen_bool(profile.failure_ratio) {
                    outcome.failed += 1;
                    Status::unavailable("simulated backend failure")
                } else {
                    outcome.succeeded += 1;
                    Status::ok()
                };
                if let Some(tracker) = complete.call_tracker.as_mut() {
                    tracker.finish(&status);
                }
            },
            PickResult::Fail(status) => {
                debug!(worker, %status, "pick failed");
                outcome.rejected += 1;
            },
            PickResult::Drop(status) if status.message() == CIRCUIT_BREAKER_DROP => outcome.circuit_breaker_drops += 1,
            PickResult::Drop(status) => {
                *outcome.category_drops.entry(status.message().to_owned()).or_default() += 1;
            },
            PickResult::Queue => {},
        }
    }
    debug!(worker, ?outcome, "worker done");
    outcome
}

async fn report_loop(
    store: Arc<LoadReportStore>,
    interval: Duration,
    mut stop: oneshot::Receiver<()>,
) -> Vec<ClusterLoadReport> {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let mut collected = Vec::new();
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let reports = store.take_snapshot();
                log_reports(&reports);
                collected.extend(reports);
            }
        }
    }
    collected
}

fn log_reports(reports: &[ClusterLoadReport]) {
    for report in reports {
        match serde_json::to_string(report) {
            Ok(json) => info!(server = %report.server_uri, cluster = %report.cluster, "load report {json}"),
            Err(e) => warn!(cluster = %report.cluster, "unable to render load report: {e}"),
        }
    }
}
