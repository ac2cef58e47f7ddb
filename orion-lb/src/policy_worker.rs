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

//! Serializes every control-plane operation on a policy through one task.

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{cluster_impl::ClusterImplUpdate, ClusterImplPolicy, Error, Result};

#[derive(Debug)]
pub enum PolicyCommand {
    Update(Box<ClusterImplUpdate>, oneshot::Sender<Result<()>>),
    ExitIdle,
    ResetBackoff,
    Shutdown(oneshot::Sender<()>),
}

/// Sending side of a policy's work queue.
#[derive(Debug, Clone)]
pub struct PolicyHandle {
    sender: mpsc::Sender<PolicyCommand>,
}

impl PolicyHandle {
    pub async fn update(&self, update: ClusterImplUpdate) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(PolicyCommand::Update(Box::new(update), tx)).await?;
        rx.await.map_err(|_| Error::WorkerClosed)?
    }

    pub async fn exit_idle(&self) -> Result<()> {
        self.send(PolicyCommand::ExitIdle).await
    }

    pub async fn reset_backoff(&self) -> Result<()> {
        self.send(PolicyCommand::ResetBackoff).await
    }

    /// Resolves once the policy has shut down. Later calls on any handle fail with
    /// [`Error::WorkerClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(PolicyCommand::Shutdown(tx)).await?;
        rx.await.map_err(|_| Error::WorkerClosed)
    }

    async fn send(&self, command: PolicyCommand) -> Result<()> {
        self.sender.send(command).await.map_err(|_| Error::WorkerClosed)
    }
}

pub struct PolicyWorker {
    policy: ClusterImplPolicy,
    commands: mpsc::Receiver<PolicyCommand>,
}

impl PolicyWorker {
    pub fn new(policy: ClusterImplPolicy, queue_length: usize) -> (Self, PolicyHandle) {
        let (sender, commands) = mpsc::channel(queue_length.max(1));
        (Self { policy, commands }, PolicyHandle { sender })
    }

    pub async fn start(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                PolicyCommand::Update(update, result_tx) => {
                    let result = self.policy.update(*update);
                    if let Err(e) = &result {
                        warn!("policy update failed: {e}");
                    }
                    if result_tx.send(result).is_err() {
                        debug!("update caller went away before the result was ready");
                    }
                },
                PolicyCommand::ExitIdle => self.policy.exit_idle(),
                PolicyCommand::ResetBackoff => self.policy.reset_backoff(),
                PolicyCommand::Shutdown(done_tx) => {
                    self.policy.shutdown();
                    let _ = done_tx.send(());
                    info!("policy worker stopped on request");
                    return;
                },
            }
        }
        info!("all policy handles dropped, shutting the policy down");
        self.policy.shutdown();
    }
}

/// Moves `policy` onto its own task.
pub fn spawn_policy(policy: ClusterImplPolicy, queue_length: usize) -> (PolicyHandle, JoinHandle<()>) {
    let (worker, handle) = PolicyWorker::new(policy, queue_length);
    (handle, tokio::spawn(worker.start()))
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::Ordering, Arc};

    use orion_lb_config::config::{ClusterImplConfig, LbPolicyConfig};
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        child::LoadBalancingPolicyRegistry,
        cluster_impl::{CallCounterRegistry, ClusterImplArgs},
        policy::UpdateArgs,
        test_support::{address, ChildProbe, RecordingHelper, ScriptedChildFactory, TestReporter},
    };

    const CHILD: &str = "scripted";

    fn policy(probe: &Arc<ChildProbe>) -> ClusterImplPolicy {
        let registry = LoadBalancingPolicyRegistry::empty()
            .with_factory(Arc::new(ScriptedChildFactory { name: CHILD, probe: Arc::clone(probe) }));
        ClusterImplPolicy::new(
            ClusterImplArgs::builder()
                .with_helper(Arc::new(RecordingHelper::default()))
                .with_load_reporter(Arc::new(TestReporter::default()))
                .with_child_policies(Arc::new(registry))
                .with_call_counters(CallCounterRegistry::new())
                .build(),
        )
        .unwrap()
    }

    fn update(cluster: &str) -> ClusterImplUpdate {
        UpdateArgs {
            addresses: Ok(vec![address(1)]),
            config: Arc::new(ClusterImplConfig::new(cluster, LbPolicyConfig::new(CHILD, json!({})))),
            args: Default::default(),
        }
    }

    #[tokio::test]
    async fn commands_run_in_order_on_the_worker() {
        let probe = Arc::new(ChildProbe::default());
        let (handle, task) = spawn_policy(policy(&probe), 8);
        handle.update(update("cluster")).await.unwrap();
        assert_eq!(probe.updates.lock().len(), 1);

        handle.exit_idle().await.unwrap();
        handle.reset_backoff().await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(probe.exit_idle.load(Ordering::Relaxed), 1);
        assert_eq!(probe.reset_backoff.load(Ordering::Relaxed), 1);
        assert_eq!(probe.shutdowns.load(Ordering::Relaxed), 1);
        assert!(matches!(handle.update(update("cluster")).await, Err(Error::WorkerClosed)));
        assert!(matches!(handle.exit_idle().await, Err(Error::WorkerClosed)));
    }

    #[traced_test]
    #[tokio::test]
    async fn errors_are_returned_to_the_caller() {
        let probe = Arc::new(ChildProbe::default());
        let (handle, _task) = spawn_policy(policy(&probe), 8);
        handle.update(update("cluster")).await.unwrap();
        let err = handle.update(update("renamed")).await.unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(logs_contain("policy update failed"));
        assert_eq!(probe.updates.lock().len(), 1);
    }

    #[traced_test]
    #[tokio::test]
    async fn dropping_every_handle_shuts_the_policy_down() {
        let probe = Arc::new(ChildProbe::default());
        let (handle, task) = spawn_policy(policy(&probe), 1);
        let clone = handle.clone();
        handle.update(update("cluster")).await.unwrap();
        drop(handle);
        clone.reset_backoff().await.unwrap();
        drop(clone);
        task.await.unwrap();
        assert_eq!(probe.shutdowns.load(Ordering::Relaxed), 1);
        assert!(logs_contain("all policy handles dropped"));
    }
}
