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

use std::{mem, sync::Arc};

use compact_str::CompactString;
use orion_lb_config::config::{ClusterImplConfig, LbPolicyConfig, LoadReportingServer};
use parking_lot::Mutex;
use tracing::{debug, error, info};
use typed_builder::TypedBuilder;

use super::{
    call_counter::{CallCounter, CallCounterRegistry},
    drop_config::{DropConfig, DropDecision},
    helper::ClusterImplHelper,
    picker::ClusterImplPicker,
};
use crate::{
    child::LoadBalancingPolicyRegistry,
    error::IdentityField,
    load_report::{DropStatsSink, LoadReporter},
    policy::{
        ChannelArgs, ChannelControlHelper, ConnectivityState, EndpointAddress, LoadBalancingPolicy, Picker, Status,
        UpdateArgs, ARG_CLUSTER_NAME,
    },
    Error, Result,
};

pub type ClusterImplUpdate = UpdateArgs<Arc<ClusterImplConfig>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyPhase {
    Uninitialized,
    Active,
    ShuttingDown,
}

pub(super) struct ActiveState {
    pub(super) config: Arc<ClusterImplConfig>,
    drop_config: Arc<DropConfig>,
    call_counter: CallCounter,
    drop_stats: Option<Arc<dyn DropStatsSink>>,
}

pub(super) enum Phase {
    Uninitialized,
    Active(ActiveState),
    ShuttingDown,
}

#[derive(Default)]
struct ChildReport {
    state: ConnectivityState,
    status: Status,
    picker: Option<Arc<dyn Picker>>,
}

pub(super) struct Publication {
    state: ConnectivityState,
    status: Status,
    picker: Arc<dyn Picker>,
}

pub(super) struct PolicyState {
    pub(super) phase: Phase,
    pub(super) load_reporter: Option<Arc<dyn LoadReporter>>,
    child: ChildReport,
}

impl PolicyState {
    pub(super) fn is_shutting_down(&self) -> bool {
        matches!(self.phase, Phase::ShuttingDown)
    }

    pub(super) fn set_child_report(&mut self, state: ConnectivityState, status: Status, picker: Arc<dyn Picker>) {
        self.child = ChildReport { state, status, picker: Some(picker) };
    }

    /// What to publish upward given the current config and the child's last report, if anything.
    ///
    /// With drop-all the child does not matter: every call is dropped, so the channel is READY.
    pub(super) fn build_picker(&self) -> Option<Publication> {
        let Phase::Active(active) = &self.phase else {
            return None;
        };
        let picker = |child_picker| -> Arc<dyn Picker> {
            Arc::new(ClusterImplPicker::new(
                active.call_counter.clone(),
                active.config.max_concurrent_requests,
                Arc::clone(&active.drop_config) as Arc<dyn DropDecision>,
                active.drop_stats.clone(),
                child_picker,
            ))
        };
        if active.drop_config.drop_all() {
            return Some(Publication {
                state: ConnectivityState::Ready,
                status: Status::ok(),
                picker: picker(self.child.picker.clone()),
            });
        }
        let child_picker = self.child.picker.clone()?;
        Some(Publication {
            state: self.child.state,
            status: self.child.status.clone(),
            picker: picker(Some(child_picker)),
        })
    }
}

pub(super) struct PolicyShared {
    pub(super) parent: Arc<dyn ChannelControlHelper>,
    pub(super) state: Mutex<PolicyState>,
}

impl PolicyShared {
    /// Must be called without holding the state lock.
    pub(super) fn publish(&self, publication: Option<Publication>) {
        if let Some(Publication { state, status, picker }) = publication {
            debug!(%state, %status, "publishing cluster_impl picker");
            self.parent.update_state(state, status, picker);
        }
    }
}

#[derive(TypedBuilder)]
#[builder(field_defaults(setter(prefix = "with_")))]
pub struct ClusterImplArgs {
    helper: Arc<dyn ChannelControlHelper>,
    #[builder(default, setter(strip_option))]
    load_reporter: Option<Arc<dyn LoadReporter>>,
    #[builder(default = Arc::new(LoadBalancingPolicyRegistry::default()))]
    child_policies: Arc<LoadBalancingPolicyRegistry>,
    #[builder(default = CallCounterRegistry::global().clone())]
    call_counters: CallCounterRegistry,
}

/// Circuit breaking, EDS drops and load reporting on top of a child policy.
///
/// Owned by a single writer (see [`crate::policy_worker`]); the pickers it publishes are what the
/// request path sees.
pub struct ClusterImplPolicy {
    shared: Arc<PolicyShared>,
    helper: Arc<ClusterImplHelper>,
    child_policies: Arc<LoadBalancingPolicyRegistry>,
    call_counters: CallCounterRegistry,
    child: Option<Box<dyn LoadBalancingPolicy>>,
}

impl ClusterImplPolicy {
    pub fn new(args: ClusterImplArgs) -> Result<Self> {
        let ClusterImplArgs { helper, load_reporter, child_policies, call_counters } = args;
        let load_reporter = load_reporter.ok_or(Error::MissingLoadReporter)?;
        let shared = Arc::new(PolicyShared {
            parent: helper,
            state: Mutex::new(PolicyState {
                phase: Phase::Uninitialized,
                load_reporter: Some(load_reporter),
                child: ChildReport::default(),
            }),
        });
        let helper = Arc::new(ClusterImplHelper::new(Arc::clone(&shared)));
        Ok(Self { shared, helper, child_policies, call_counters, child: None })
    }

    pub fn phase(&self) -> PolicyPhase {
        match self.shared.state.lock().phase {
            Phase::Uninitialized => PolicyPhase::Uninitialized,
            Phase::Active(_) => PolicyPhase::Active,
            Phase::ShuttingDown => PolicyPhase::ShuttingDown,
        }
    }

    pub fn call_counter(&self) -> Option<CallCounter> {
        match &self.shared.state.lock().phase {
            Phase::Active(active) => Some(active.call_counter.clone()),
            _ => None,
        }
    }

    pub fn update(&mut self, update: ClusterImplUpdate) -> Result<()> {
        let UpdateArgs { addresses, config, args } = update;
        let publication = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            match &mut state.phase {
                Phase::ShuttingDown => {
                    debug!(cluster = %config.cluster_name, "ignoring update after shutdown");
                    return Ok(());
                },
                Phase::Active(active) => {
                    check_identity(&active.config, &config).inspect_err(|e| error!("rejecting update: {e}"))?;
                    let drop_config = DropConfig::from(config.drop_categories.as_slice());
                    let drop_config_changed = *active.drop_config != drop_config;
                    let rebuild =
                        drop_config_changed || active.config.max_concurrent_requests != config.max_concurrent_requests;
                    if drop_config_changed {
                        active.drop_config = Arc::new(drop_config);
                    }
                    active.config = Arc::clone(&config);
                    debug!(cluster = %config.cluster_name, rebuild, "received update");
                    if rebuild {
                        state.build_picker()
                    } else {
                        None
                    }
                },
                Phase::Uninitialized => {
                    let drop_stats = config.lrs_load_reporting_server.as_ref().and_then(|server| {
                        let drop_stats = state.load_reporter.as_ref().and_then(|reporter| {
                            reporter.add_drop_stats(server, &config.cluster_name, &config.eds_service_name)
                        });
                        if drop_stats.is_none() {
                            error!(
                                lrs_server = %server.server_uri,
                                cluster = %config.cluster_name,
                                eds_service_name = %config.eds_service_name,
                                "failed to get drop stats, dropped calls will not be reported"
                            );
                        }
                        drop_stats
                    });
                    let call_counter = self.call_counters.get_or_create(&config.cluster_name, &config.eds_service_name);
                    info!(
                        cluster = %config.cluster_name,
                        eds_service_name = %config.eds_service_name,
                        max_concurrent_requests = config.max_concurrent_requests,
                        "cluster_impl policy activated"
                    );
                    state.phase = Phase::Active(ActiveState {
                        drop_config: Arc::new(DropConfig::from(config.drop_categories.as_slice())),
                        config: Arc::clone(&config),
                        call_counter,
                        drop_stats,
                    });
                    state.build_picker()
                },
            }
        };
        self.shared.publish(publication);
        self.update_child(addresses, &config, args)
    }

    fn update_child(
        &mut self,
        addresses: std::result::Result<Vec<EndpointAddress>, Status>,
        config: &ClusterImplConfig,
        args: ChannelArgs,
    ) -> Result<()> {
        let LbPolicyConfig { name, .. } = &config.child_policy;
        if let Some(mut previous) = self.child.take_if(|child| child.name() != name.as_str()) {
            info!(cluster = %config.cluster_name, from = previous.name(), to = %name, "switching child policy");
            previous.shutdown();
        }
        if self.child.is_none() {
            let helper: Arc<dyn ChannelControlHelper> = self.helper.clone();
            let child = self.child_policies.create(name, helper).ok_or_else(|| Error::UnknownChildPolicy(name.clone()))?;
            debug!(cluster = %config.cluster_name, child = %name, "created child policy");
            self.child = Some(child);
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        child
            .update(UpdateArgs {
                addresses,
                config: config.child_policy.clone(),
                args: args.with(ARG_CLUSTER_NAME, config.cluster_name.clone()),
            })
            .map_err(Error::ChildPolicy)
    }

    pub fn exit_idle(&mut self) {
        if let Some(child) = &mut self.child {
            child.exit_idle();
        }
    }

    pub fn reset_backoff(&mut self) {
        if let Some(child) = &mut self.child {
            child.reset_backoff();
        }
    }

    /// Idempotent. Pickers already handed out keep working; the helper ignores the child from now on.
    pub fn shutdown(&mut self) {
        let previous = {
            let mut state = self.shared.state.lock();
            state.child = ChildReport::default();
            state.load_reporter = None;
            mem::replace(&mut state.phase, Phase::ShuttingDown)
        };
        if matches!(previous, Phase::ShuttingDown) {
            return;
        }
        debug!("shutting down cluster_impl policy");
        if let Some(mut child) = self.child.take() {
            child.shutdown();
        }
    }
}

impl Drop for ClusterImplPolicy {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn check_identity(current: &ClusterImplConfig, update: &ClusterImplConfig) -> Result<()> {
    let violation = |field, previous: &CompactString, current: &CompactString| Error::InvariantViolation {
        field,
        previous: previous.clone(),
        current: current.clone(),
    };
    if current.cluster_name != update.cluster_name {
        return Err(violation(IdentityField::ClusterName, &current.cluster_name, &update.cluster_name));
    }
    if current.eds_service_name != update.eds_service_name {
        return Err(violation(IdentityField::EdsServiceName, &current.eds_service_name, &update.eds_service_name));
    }
    if current.lrs_load_reporting_server != update.lrs_load_reporting_server {
        return Err(violation(
            IdentityField::LrsServer,
            &describe_server(current.lrs_load_reporting_server.as_ref()),
            &describe_server(update.lrs_load_reporting_server.as_ref()),
        ));
    }
    Ok(())
}

fn describe_server(server: Option<&LoadReportingServer>) -> CompactString {
    server.map_or_else(|| CompactString::const_new("<none>"), |server| server.server_uri.clone())
}
