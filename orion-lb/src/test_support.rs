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

//! Fakes shared by the unit tests.

use std::{
    any::Any,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use compact_str::CompactString;
use orion_lb_config::config::{Locality, LoadReportingServer};
use parking_lot::Mutex;

use crate::{
    cluster_impl::{CallCounter, DropDecision},
    load_report::{DropStatsSink, LoadReporter, LocalityStatsSink},
    policy::{
        CallTracker, ChannelControlHelper, CompletePick, ConnectivityState, EndpointAddress, LoadBalancingPolicy,
        LoadBalancingPolicyFactory, PickArgs, PickResult, Picker, Status, Subchannel, TraceSeverity, UpdateArgs,
    },
};

pub fn address(port: u16) -> EndpointAddress {
    EndpointAddress::new(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
}

pub fn address_in(port: u16, zone: &str) -> EndpointAddress {
    address(port).with_locality(Locality::new("region", zone, ""))
}

#[derive(Debug)]
pub struct TestSubchannel {
    address: EndpointAddress,
}

impl TestSubchannel {
    pub fn new(address: EndpointAddress) -> Arc<Self> {
        Arc::new(Self { address })
    }
}

impl Subchannel for TestSubchannel {
    fn address(&self) -> &EndpointAddress {
        &self.address
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub type StateUpdate = (ConnectivityState, Status, Arc<dyn Picker>);

#[derive(Default)]
pub struct RecordingHelper {
    states: Mutex<Vec<StateUpdate>>,
    subchannels_created: AtomicUsize,
    reresolutions: AtomicUsize,
    trace_events: Mutex<Vec<String>>,
}

impl RecordingHelper {
    pub fn states(&self) -> Vec<StateUpdate> {
        self.states.lock().clone()
    }

    pub fn clear_states(&self) {
        self.states.lock().clear();
    }

    pub fn last_state(&self) -> Option<StateUpdate> {
        self.states.lock().last().cloned()
    }

    pub fn subchannels_created(&self) -> usize {
        self.subchannels_created.load(Ordering::Relaxed)
    }

    pub fn reresolutions(&self) -> usize {
        self.reresolutions.load(Ordering::Relaxed)
    }

    pub fn trace_events(&self) -> Vec<String> {
        self.trace_events.lock().clone()
    }
}

impl ChannelControlHelper for RecordingHelper {
    fn create_subchannel(&self, address: EndpointAddress) -> Option<Arc<dyn Subchannel>> {
        self.subchannels_created.fetch_add(1, Ordering::Relaxed);
        Some(TestSubchannel::new(address))
    }

    fn update_state(&self, state: ConnectivityState, status: Status, picker: Arc<dyn Picker>) {
        self.states.lock().push((state, status, picker));
    }

    fn request_reresolution(&self) {
        self.reresolutions.fetch_add(1, Ordering::Relaxed);
    }

    fn authority(&self) -> CompactString {
        CompactString::const_new("test.authority")
    }

    fn add_trace_event(&self, _: TraceSeverity, message: &str) {
        self.trace_events.lock().push(message.to_owned());
    }
}

/// Counts everything reported to it.
#[derive(Debug, Default)]
pub struct RecordingStats {
    pub uncategorized_drops: AtomicUsize,
    pub categorized_drops: Mutex<Vec<String>>,
    pub started: AtomicUsize,
    pub succeeded: AtomicUsize,
    pub failed: AtomicUsize,
}

impl DropStatsSink for RecordingStats {
    fn add_uncategorized_drop(&self) {
        self.uncategorized_drops.fetch_add(1, Ordering::Relaxed);
    }

    fn add_call_dropped(&self, category: &str) {
        self.categorized_drops.lock().push(category.to_owned());
    }
}

impl LocalityStatsSink for RecordingStats {
    fn add_call_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn add_call_finished(&self, failed: bool) {
        let counter = if failed { &self.failed } else { &self.succeeded };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
pub struct TestReporter {
    pub drop_stats: Arc<RecordingStats>,
    pub locality_stats: Arc<RecordingStats>,
    pub fail_drop_stats: AtomicBool,
    pub fail_locality_stats: AtomicBool,
    pub localities: Mutex<Vec<Option<Locality>>>,
}

impl LoadReporter for TestReporter {
    fn add_drop_stats(&self, _: &LoadReportingServer, _: &str, _: &str) -> Option<Arc<dyn DropStatsSink>> {
        if self.fail_drop_stats.load(Ordering::Relaxed) {
            return None;
        }
        Some(Arc::clone(&self.drop_stats) as Arc<dyn DropStatsSink>)
    }

    fn add_locality_stats(
        &self,
        _: &LoadReportingServer,
        _: &str,
        _: &str,
        locality: Option<Arc<Locality>>,
    ) -> Option<Arc<dyn LocalityStatsSink>> {
        self.localities.lock().push(locality.as_deref().cloned());
        if self.fail_locality_stats.load(Ordering::Relaxed) {
            return None;
        }
        Some(Arc::clone(&self.locality_stats) as Arc<dyn LocalityStatsSink>)
    }
}

#[derive(Debug)]
pub struct FixedDrop(pub Option<&'static str>);

impl DropDecision for FixedDrop {
    fn should_drop(&self) -> Option<&str> {
        self.0
    }

    fn drop_all(&self) -> bool {
        false
    }
}

pub type EventLog = Arc<Mutex<Vec<String>>>;

/// A child tracker that writes down when it runs and what the shared counter read at that time.
pub struct LoggingTracker {
    pub log: EventLog,
    pub counter: Option<CallCounter>,
}

impl LoggingTracker {
    fn record(&self, event: &str) {
        let in_flight = self.counter.as_ref().map(CallCounter::load).unwrap_or_default();
        self.log.lock().push(format!("{event} in_flight={in_flight}"));
    }
}

impl CallTracker for LoggingTracker {
    fn start(&mut self) {
        self.record("child start");
    }

    fn finish(&mut self, status: &Status) {
        self.record(&format!("child finish ok={}", status.is_ok()));
    }
}

/// Always completes on the same subchannel, optionally with a [`LoggingTracker`].
#[derive(Debug)]
pub struct FixedPicker {
    pub subchannel: Arc<dyn Subchannel>,
    pub log: Option<EventLog>,
    pub counter: Option<CallCounter>,
}

impl FixedPicker {
    pub fn new(subchannel: Arc<dyn Subchannel>) -> Self {
        Self { subchannel, log: None, counter: None }
    }
}

impl Picker for FixedPicker {
    fn pick(&self, _: &PickArgs<'_>) -> PickResult {
        let mut complete = CompletePick::new(Arc::clone(&self.subchannel));
        if let Some(log) = &self.log {
            complete.call_tracker =
                Some(Box::new(LoggingTracker { log: Arc::clone(log), counter: self.counter.clone() }));
        }
        PickResult::Complete(complete)
    }
}

/// What a [`ScriptedChild`] has been told, plus the helper it was given so tests can report
/// states on its behalf.
#[derive(Default)]
pub struct ChildProbe {
    pub helper: Mutex<Option<Arc<dyn ChannelControlHelper>>>,
    pub updates: Mutex<Vec<UpdateArgs>>,
    pub created: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub exit_idle: AtomicUsize,
    pub reset_backoff: AtomicUsize,
}

impl ChildProbe {
    pub fn helper(&self) -> Arc<dyn ChannelControlHelper> {
        self.helper.lock().clone().expect("child was never created")
    }
}

pub struct ScriptedChildFactory {
    pub name: &'static str,
    pub probe: Arc<ChildProbe>,
}

impl LoadBalancingPolicyFactory for ScriptedChildFactory {
    fn name(&self) -> &'static str {
        self.name
    }

    fn create(&self, helper: Arc<dyn ChannelControlHelper>) -> Box<dyn LoadBalancingPolicy> {
        self.probe.created.fetch_add(1, Ordering::Relaxed);
        *self.probe.helper.lock() = Some(helper);
        Box::new(ScriptedChild { name: self.name, probe: Arc::clone(&self.probe) })
    }
}

/// Records its calls and never reports anything by itself.
pub struct ScriptedChild {
    name: &'static str,
    probe: Arc<ChildProbe>,
}

impl LoadBalancingPolicy for ScriptedChild {
    fn name(&self) -> &'static str {
        self.name
    }

    fn update(&mut self, args: UpdateArgs) -> Result<(), Status> {
        self.probe.updates.lock().push(args);
        Ok(())
    }

    fn exit_idle(&mut self) {
        self.probe.exit_idle.fetch_add(1, Ordering::Relaxed);
    }

    fn reset_backoff(&mut self) {
        self.probe.reset_backoff.fetch_add(1, Ordering::Relaxed);
    }

    fn shutdown(&mut self) {
        self.probe.shutdowns.fetch_add(1, Ordering::Relaxed);
    }
}
