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

//! The layer above the policy tree: owns subchannels and serves picks from the latest picker.

use std::{
    any::Any,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwapOption;
use compact_str::CompactString;
use tracing::{debug, error, info, warn};

use crate::policy::{
    ChannelControlHelper, ConnectivityState, EndpointAddress, PickArgs, PickResult, Picker, Status, Subchannel,
    TraceSeverity,
};

/// A backend connection. Connection management is not modelled: an endpoint is always usable.
#[derive(Debug)]
pub struct Endpoint {
    address: EndpointAddress,
    connection_requests: AtomicU64,
}

impl Endpoint {
    pub fn connection_requests(&self) -> u64 {
        self.connection_requests.load(Ordering::Relaxed)
    }
}

impl Subchannel for Endpoint {
    fn address(&self) -> &EndpointAddress {
        &self.address
    }

    fn request_connection(&self) {
        self.connection_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct PublishedPicker {
    pub generation: u64,
    pub state: ConnectivityState,
    pub status: Status,
    pub picker: Arc<dyn Picker>,
}

/// Publishes every picker it is given by swapping a single pointer, so a pick sees either the
/// previous picker or the new one and never waits on the control plane.
#[derive(Debug)]
pub struct Channel {
    authority: CompactString,
    published: ArcSwapOption<PublishedPicker>,
    generation: AtomicU64,
    reresolution_requests: AtomicU64,
    subchannels_created: AtomicU64,
}

impl Channel {
    pub fn new(authority: impl Into<CompactString>) -> Self {
        Self {
            authority: authority.into(),
            published: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
            reresolution_requests: AtomicU64::new(0),
            subchannels_created: AtomicU64::new(0),
        }
    }

    /// Queues until the first picker is published.
    pub fn pick(&self, args: &PickArgs<'_>) -> PickResult {
        match self.published.load().as_deref() {
            Some(published) => published.picker.pick(args),
            None => PickResult::Queue,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.published.load().as_deref().map_or(ConnectivityState::Idle, |published| published.state)
    }

    pub fn published(&self) -> Option<Arc<PublishedPicker>> {
        self.published.load_full()
    }

    /// Number of pickers published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn reresolution_requests(&self) -> u64 {
        self.reresolution_requests.load(Ordering::Relaxed)
    }

    pub fn subchannels_created(&self) -> u64 {
        self.subchannels_created.load(Ordering::Relaxed)
    }
}

impl ChannelControlHelper for Channel {
    fn create_subchannel(&self, address: EndpointAddress) -> Option<Arc<dyn Subchannel>> {
        self.subchannels_created.fetch_add(1, Ordering::Relaxed);
        debug!(address = %address.address, "creating subchannel");
        Some(Arc::new(Endpoint { address, connection_requests: AtomicU64::new(0) }))
    }

    fn update_state(&self, state: ConnectivityState, status: Status, picker: Arc<dyn Picker>) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(authority = %self.authority, %state, %status, generation, "picker updated");
        self.published.store(Some(Arc::new(PublishedPicker { generation, state, status, picker })));
    }

    fn request_reresolution(&self) {
        self.reresolution_requests.fetch_add(1, Ordering::Relaxed);
        debug!(authority = %self.authority, "re-resolution requested");
    }

    fn authority(&self) -> CompactString {
        self.authority.clone()
    }

    fn add_trace_event(&self, severity: TraceSeverity, message: &str) {
        match severity {
            TraceSeverity::Info => info!(authority = %self.authority, "{message}"),
            TraceSeverity::Warning => warn!(authority = %self.authority, "{message}"),
            TraceSeverity::Error => error!(authority = %self.authority, "{message}"),
        }
    }
}
