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

use std::sync::Arc;

use compact_str::CompactString;
use tracing::error;

use super::{
    policy::{Phase, PolicyShared},
    subchannel::StatsSubchannel,
};
use crate::policy::{ChannelControlHelper, ConnectivityState, EndpointAddress, Picker, Status, Subchannel, TraceSeverity};

/// What the child policy sees as its channel.
pub(super) struct ClusterImplHelper {
    shared: Arc<PolicyShared>,
}

impl ClusterImplHelper {
    pub(super) fn new(shared: Arc<PolicyShared>) -> Self {
        Self { shared }
    }

    fn is_shutting_down(&self) -> bool {
        self.shared.state.lock().is_shutting_down()
    }
}

impl ChannelControlHelper for ClusterImplHelper {
    fn create_subchannel(&self, address: EndpointAddress) -> Option<Arc<dyn Subchannel>> {
        let stats_target = {
            let state = self.shared.state.lock();
            match &state.phase {
                Phase::ShuttingDown => return None,
                Phase::Uninitialized => None,
                Phase::Active(active) => active
                    .config
                    .lrs_load_reporting_server
                    .is_some()
                    .then(|| (Arc::clone(&active.config), state.load_reporter.clone())),
            }
        };
        let Some((config, load_reporter)) = stats_target else {
            return self.shared.parent.create_subchannel(address);
        };
        let server = config.lrs_load_reporting_server.as_ref()?;
        let locality_stats = load_reporter.and_then(|reporter| {
            reporter.add_locality_stats(
                server,
                &config.cluster_name,
                &config.eds_service_name,
                address.locality.clone(),
            )
        });
        let Some(locality_stats) = locality_stats else {
            error!(
                lrs_server = %server.server_uri,
                cluster = %config.cluster_name,
                eds_service_name = %config.eds_service_name,
                locality = %address.locality.as_deref().map(ToString::to_string).unwrap_or_default(),
                "failed to get locality stats, calls to {} will not be reported",
                address.address
            );
            return self.shared.parent.create_subchannel(address);
        };
        let subchannel = self.shared.parent.create_subchannel(address)?;
        Some(Arc::new(StatsSubchannel::new(subchannel, locality_stats)))
    }

    fn update_state(&self, state: ConnectivityState, status: Status, picker: Arc<dyn Picker>) {
        let publication = {
            let mut policy = self.shared.state.lock();
            if policy.is_shutting_down() {
                return;
            }
            policy.set_child_report(state, status, picker);
            policy.build_picker()
        };
        self.shared.publish(publication);
    }

    fn request_reresolution(&self) {
        if !self.is_shutting_down() {
            self.shared.parent.request_reresolution();
        }
    }

    fn authority(&self) -> CompactString {
        self.shared.parent.authority()
    }

    fn add_trace_event(&self, severity: TraceSeverity, message: &str) {
        if !self.is_shutting_down() {
            self.shared.parent.add_trace_event(severity, message);
        }
    }
}
