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
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use rand::Rng;
use tracing::{debug, warn};

use crate::policy::{
    ChannelControlHelper, CompletePick, ConnectivityState, EndpointAddress, FailPicker, LoadBalancingPolicy,
    LoadBalancingPolicyFactory, PickArgs, PickResult, Picker, Status, Subchannel, UpdateArgs, ARG_CLUSTER_NAME,
};

pub const ROUND_ROBIN: &str = "round_robin";

#[derive(Debug, Default)]
pub struct RoundRobinFactory;

impl LoadBalancingPolicyFactory for RoundRobinFactory {
    fn name(&self) -> &'static str {
        ROUND_ROBIN
    }

    fn create(&self, helper: Arc<dyn ChannelControlHelper>) -> Box<dyn LoadBalancingPolicy> {
        Box::new(RoundRobin { helper, subchannels: Vec::new() })
    }
}

/// Every subchannel is considered ready as soon as it exists.
pub struct RoundRobin {
    helper: Arc<dyn ChannelControlHelper>,
    subchannels: Vec<Arc<dyn Subchannel>>,
}

impl RoundRobin {
    fn fail(&self, status: Status) -> Status {
        self.helper.update_state(
            ConnectivityState::TransientFailure,
            status.clone(),
            Arc::new(FailPicker::new(status.clone())),
        );
        status
    }
}

impl LoadBalancingPolicy for RoundRobin {
    fn name(&self) -> &'static str {
        ROUND_ROBIN
    }

    fn update(&mut self, args: UpdateArgs) -> Result<(), Status> {
        let cluster = args.args.get(ARG_CLUSTER_NAME).unwrap_or_default();
        let addresses = match args.addresses {
            Ok(addresses) => addresses,
            Err(status) => {
                warn!(cluster, %status, "resolver error");
                if self.subchannels.is_empty() {
                    return Err(self.fail(status));
                }
                return Err(status);
            },
        };

        let mut previous: HashMap<EndpointAddress, Arc<dyn Subchannel>> =
            self.subchannels.drain(..).map(|subchannel| (subchannel.address().clone(), subchannel)).collect();
        self.subchannels = addresses
            .into_iter()
            .filter_map(|address| match previous.remove(&address) {
                Some(existing) => Some(existing),
                None => self.helper.create_subchannel(address),
            })
            .collect();
        debug!(cluster, subchannels = self.subchannels.len(), removed = previous.len(), "round robin updated");

        if self.subchannels.is_empty() {
            return Err(self.fail(Status::unavailable("empty address list")));
        }
        let start = rand::thread_rng().gen_range(0..self.subchannels.len());
        self.helper.update_state(
            ConnectivityState::Ready,
            Status::ok(),
            Arc::new(RoundRobinPicker { subchannels: self.subchannels.clone(), next: AtomicUsize::new(start) }),
        );
        Ok(())
    }

    fn exit_idle(&mut self) {
        for subchannel in &self.subchannels {
            subchannel.request_connection();
        }
    }

    fn reset_backoff(&mut self) {
        for subchannel in &self.subchannels {
            subchannel.reset_backoff();
        }
    }

    fn shutdown(&mut self) {
        self.subchannels.clear();
    }
}

#[derive(Debug)]
struct RoundRobinPicker {
    subchannels: Vec<Arc<dyn Subchannel>>,
    next: AtomicUsize,
}

impl Picker for RoundRobinPicker {
    fn pick(&self, _: &PickArgs<'_>) -> PickResult {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.subchannels.len();
        PickResult::Complete(CompletePick::new(Arc::clone(&self.subchannels[index])))
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderMap;
    use serde_json::json;

    use super::*;
    use crate::test_support::{address, RecordingHelper};

    fn update(addresses: Result<Vec<EndpointAddress>, Status>) -> UpdateArgs {
        UpdateArgs {
            addresses,
            config: orion_lb_config::config::LbPolicyConfig::new(ROUND_ROBIN, json!({})),
            args: Default::default(),
        }
    }

    #[test]
    fn rotates_over_every_address() {
        let helper = Arc::new(RecordingHelper::default());
        let mut policy = RoundRobinFactory.create(helper.clone());
        policy.update(update(Ok(vec![address(1), address(2), address(3)]))).unwrap();

        let (state, _, picker) = helper.last_state().unwrap();
        assert_eq!(state, ConnectivityState::Ready);
        let headers = HeaderMap::new();
        let mut ports: Vec<_> = (0..3)
            .map(|_| match picker.pick(&PickArgs::new("/svc/method", &headers)) {
                PickResult::Complete(complete) => complete.subchannel.address().address.port(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        ports.sort_unstable();
        assert_eq!(ports, vec![1, 2, 3]);
    }

    #[test]
    fn keeps_subchannels_of_unchanged_addresses() {
        let helper = Arc::new(RecordingHelper::default());
        let mut policy = RoundRobinFactory.create(helper.clone());
        policy.update(update(Ok(vec![address(1), address(2)]))).unwrap();
        policy.update(update(Ok(vec![address(2), address(3)]))).unwrap();
        assert_eq!(helper.subchannels_created(), 3);
    }

    #[test]
    fn empty_list_is_a_transient_failure() {
        let helper = Arc::new(RecordingHelper::default());
        let mut policy = RoundRobinFactory.create(helper.clone());
        let status = policy.update(update(Ok(vec![]))).unwrap_err();
        assert_eq!(status.message(), "empty address list");
        let (state, _, picker) = helper.last_state().unwrap();
        assert_eq!(state, ConnectivityState::TransientFailure);
        let headers = HeaderMap::new();
        assert!(matches!(picker.pick(&PickArgs::new("/", &headers)), PickResult::Fail(_)));
    }

    #[test]
    fn resolver_error_keeps_serving_previous_list() {
        let helper = Arc::new(RecordingHelper::default());
        let mut policy = RoundRobinFactory.create(helper.clone());
        policy.update(update(Ok(vec![address(1)]))).unwrap();
        assert!(policy.update(update(Err(Status::unavailable("dns down")))).is_err());
        assert_eq!(helper.states().len(), 1);
    }
}
