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

pub mod round_robin;

use std::{collections::BTreeMap, sync::Arc};

use crate::policy::{ChannelControlHelper, LoadBalancingPolicy, LoadBalancingPolicyFactory};

/// Child policies a cluster-impl policy can delegate to, by name.
#[derive(Clone)]
pub struct LoadBalancingPolicyRegistry {
    factories: BTreeMap<&'static str, Arc<dyn LoadBalancingPolicyFactory>>,
}

impl LoadBalancingPolicyRegistry {
    pub fn empty() -> Self {
        Self { factories: BTreeMap::new() }
    }

    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn LoadBalancingPolicyFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn register(&mut self, factory: Arc<dyn LoadBalancingPolicyFactory>) {
        self.factories.insert(factory.name(), factory);
    }

    pub fn create(&self, name: &str, helper: Arc<dyn ChannelControlHelper>) -> Option<Box<dyn LoadBalancingPolicy>> {
        self.factories.get(name).map(|factory| factory.create(helper))
    }
}

impl Default for LoadBalancingPolicyRegistry {
    fn default() -> Self {
        Self::empty().with_factory(Arc::new(round_robin::RoundRobinFactory))
    }
}
