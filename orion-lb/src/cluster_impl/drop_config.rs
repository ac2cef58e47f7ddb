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

use std::fmt::Debug;

use orion_lb_config::config::{cluster_impl::MILLION, DropCategory};
use rand::Rng;

/// Decides whether a call is dropped before it reaches backend selection.
pub trait DropDecision: Debug + Send + Sync {
    /// The category the call is dropped under, if it is dropped.
    fn should_drop(&self) -> Option<&str>;

    /// True when every call is dropped whatever the draw.
    fn drop_all(&self) -> bool;
}

/// Ordered drop categories from the endpoint assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropConfig {
    categories: Vec<DropCategory>,
    drop_all: bool,
}

impl DropConfig {
    pub fn add_category(&mut self, category: DropCategory) {
        if category.requests_per_million >= MILLION {
            self.drop_all = true;
        }
        self.categories.push(category);
    }

    /// Each category gets an independent draw, in order; the first one that hits wins.
    pub fn should_drop_with<R: Rng>(&self, rng: &mut R) -> Option<&str> {
        self.categories
            .iter()
            .find(|category| rng.gen_range(0..MILLION) < category.requests_per_million)
            .map(|category| category.category.as_str())
    }
}

impl From<&[DropCategory]> for DropConfig {
    fn from(categories: &[DropCategory]) -> Self {
        let mut config = Self::default();
        for category in categories {
            config.add_category(category.clone());
        }
        config
    }
}

impl DropDecision for DropConfig {
    fn should_drop(&self) -> Option<&str> {
        if self.categories.is_empty() {
            return None;
        }
        self.should_drop_with(&mut rand::thread_rng())
    }

    fn drop_all(&self) -> bool {
        self.drop_all
    }
}
