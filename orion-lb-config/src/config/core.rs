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

use std::fmt::Display;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use super::is_default;

/// Where a group of endpoints runs. Load is reported per locality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Locality {
    #[serde(skip_serializing_if = "is_default", default)]
    pub region: CompactString,
    #[serde(skip_serializing_if = "is_default", default)]
    pub zone: CompactString,
    #[serde(skip_serializing_if = "is_default", default)]
    pub sub_zone: CompactString,
}

impl Locality {
    pub fn new(region: impl Into<CompactString>, zone: impl Into<CompactString>, sub_zone: impl Into<CompactString>) -> Self {
        Self { region: region.into(), zone: zone.into(), sub_zone: sub_zone.into() }
    }
}

impl Display for Locality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{region=\"{}\", zone=\"{}\", sub_zone=\"{}\"}}", self.region, self.zone, self.sub_zone)
    }
}
