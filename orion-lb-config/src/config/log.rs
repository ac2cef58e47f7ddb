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

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing_subscriber::EnvFilter;

/// Logging section. `RUST_LOG` takes precedence over `level` when set.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct LogConfig {
    #[serde(deserialize_with = "deserialize_filter", serialize_with = "serialize_filter")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub level: Option<EnvFilter>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<String>,
}

impl PartialEq for LogConfig {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file
            && self.directory == other.directory
            && self.level.as_ref().map(EnvFilter::to_string) == other.level.as_ref().map(EnvFilter::to_string)
    }
}
impl Eq for LogConfig {}

fn deserialize_filter<'de, D>(deserializer: D) -> std::result::Result<Option<EnvFilter>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(directives) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    EnvFilter::builder().parse(&directives).map(Some).map_err(|e| {
        serde::de::Error::custom(format!("invalid log filter \"{directives}\": {e}"))
    })
}

fn serialize_filter<S: Serializer>(value: &Option<EnvFilter>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    value.as_ref().map(EnvFilter::to_string).serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::LogConfig;

    #[test]
    fn level_directives() {
        let log: LogConfig = serde_yaml::from_str("level: orion_lb=debug,info\nfile: lb.log").unwrap();
        let level = log.level.map(|l| l.to_string()).unwrap();
        assert!(level.contains("orion_lb=debug"));
        assert_eq!(log.file.as_deref(), Some("lb.log"));
        assert!(log.directory.is_none());
    }

    #[test]
    fn bad_level() {
        assert!(serde_yaml::from_str::<LogConfig>("level: orion_lb=loud").is_err());
    }
}
