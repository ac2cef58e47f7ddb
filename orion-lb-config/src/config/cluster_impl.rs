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

//! Configuration of the cluster-impl balancer.
//!
//! The document is parsed by hand instead of through `#[derive(Deserialize)]`: serde stops at the
//! first problem, while a rejected policy config must list everything that is wrong with it.

use std::{collections::BTreeSet, str::FromStr};

use compact_str::CompactString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::{
    common::{ConfigError, GenericError, Violations, WithNodeOnResult},
    is_default,
};

pub const CLUSTER_IMPL_POLICY_NAME: &str = "xds_cluster_impl_experimental";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: u32 = 1024;
/// Drop rates are expressed as a fraction of this many requests.
pub const MILLION: u32 = 1_000_000;

const PARSE_CONTEXT: &str = "errors parsing xds_cluster_impl LB policy config";

type JsonObject = Map<String, Value>;

/// An opaque child policy selection: a policy name and its own, unparsed, config.
#[derive(Debug, Clone, PartialEq)]
pub struct LbPolicyConfig {
    pub name: CompactString,
    pub config: Value,
}

impl LbPolicyConfig {
    pub fn new(name: impl Into<CompactString>, config: Value) -> Self {
        Self { name: name.into(), config }
    }

    /// Reads the `[{"<policy name>": {<config>}}, ...]` list form. The first entry wins.
    pub fn from_json(value: &Value) -> Result<Self, GenericError> {
        let entries = as_array(value)?;
        let first = entries.first().ok_or_else(|| GenericError::from_msg("no policy found in list"))?;
        let entry = as_object(first).with_index(0)?;
        let mut policies = entry.iter();
        match (policies.next(), policies.next()) {
            (Some((name, config)), None) => {
                if !config.is_object() {
                    return Err(GenericError::WrongType("object").with_name(name.clone()).with_index(0));
                }
                Ok(Self { name: name.into(), config: config.clone() })
            },
            _ => Err(GenericError::from_msg("policy entry must contain exactly one policy name").with_index(0)),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut entry = JsonObject::new();
        entry.insert(self.name.to_string(), self.config.clone());
        Value::Array(vec![Value::Object(entry)])
    }
}

impl Serialize for LbPolicyConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelCreds {
    #[serde(rename = "type")]
    pub kind: CompactString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Identity of the load reporting server. Two configs report to the same server only if these
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReportingServer {
    pub server_uri: CompactString,
    #[serde(skip_serializing_if = "is_default")]
    pub channel_creds: Vec<ChannelCreds>,
    #[serde(skip_serializing_if = "is_default")]
    pub server_features: BTreeSet<CompactString>,
}

impl LoadReportingServer {
    pub fn new(server_uri: impl Into<CompactString>) -> Self {
        Self { server_uri: server_uri.into(), channel_creds: Vec::new(), server_features: BTreeSet::new() }
    }

    pub fn from_json(value: &Value) -> Result<Self, GenericError> {
        let obj = as_object(value)?;
        let mut violations = Violations::default();
        let server_uri = violations.check(required(obj, "server_uri", as_string));
        let channel_creds = violations.check(optional(obj, "channel_creds", parse_channel_creds)).flatten();
        let server_features = violations.check(optional(obj, "server_features", parse_server_features)).flatten();
        violations.into_result()?;
        let server_uri = server_uri.ok_or(GenericError::MissingField).with_node("server_uri")?;
        Ok(Self {
            server_uri,
            channel_creds: channel_creds.unwrap_or_default(),
            server_features: server_features.unwrap_or_default(),
        })
    }
}

fn parse_channel_creds(value: &Value) -> Result<Vec<ChannelCreds>, GenericError> {
    collect_indexed(as_array(value)?, |entry| {
        let obj = as_object(entry)?;
        let mut violations = Violations::default();
        let kind = violations.check(required(obj, "type", as_string));
        let config = violations
            .check(optional(obj, "config", |v| as_object(v).map(|_| v.clone())))
            .flatten();
        violations.into_result()?;
        let kind = kind.ok_or(GenericError::MissingField).with_node("type")?;
        Ok(ChannelCreds { kind, config })
    })
}

fn parse_server_features(value: &Value) -> Result<BTreeSet<CompactString>, GenericError> {
    collect_indexed(as_array(value)?, as_string).map(|features| features.into_iter().collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropCategory {
    pub category: CompactString,
    pub requests_per_million: u32,
}

impl DropCategory {
    pub fn new(category: impl Into<CompactString>, requests_per_million: u32) -> Self {
        Self { category: category.into(), requests_per_million }
    }

    fn from_json(value: &Value) -> Result<Self, GenericError> {
        let obj = as_object(value)?;
        let mut violations = Violations::default();
        let category = violations.check(required(obj, "category", as_string));
        let requests_per_million = violations.check(required(obj, "requests_per_million", as_u32));
        violations.into_result()?;
        match (category, requests_per_million) {
            (Some(category), Some(requests_per_million)) => Ok(Self { category, requests_per_million }),
            _ => Err(GenericError::from_msg("incomplete drop category")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterImplConfig {
    pub child_policy: LbPolicyConfig,
    pub cluster_name: CompactString,
    #[serde(skip_serializing_if = "is_default")]
    pub eds_service_name: CompactString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lrs_load_reporting_server: Option<LoadReportingServer>,
    pub max_concurrent_requests: u32,
    pub drop_categories: Vec<DropCategory>,
}

impl ClusterImplConfig {
    pub fn new(cluster_name: impl Into<CompactString>, child_policy: LbPolicyConfig) -> Self {
        Self {
            child_policy,
            cluster_name: cluster_name.into(),
            eds_service_name: CompactString::default(),
            lrs_load_reporting_server: None,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            drop_categories: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_eds_service_name(self, eds_service_name: impl Into<CompactString>) -> Self {
        Self { eds_service_name: eds_service_name.into(), ..self }
    }

    #[must_use]
    pub fn with_lrs_server(self, server: LoadReportingServer) -> Self {
        Self { lrs_load_reporting_server: Some(server), ..self }
    }

    #[must_use]
    pub fn with_max_concurrent_requests(self, max_concurrent_requests: u32) -> Self {
        Self { max_concurrent_requests, ..self }
    }

    #[must_use]
    pub fn with_drop_categories(self, drop_categories: Vec<DropCategory>) -> Self {
        Self { drop_categories, ..self }
    }

    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Err(ConfigError::new(
                PARSE_CONTEXT,
                &GenericError::from_msg("xds_cluster_impl policy requires configuration"),
            ));
        }
        Self::parse(value).map_err(|e| ConfigError::new(PARSE_CONTEXT, &e))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(yaml)
            .map_err(|e| ConfigError::new(PARSE_CONTEXT, &GenericError::from_msg(e.to_string())))?;
        Self::from_json(&value)
    }

    fn parse(value: &Value) -> Result<Self, GenericError> {
        let obj = as_object(value)?;
        let mut violations = Violations::default();
        let child_policy = violations.check(required(obj, "childPolicy", LbPolicyConfig::from_json));
        let cluster_name = violations.check(required(obj, "clusterName", as_string));
        let eds_service_name = violations.check(optional(obj, "edsServiceName", as_string)).flatten();
        let lrs_load_reporting_server =
            violations.check(optional(obj, "lrsLoadReportingServer", LoadReportingServer::from_json)).flatten();
        let max_concurrent_requests = violations.check(optional(obj, "maxConcurrentRequests", as_u32)).flatten();
        let drop_categories = violations.check(required(obj, "dropCategories", parse_drop_categories));
        violations.into_result()?;

        let (Some(child_policy), Some(cluster_name), Some(drop_categories)) =
            (child_policy, cluster_name, drop_categories)
        else {
            return Err(GenericError::from_msg("incomplete configuration"));
        };
        Ok(Self {
            child_policy,
            cluster_name,
            eds_service_name: eds_service_name.unwrap_or_default(),
            lrs_load_reporting_server,
            max_concurrent_requests: max_concurrent_requests.unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS),
            drop_categories,
        })
    }
}

impl FromStr for ClusterImplConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| ConfigError::new(PARSE_CONTEXT, &GenericError::from_msg(e.to_string())))?;
        Self::from_json(&value)
    }
}

impl TryFrom<&Value> for ClusterImplConfig {
    type Error = ConfigError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

impl<'de> Deserialize<'de> for ClusterImplConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

fn parse_drop_categories(value: &Value) -> Result<Vec<DropCategory>, GenericError> {
    collect_indexed(as_array(value)?, DropCategory::from_json)
}

fn collect_indexed<T>(
    entries: &[Value],
    mut parse: impl FnMut(&Value) -> Result<T, GenericError>,
) -> Result<Vec<T>, GenericError> {
    let mut violations = Violations::default();
    let parsed: Vec<_> =
        entries.iter().enumerate().filter_map(|(i, entry)| violations.check(parse(entry).with_index(i))).collect();
    violations.into_result().map(|()| parsed)
}

fn required<'a, T>(
    obj: &'a JsonObject,
    name: &'static str,
    parse: impl FnOnce(&'a Value) -> Result<T, GenericError>,
) -> Result<T, GenericError> {
    obj.get(name).ok_or(GenericError::MissingField).and_then(parse).with_node(name)
}

fn optional<'a, T>(
    obj: &'a JsonObject,
    name: &'static str,
    parse: impl FnOnce(&'a Value) -> Result<T, GenericError>,
) -> Result<Option<T>, GenericError> {
    obj.get(name).map(parse).transpose().with_node(name)
}

fn as_object(value: &Value) -> Result<&JsonObject, GenericError> {
    value.as_object().ok_or(GenericError::WrongType("object"))
}

fn as_array(value: &Value) -> Result<&[Value], GenericError> {
    value.as_array().map(Vec::as_slice).ok_or(GenericError::WrongType("array"))
}

fn as_string(value: &Value) -> Result<CompactString, GenericError> {
    value.as_str().map(CompactString::from).ok_or(GenericError::WrongType("string"))
}

fn as_u32(value: &Value) -> Result<u32, GenericError> {
    let number = value.as_u64().ok_or(GenericError::WrongType("non-negative integer"))?;
    u32::try_from(number).map_err(|_| GenericError::from_msg(format!("value {number} does not fit in uint32")))
}
