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
    borrow::Cow,
    fmt::{Debug, Display},
};

pub(crate) fn is_default<T: PartialEq + Default>(value: &T) -> bool {
    *value == T::default()
}

#[derive(Clone)]
enum TraceNode {
    Field(Cow<'static, str>),
    Name(Cow<'static, str>),
    Index(usize),
}

impl Display for TraceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceNode::Field(field) => f.write_str(field),
            TraceNode::Name(name) => write!(f, "[\"{name}\"]"),
            TraceNode::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Path from the root of a document down to the node an error was raised on.
///
/// Nodes are pushed while the error bubbles up, so the innermost node comes first.
#[derive(Clone, Default)]
struct FieldTrace {
    vec: Vec<TraceNode>,
}

impl FieldTrace {
    fn push(&mut self, value: TraceNode) {
        self.vec.push(value);
    }

    fn outermost_first(&self) -> impl Iterator<Item = &TraceNode> {
        self.vec.iter().rev()
    }
}

fn render_path<'a>(nodes: impl IntoIterator<Item = &'a TraceNode>) -> String {
    let mut path = String::new();
    for node in nodes {
        if matches!(node, TraceNode::Field(_)) && !path.is_empty() {
            path.push('.');
        }
        path.push_str(&node.to_string());
    }
    path
}

impl Display for FieldTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&render_path(self.outermost_first()))
    }
}

impl Debug for FieldTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[derive(thiserror::Error, Debug, Clone)]
#[allow(private_interfaces)]
pub enum GenericError {
    #[error("error parsing field {0}")]
    TracedError(FieldTrace, #[source] Box<Self>),
    #[error("{0}")]
    Message(Cow<'static, str>),
    #[error("required field missing")]
    MissingField,
    #[error("type should be {0}")]
    WrongType(&'static str),
    #[error("{} violations", .0.len())]
    Violations(Vec<GenericError>),
}

impl GenericError {
    #[must_use]
    pub(crate) fn with_node<T: Into<Cow<'static, str>>>(self, node: T) -> Self {
        self.with_trace_node(TraceNode::Field(node.into()))
    }

    #[must_use]
    pub(crate) fn with_index(self, index: usize) -> Self {
        self.with_trace_node(TraceNode::Index(index))
    }

    #[must_use]
    pub(crate) fn with_name<T: Into<Cow<'static, str>>>(self, name: T) -> Self {
        self.with_trace_node(TraceNode::Name(name.into()))
    }

    #[must_use]
    fn with_trace_node(self, node: TraceNode) -> Self {
        match self {
            Self::TracedError(mut fields, error) => {
                fields.push(node);
                Self::TracedError(fields, error)
            },
            other => {
                let mut fields = FieldTrace::default();
                fields.push(node);
                Self::TracedError(fields, other.into())
            },
        }
    }

    pub fn from_msg<T: Into<Cow<'static, str>>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Walks the error tree and emits one entry per leaf, each carrying its full field path.
    fn flatten_into(&self, prefix: &mut Vec<TraceNode>, out: &mut Vec<Violation>) {
        match self {
            Self::TracedError(trace, inner) => {
                let depth = prefix.len();
                prefix.extend(trace.outermost_first().cloned());
                inner.flatten_into(prefix, out);
                prefix.truncate(depth);
            },
            Self::Violations(errors) => {
                for error in errors {
                    error.flatten_into(prefix, out);
                }
            },
            leaf => out.push(Violation { field: render_path(prefix.iter()), message: leaf.to_string() }),
        }
    }
}

pub(crate) trait WithNodeOnResult {
    fn with_node<T: Into<Cow<'static, str>>>(self, node: T) -> Self;
    fn with_index(self, index: usize) -> Self;
    fn with_name<T: Into<Cow<'static, str>>>(self, name: T) -> Self;
}

impl<T> WithNodeOnResult for Result<T, GenericError> {
    fn with_node<Node: Into<Cow<'static, str>>>(self, node: Node) -> Self {
        self.map_err(|e| e.with_node(node))
    }

    fn with_index(self, index: usize) -> Self {
        self.map_err(|e| e.with_index(index))
    }

    fn with_name<Node: Into<Cow<'static, str>>>(self, name: Node) -> Self {
        self.map_err(|e| e.with_name(name))
    }
}

/// Accumulates errors so a parser can keep going and report every problem in one pass.
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<GenericError>);

impl Violations {
    pub(crate) fn push(&mut self, error: GenericError) {
        self.0.push(error);
    }

    pub(crate) fn check<T>(&mut self, result: Result<T, GenericError>) -> Option<T> {
        result.map_err(|e| self.push(e)).ok()
    }

    pub(crate) fn into_result(mut self) -> Result<(), GenericError> {
        match self.0.len() {
            0 => Ok(()),
            1 => Err(self.0.remove(0)),
            _ => Err(GenericError::Violations(self.0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "field:{} error:{}", self.field, self.message)
        }
    }
}

/// A configuration document that failed validation, with every violation found in it.
#[derive(Debug, Clone)]
pub struct ConfigError {
    context: Cow<'static, str>,
    violations: Vec<Violation>,
}

impl ConfigError {
    pub fn new<T: Into<Cow<'static, str>>>(context: T, error: &GenericError) -> Self {
        let mut violations = Vec::new();
        error.flatten_into(&mut Vec::new(), &mut violations);
        Self { context: context.into(), violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: [", self.context)?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            Display::fmt(violation, f)?;
        }
        f.write_str("]")
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_traces_render_as_paths() {
        let error = GenericError::MissingField.with_node("category").with_index(2).with_node("dropCategories");
        let config_error = ConfigError::new("test", &error);
        assert_eq!(config_error.violations()[0].field, "dropCategories[2].category");
        assert_eq!(config_error.to_string(), "test: [field:dropCategories[2].category error:required field missing]");
    }

    #[test]
    fn violations_are_flattened_in_order() {
        let mut violations = Violations::default();
        violations.push(GenericError::MissingField.with_node("a"));
        let inner = GenericError::Violations(vec![
            GenericError::WrongType("string").with_node("x"),
            GenericError::from_msg("bad").with_name("y"),
        ]);
        violations.push(inner.with_node("b"));
        let error = violations.into_result().unwrap_err();
        let config_error = ConfigError::new("ctx", &error);
        let rendered: Vec<_> = config_error.violations().iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "field:a error:required field missing",
                "field:b.x error:type should be string",
                "field:b[\"y\"] error:bad",
            ]
        );
    }

    #[test]
    fn empty_collector_is_ok() {
        assert!(Violations::default().into_result().is_ok());
    }
}
