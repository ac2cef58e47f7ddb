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

use std::{fmt::Debug, sync::Arc};

use http::HeaderMap;

use super::{status::Status, subchannel::Subchannel};

#[derive(Debug, Clone, Copy)]
pub struct PickArgs<'a> {
    pub path: &'a str,
    pub headers: &'a HeaderMap,
}

impl<'a> PickArgs<'a> {
    pub fn new(path: &'a str, headers: &'a HeaderMap) -> Self {
        Self { path, headers }
    }
}

/// Per-call hooks attached to a completed pick.
///
/// `start` runs when the call is sent on the subchannel, `finish` once with the final status.
pub trait CallTracker: Send {
    fn start(&mut self);
    fn finish(&mut self, status: &Status);
}

pub struct CompletePick {
    pub subchannel: Arc<dyn Subchannel>,
    pub call_tracker: Option<Box<dyn CallTracker>>,
}

impl CompletePick {
    pub fn new(subchannel: Arc<dyn Subchannel>) -> Self {
        Self { subchannel, call_tracker: None }
    }
}

impl Debug for CompletePick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletePick")
            .field("subchannel", &self.subchannel)
            .field("call_tracker", &self.call_tracker.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub enum PickResult {
    /// Send the call on this subchannel.
    Complete(CompletePick),
    /// No decision yet, retry with the next picker.
    Queue,
    /// Fail the call unless it is wait-for-ready.
    Fail(Status),
    /// Fail the call, wait-for-ready or not.
    Drop(Status),
}

/// Immutable per-configuration routing decision. Called concurrently from every request path.
pub trait Picker: Debug + Send + Sync {
    fn pick(&self, args: &PickArgs<'_>) -> PickResult;
}

#[derive(Debug, Default)]
pub struct QueuePicker;

impl Picker for QueuePicker {
    fn pick(&self, _: &PickArgs<'_>) -> PickResult {
        PickResult::Queue
    }
}

#[derive(Debug)]
pub struct FailPicker {
    status: Status,
}

impl FailPicker {
    pub fn new(status: Status) -> Self {
        Self { status }
    }
}

impl Picker for FailPicker {
    fn pick(&self, _: &PickArgs<'_>) -> PickResult {
        PickResult::Fail(self.status.clone())
    }
}
