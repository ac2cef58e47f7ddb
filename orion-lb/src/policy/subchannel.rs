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

use std::{any::Any, fmt::Debug, net::SocketAddr, sync::Arc};

use orion_lb_config::config::Locality;

/// A resolved backend address plus the attributes the resolver attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    pub address: SocketAddr,
    pub locality: Option<Arc<Locality>>,
}

impl EndpointAddress {
    pub fn new(address: SocketAddr) -> Self {
        Self { address, locality: None }
    }

    #[must_use]
    pub fn with_locality(self, locality: Locality) -> Self {
        Self { locality: Some(Arc::new(locality)), ..self }
    }
}

/// A connection to one backend, created by the channel and handed out by pickers.
pub trait Subchannel: Debug + Send + Sync {
    fn address(&self) -> &EndpointAddress;

    fn request_connection(&self) {}

    fn reset_backoff(&self) {}

    /// Lets a balancer recognise the wrappers it created around subchannels.
    fn as_any(&self) -> &dyn Any;
}
