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

use std::num::NonZeroUsize;

use orion_lb_config::{config::Config, options::Options};
use tokio::runtime::{Builder, Runtime};

mod simulation;
pub use simulation::{Outcome, Simulation};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] orion_lb_config::Error),
    #[error(transparent)]
    Policy(#[from] orion_lb::Error),
    #[error("failed to reconfigure logging: {0}")]
    Tracing(#[from] tracing_subscriber::reload::Error),
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("simulation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub fn run() -> Result<()> {
    let mut tracing_manager = sim_tracing::TracingManager::new();

    let options = Options::parse_options();
    let Config { logging, cluster, load_reporting, traffic } = Config::new(&options)?;

    tracing_manager.update(logging)?;

    let runtime = build_tokio_runtime("orion-lb-sim", traffic.workers)?;
    let simulation = Simulation::new(cluster, load_reporting, traffic, options.policy_queue_length);
    let outcome = runtime.block_on(simulation.run())?;
    tracing::info!("{outcome}");
    Ok(())
}

fn build_tokio_runtime(thread_name: &str, num_threads: NonZeroUsize) -> std::io::Result<Runtime> {
    let mut builder = if num_threads.get() <= 1 {
        Builder::new_current_thread()
    } else {
        let mut builder = Builder::new_multi_thread();
        builder.worker_threads(num_threads.get());
        builder
    };
    builder.enable_all().thread_name(thread_name).build()
}

mod sim_tracing {
    use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
    use tracing_subscriber::{
        filter::LevelFilter,
        fmt,
        fmt::format::{DefaultFields, Format},
        layer::Layered,
        reload,
        reload::Handle,
        EnvFilter, Registry,
    };

    use orion_lb_config::config::LogConfig;

    use crate::Result;

    type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
    type RegistryLayer = fmt::Layer<FilteredRegistry, DefaultFields, Format, NonBlocking>;
    type FilterReloadHandle = Handle<EnvFilter, Registry>;
    type LayerReloadHandle = Handle<RegistryLayer, FilteredRegistry>;

    /// Logs to stdout until the configuration has been read, then switches to what it asks for.
    pub struct TracingManager {
        guard: WorkerGuard,
        layer_reload_handle: LayerReloadHandle,
        filter_reload_handle: FilterReloadHandle,
    }

    impl TracingManager {
        pub fn new() -> Self {
            let level = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).parse_lossy("");
            let (guard, layer_reload_handle, filter_reload_handle) = Self::init_tracing(Registry::default(), level);
            TracingManager { guard, layer_reload_handle, filter_reload_handle }
        }

        pub fn update(&mut self, log_conf: LogConfig) -> Result<()> {
            let LogConfig { level, directory, file } = log_conf;
            self.filter_reload_handle.modify(|filter| {
                *filter = EnvFilter::try_from_default_env().ok().or(level).unwrap_or_else(|| {
                    EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).parse_lossy("")
                });
            })?;

            if let Some(file) = file {
                self.layer_reload_handle.modify(|layer| {
                    let (new_guard, new_layer) = Self::file_layer(&file, directory.as_deref());
                    *layer = new_layer;
                    self.guard = new_guard;
                })?;
            }
            Ok(())
        }

        fn init_tracing(
            registry: Registry,
            log_level: EnvFilter,
        ) -> (WorkerGuard, LayerReloadHandle, FilterReloadHandle) {
            use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

            let env_filter = EnvFilter::try_from_default_env().unwrap_or(log_level);
            let (guard, layer) = Self::stdout_layer();
            let (layer, layer_reload_handle) = reload::Layer::new(layer);
            let (env_filter, filter_reload_handle) = reload::Layer::new(env_filter);

            registry.with(env_filter).with(layer).init();
            (guard, layer_reload_handle, filter_reload_handle)
        }

        fn stdout_layer() -> (WorkerGuard, RegistryLayer) {
            let out = std::io::stdout();
            let is_terminal = std::io::IsTerminal::is_terminal(&out);
            let (non_blocking, guard) = tracing_appender::non_blocking(out);
            let mut std_layer = fmt::layer().with_writer(non_blocking).with_thread_names(true);
            if !is_terminal {
                std_layer = std_layer.with_ansi(false);
            }
            (guard, std_layer)
        }

        fn file_layer(filename: &str, log_directory: Option<&str>) -> (WorkerGuard, RegistryLayer) {
            let file_appender = tracing_appender::rolling::hourly(log_directory.unwrap_or("."), filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking).with_thread_names(true);
            (guard, file_layer)
        }
    }
}
