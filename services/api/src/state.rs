//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources: the dispatcher, the optional background executor and
//! the configuration. It is built once at startup and passed to all handlers.

use crate::{
    config::{Config, ExecutionMode},
    executor::BatchExecutor,
};
use relay_core::{
    actuator::{ActuatorAccessor, remote::HttpActuatorConnector},
    dispatcher::Dispatcher,
    handlers::HandlerRegistry,
};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Present only in [`ExecutionMode::Async`].
    pub executor: Option<Arc<BatchExecutor>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the production services for `config`.
    ///
    /// Must be called from within a Tokio runtime when the execution mode is
    /// asynchronous, since the executor spawns its workers immediately.
    pub fn from_config(config: Config) -> Self {
        let accessor = if config.offline_mode {
            info!("Offline mode enabled, robot calls are disabled.");
            ActuatorAccessor::offline()
        } else {
            let connector = HttpActuatorConnector::new(&config.robot_host, config.robot_port);
            info!(bridge = %connector.base_url(), "Robot calls go through the bridge.");
            ActuatorAccessor::online(Arc::new(connector))
        };

        Self::with_accessor(config, Arc::new(accessor))
    }

    /// Same as [`AppState::from_config`] but with a caller-supplied accessor.
    pub fn with_accessor(config: Config, accessor: Arc<ActuatorAccessor>) -> Self {
        let registry = HandlerRegistry::standard(config.tts_service.clone());
        let dispatcher = Arc::new(Dispatcher::new(registry, accessor));

        let executor = match config.execution_mode {
            ExecutionMode::Sync => None,
            ExecutionMode::Async => Some(Arc::new(BatchExecutor::start(
                dispatcher.clone(),
                config.worker_count,
                config.queue_capacity,
                config.retained_jobs,
            ))),
        };

        Self {
            dispatcher,
            executor,
            config: Arc::new(config),
        }
    }
}
