//! Actuator Access
//!
//! An actuator is a named capability on the robot (e.g. speech synthesis)
//! reached through a remote bridge. This module defines the contracts for
//! resolving and driving actuators, plus [`ActuatorAccessor`], which memoizes
//! one handle per service name for the lifetime of the process.

pub mod mock;
pub mod remote;

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Failures raised while resolving or calling a remote actuator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActuatorError {
    #[error("actuator service '{0}' was not found")]
    ServiceNotFound(String),
    #[error("actuator bridge at {address} is unreachable: {reason}")]
    Unreachable { address: String, reason: String },
    #[error("actuator service '{service}' failed: {reason}")]
    Remote { service: String, reason: String },
}

/// A resolved handle to a speech-capable actuator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Speaks `text` on the robot. Returns once the bridge has accepted the call.
    async fn speak(&self, text: &str) -> Result<(), ActuatorError>;
}

/// Name-addressed lookup of actuators on the robot bridge.
#[async_trait]
pub trait ActuatorConnector: Send + Sync {
    async fn resolve(&self, service: &str) -> Result<Arc<dyn Actuator>, ActuatorError>;
}

type HandleCell = Arc<OnceCell<Arc<dyn Actuator>>>;

/// Lazily resolves and caches actuator handles.
///
/// In offline mode there is no connector at all, so no lookup can ever be
/// attempted. Online, each service name gets a one-time initializer: concurrent
/// first callers share a single lookup, and a failed lookup leaves the slot
/// empty so the next caller retries.
pub struct ActuatorAccessor {
    connector: Option<Arc<dyn ActuatorConnector>>,
    handles: Mutex<HashMap<String, HandleCell>>,
}

impl ActuatorAccessor {
    /// Creates an accessor that resolves handles through `connector`.
    pub fn online(connector: Arc<dyn ActuatorConnector>) -> Self {
        Self {
            connector: Some(connector),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an accessor that never yields a handle.
    pub fn offline() -> Self {
        Self {
            connector: None,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.connector.is_none()
    }

    /// Returns the memoized handle for `service`, resolving it on first use.
    ///
    /// `Ok(None)` means the accessor is offline. Resolution failures are
    /// returned to the caller and are not cached.
    pub async fn get(&self, service: &str) -> Result<Option<Arc<dyn Actuator>>, ActuatorError> {
        let Some(connector) = &self.connector else {
            debug!(service, "Offline mode, not resolving actuator");
            return Ok(None);
        };

        let cell = {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            handles.entry(service.to_string()).or_default().clone()
        };

        let handle = cell
            .get_or_try_init(|| async {
                info!(service, "Resolving actuator service");
                connector.resolve(service).await
            })
            .await?;

        Ok(Some(handle.clone()))
    }
}
