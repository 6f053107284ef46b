//! In-process actuator doubles for development and integration testing.
//!
//! These record everything they are asked to do so callers can assert on the
//! exact sequence of resolutions and spoken texts without a robot attached.

use super::{Actuator, ActuatorConnector, ActuatorError};
use async_trait::async_trait;
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

/// An actuator that remembers every text it was asked to speak.
#[derive(Default)]
pub struct RecordingActuator {
    spoken: Mutex<Vec<String>>,
    failure: Option<ActuatorError>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An actuator whose every `speak` call fails with `error` (after recording it).
    pub fn failing(error: ActuatorError) -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    /// Every text passed to `speak`, in call order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn speak(&self, text: &str) -> Result<(), ActuatorError> {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// A connector that hands out one shared [`RecordingActuator`].
pub struct RecordingConnector {
    actuator: Arc<RecordingActuator>,
    resolutions: AtomicUsize,
    failures_left: AtomicUsize,
    failure: Option<ActuatorError>,
}

impl Default for RecordingConnector {
    fn default() -> Self {
        Self::with_actuator(Arc::new(RecordingActuator::new()))
    }
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actuator(actuator: Arc<RecordingActuator>) -> Self {
        Self {
            actuator,
            resolutions: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            failure: None,
        }
    }

    /// A connector whose first `count` lookups fail with `error`.
    pub fn failing_first(count: usize, error: ActuatorError) -> Self {
        Self {
            failures_left: AtomicUsize::new(count),
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn actuator(&self) -> Arc<RecordingActuator> {
        self.actuator.clone()
    }

    /// Number of lookups attempted so far, failed ones included.
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActuatorConnector for RecordingConnector {
    async fn resolve(&self, _service: &str) -> Result<Arc<dyn Actuator>, ActuatorError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
        }

        Ok(self.actuator.clone())
    }
}
