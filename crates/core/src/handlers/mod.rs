//! Command Handlers
//!
//! Every [`CommandKind`] maps to one [`CommandHandler`] in a
//! [`HandlerRegistry`]. Handlers receive the shared [`ActuatorAccessor`] and
//! the command's raw arguments and report whether they performed an action.

mod say;

pub use say::{SayHandler, join_args};

use crate::{
    actuator::{ActuatorAccessor, ActuatorError},
    command::CommandKind,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashMap, fmt, sync::Arc};

/// Why a handler chose not to act. None of these are errors for the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Offline mode: no actuator handle exists.
    ActuatorUnavailable,
    /// The actuator lookup failed.
    ActuatorUnresolved,
    NoArguments,
    NoValidText,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::ActuatorUnavailable => "actuator unavailable",
            SkipReason::ActuatorUnresolved => "actuator could not be resolved",
            SkipReason::NoArguments => "no arguments",
            SkipReason::NoValidText => "no valid text",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Performed,
    Skipped(SkipReason),
}

/// A failure that aborts the current command only.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("actuator call failed: {0}")]
    Actuator(#[from] ActuatorError),
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        actuators: &ActuatorAccessor,
        args: &[Value],
    ) -> Result<HandlerOutcome, CommandError>;
}

/// Maps command kinds to their handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<CommandKind, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used in production: `say_something` speaks through
    /// the text-to-speech service named `tts_service`.
    pub fn standard(tts_service: impl Into<String>) -> Self {
        let mut registry = Self::new();
        registry.register(
            CommandKind::SaySomething,
            Arc::new(SayHandler::new(tts_service)),
        );
        registry
    }

    /// Registers `handler` for `kind`, replacing any previous handler.
    pub fn register(&mut self, kind: CommandKind, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: CommandKind) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_every_kind() {
        let registry = HandlerRegistry::standard("ALTextToSpeech");
        for kind in CommandKind::ALL {
            assert!(registry.get(kind).is_some(), "no handler for {}", kind);
        }
        assert_eq!(registry.len(), CommandKind::ALL.len());
    }

    #[test]
    fn test_empty_registry_has_no_handlers() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(CommandKind::SaySomething).is_none());
    }

    #[test]
    fn test_skip_reason_display_and_serialization() {
        assert_eq!(SkipReason::ActuatorUnavailable.to_string(), "actuator unavailable");
        assert_eq!(
            serde_json::to_string(&SkipReason::NoValidText).unwrap(),
            "\"no_valid_text\""
        );
    }
}
