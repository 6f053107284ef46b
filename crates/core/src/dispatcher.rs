//! Command Batch Dispatcher
//!
//! Runs the commands of a batch strictly in order. Each command is resolved
//! against the [`HandlerRegistry`]; unknown types, skips and handler failures
//! are recorded and logged but never stop the rest of the batch.

use crate::{
    actuator::ActuatorAccessor,
    command::{BatchError, CommandBatch, CommandType},
    handlers::{HandlerOutcome, HandlerRegistry, SkipReason},
};
use futures::FutureExt;
use serde::Serialize;
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};
use tracing::{debug, error, info, instrument, warn};

/// What happened to a single command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandStatus {
    Performed,
    Skipped { reason: SkipReason },
    UnknownType,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReport {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: CommandType,
    #[serde(flatten)]
    pub status: CommandStatus,
}

/// The per-command record of one processed batch.
///
/// Callers over HTTP never see this; it exists for job tracking, logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub commands: Vec<CommandReport>,
}

impl DispatchReport {
    fn count(&self, pred: impl Fn(&CommandStatus) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(&c.status)).count()
    }

    pub fn performed(&self) -> usize {
        self.count(|s| matches!(s, CommandStatus::Performed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, CommandStatus::Skipped { .. }))
    }

    pub fn unknown(&self) -> usize {
        self.count(|s| matches!(s, CommandStatus::UnknownType))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, CommandStatus::Failed { .. }))
    }
}

/// Result of handing a raw payload to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Every command was attempted.
    Accepted(DispatchReport),
    /// The payload was refused; nothing ran.
    Rejected(BatchError),
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct Dispatcher {
    registry: HandlerRegistry,
    actuators: Arc<ActuatorAccessor>,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, actuators: Arc<ActuatorAccessor>) -> Self {
        Self {
            registry,
            actuators,
        }
    }

    pub fn actuators(&self) -> &ActuatorAccessor {
        &self.actuators
    }

    /// Validates `payload` and, if it holds a batch, runs it to completion.
    pub async fn dispatch_payload(&self, payload: &[u8]) -> DispatchOutcome {
        match CommandBatch::from_slice(payload) {
            Ok(batch) => DispatchOutcome::Accepted(self.dispatch(&batch).await),
            Err(e) => {
                debug!(error = %e, "Rejected command batch");
                DispatchOutcome::Rejected(e)
            }
        }
    }

    /// Runs every command of `batch` in input order.
    #[instrument(name = "dispatch", skip_all, fields(commands = batch.len()))]
    pub async fn dispatch(&self, batch: &CommandBatch) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (index, command) in batch.commands().iter().enumerate() {
            debug!(index, kind = %command.kind, args = ?command.args, "Processing command");

            let status = match &command.kind {
                CommandType::Known(kind) => match self.registry.get(*kind) {
                    Some(handler) => {
                        let result = AssertUnwindSafe(handler.handle(&self.actuators, &command.args))
                            .catch_unwind()
                            .await;
                        match result {
                            Ok(Ok(HandlerOutcome::Performed)) => CommandStatus::Performed,
                            Ok(Ok(HandlerOutcome::Skipped(reason))) => {
                                CommandStatus::Skipped { reason }
                            }
                            Ok(Err(e)) => {
                                error!(index, kind = %kind, error = %e, "Command failed");
                                CommandStatus::Failed {
                                    error: e.to_string(),
                                }
                            }
                            Err(panic) => {
                                let panic_msg = panic_message(&*panic);
                                error!(index, kind = %kind, panic_msg = %panic_msg, "Handler panicked");
                                CommandStatus::Failed {
                                    error: format!("handler panicked: {}", panic_msg),
                                }
                            }
                        }
                    }
                    None => {
                        warn!(index, kind = %kind, "No handler registered for command type");
                        CommandStatus::UnknownType
                    }
                },
                CommandType::Unknown(_) => {
                    warn!(index, kind = %command.kind, "Unknown command type");
                    CommandStatus::UnknownType
                }
            };

            report.commands.push(CommandReport {
                index,
                kind: command.kind.clone(),
                status,
            });
        }

        info!(
            performed = report.performed(),
            skipped = report.skipped(),
            unknown = report.unknown(),
            failed = report.failed(),
            "Batch processed"
        );
        report
    }
}
