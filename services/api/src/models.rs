//! API Models
//!
//! Response bodies and the documented request shape used for the OpenAPI
//! document. The request body itself is validated by `relay_core::command`.

use crate::executor::JobState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// One command in a batch.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct CommandPayload {
    #[serde(rename = "type")]
    #[schema(example = "say_something")]
    pub kind: String,
    /// Scalars or nulls; nulls are ignored.
    #[schema(example = json!(["Hello", "World"]))]
    #[serde(default)]
    pub args: Vec<Value>,
}

/// The body of a command submission. `commands` must be a non-empty list.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct CommandBatchPayload {
    pub commands: Vec<CommandPayload>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct JobStatusResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(example = "completed")]
    pub state: String,
    /// Per-command results, once the batch has completed.
    pub report: Option<Value>,
    pub error: Option<String>,
}

impl JobStatusResponse {
    pub fn new(id: Uuid, state: &JobState) -> Self {
        let (name, report, error) = match state {
            JobState::Queued => ("queued", None, None),
            JobState::Running => ("running", None, None),
            JobState::Completed { report } => {
                ("completed", serde_json::to_value(report).ok(), None)
            }
            JobState::Failed { error } => ("failed", None, Some(error.clone())),
        };
        Self {
            id,
            state: name.to_string(),
            report,
            error,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub offline: bool,
    #[schema(example = "async")]
    pub mode: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
