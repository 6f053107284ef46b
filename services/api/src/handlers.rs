//! Axum Handlers for the REST API
//!
//! Command submission, job status polling, health and the landing page.
//! Handlers use `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json, Response},
};
use relay_core::{command::CommandBatch, dispatcher::DispatchOutcome};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    config::ExecutionMode,
    executor::ExecutorError,
    models::{CommandBatchPayload, ErrorResponse, HealthResponse, JobStatusResponse},
    state::AppState,
};

const LANDING_PAGE: &str = include_str!("../static/index.html");
const COMMANDS_PATH_PLACEHOLDER: &str = "{{COMMANDS_PATH}}";

pub enum ApiError {
    /// The batch was refused. Answered with an empty body.
    Rejected,
    NotFound(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Rejected => StatusCode::BAD_REQUEST.into_response(),
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Unavailable(message) => {
                error!("Service unavailable: {}", message);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        ApiError::Unavailable(err.to_string())
    }
}

/// Serve the landing page.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page", body = String, content_type = "text/html"))
)]
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(LANDING_PAGE.replace(COMMANDS_PATH_PLACEHOLDER, &state.config.commands_path))
}

/// Report liveness and the active execution settings.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        offline: state.dispatcher.actuators().is_offline(),
        mode: state.config.execution_mode.to_string(),
    })
}

/// Submit a batch of commands for the robot.
///
/// In asynchronous mode the batch is queued and `202 Accepted` is returned
/// immediately with a `Location` header for polling. In synchronous mode the
/// batch runs before the response and `200 OK` is returned. Per-command
/// results are never part of this response. The path shown is the default
/// and follows `COMMANDS_PATH`.
#[utoipa::path(
    post,
    path = "/api/commands",
    request_body = CommandBatchPayload,
    responses(
        (status = 200, description = "Batch processed (synchronous mode)"),
        (status = 202, description = "Batch accepted for processing (asynchronous mode)"),
        (status = 400, description = "Missing or empty commands"),
        (status = 503, description = "Command queue is full or shutting down", body = ErrorResponse)
    )
)]
pub async fn submit_commands(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    match state.config.execution_mode {
        ExecutionMode::Sync => {
            // Runs on its own task so a client hanging up cannot cancel the batch midway.
            let dispatcher = state.dispatcher.clone();
            let outcome = tokio::spawn(async move { dispatcher.dispatch_payload(&body).await })
                .await
                .map_err(|e| ApiError::Unavailable(format!("batch task aborted: {}", e)))?;

            match outcome {
                DispatchOutcome::Accepted(_) => Ok(StatusCode::OK.into_response()),
                DispatchOutcome::Rejected(_) => Err(ApiError::Rejected),
            }
        }
        ExecutionMode::Async => {
            let batch = CommandBatch::from_slice(&body).map_err(|e| {
                debug!(error = %e, "Rejected command batch");
                ApiError::Rejected
            })?;
            info!(commands = batch.len(), "Received command batch");

            let executor = state
                .executor
                .as_ref()
                .ok_or(ApiError::Unavailable(ExecutorError::Closed.to_string()))?;
            let ticket = executor.submit(batch)?;
            let location = format!("{}/{}", state.config.commands_path, ticket.id);
            Ok((StatusCode::ACCEPTED, [(header::LOCATION, location)]).into_response())
        }
    }
}

/// Look up the status of a queued batch.
#[utoipa::path(
    get,
    path = "/api/commands/{id}",
    responses(
        (status = 200, description = "Batch status", body = JobStatusResponse),
        (status = 404, description = "Unknown or expired batch", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Batch ID from the Location header")
    )
)]
pub async fn get_command_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let not_found = || ApiError::NotFound(format!("Batch with id '{}' not found", id));

    let executor = state.executor.as_ref().ok_or_else(not_found)?;
    let job = executor.tracker().get(&id).ok_or_else(not_found)?;

    Ok(Json(JobStatusResponse::new(id, &job)))
}
