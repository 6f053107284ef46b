//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the command API, CORS policy and OpenAPI documentation.

use crate::{
    config::DEFAULT_COMMANDS_PATH,
    handlers,
    models::{CommandBatchPayload, CommandPayload, ErrorResponse, HealthResponse, JobStatusResponse},
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::index,
        handlers::health,
        handlers::submit_commands,
        handlers::get_command_status,
    ),
    components(
        schemas(CommandBatchPayload, CommandPayload, JobStatusResponse, HealthResponse, ErrorResponse)
    ),
    tags(
        (name = "Relay API", description = "Command gateway for the robot")
    )
)]
pub struct ApiDoc;

/// The OpenAPI document with the command routes moved under `commands_path`.
pub fn api_doc(commands_path: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    if commands_path != DEFAULT_COMMANDS_PATH {
        let paths = std::mem::take(&mut doc.paths.paths);
        doc.paths.paths = paths
            .into_iter()
            .map(|(path, item)| match path.strip_prefix(DEFAULT_COMMANDS_PATH) {
                Some(rest) => (format!("{}{}", commands_path, rest), item),
                None => (path, item),
            })
            .collect();
    }
    doc
}

/// Creates the main Axum router for the application.
///
/// The command endpoints are mounted under `state.config.commands_path`.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let commands_path = app_state.config.commands_path.clone();

    let api_router = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route(&commands_path, post(handlers::submit_commands))
        .route(
            &format!("{}/{{id}}", commands_path),
            get(handlers::get_command_status),
        )
        .with_state(app_state);

    // Browsers on any origin may post commands.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::header::LOCATION]);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc(&commands_path)))
        .merge(api_router)
        .layer(cors)
}
