//! HTTP request handlers for the wiwb API.
//!
//! The handlers are a thin layer over the blocking core: each request is parsed,
//! handed to a blocking task and its error mapped through
//! [`WiwbError::status_code`](crate::error::WiwbError::status_code).

pub mod grids;
pub mod heartbeat;

pub use grids::{grid_file_handler, grid_sample_handler, GridQuery};
pub use heartbeat::heartbeat_handler;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::WiwbError;
use crate::logging::{create_http_trace_layer, log_request_error};
use crate::state::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/heartbeat", get(heartbeat_handler))
        .route("/grids/file", post(grid_file_handler))
        .route("/grids/sample", post(grid_sample_handler))
        .layer(create_http_trace_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JSON error body with the status the error maps to
pub(crate) fn error_response(
    error: WiwbError,
    endpoint: &str,
    request_id: &str,
    params: Option<&str>,
) -> Response {
    log_request_error(&error, endpoint, request_id, params);

    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(serde_json::json!({
            "error": error.to_string(),
            "request_id": request_id
        })),
    )
        .into_response()
}
