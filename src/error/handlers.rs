//! Error handlers
//!
//! Maps gateway errors onto HTTP status codes and the `{error, kind}` envelope.

use axum::{
    Json,
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{error, warn};
use serde::Serialize;
use tokio::task::JoinError;

use crate::error::types::{ErrorKind, GatewayError};

/// Error envelope returned to callers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

/// Log a gateway error at the level its kind deserves
pub fn handle_error(err: &GatewayError) {
    match err.kind() {
        ErrorKind::IoError => error!("Gateway error: {}", err),
        kind => warn!("Request rejected ({}): {}", kind.as_str(), err),
    }
}

/// Convert error to HTTP status code
pub fn error_to_status(err: &GatewayError) -> StatusCode {
    match err.kind() {
        ErrorKind::InvalidInput
        | ErrorKind::PathRejected
        | ErrorKind::NotFound
        | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
        ErrorKind::IoError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        handle_error(&self);
        let status = error_to_status(&self);
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

/// A blocking task that panicked or was aborted
impl From<JoinError> for GatewayError {
    fn from(err: JoinError) -> Self {
        error!("Blocking file-system task failed: {}", err);
        GatewayError::IoError("operation did not complete".into())
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::InvalidInput(rejection.body_text())
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::InvalidInput(rejection.body_text())
    }
}

impl From<FormRejection> for GatewayError {
    fn from(rejection: FormRejection) -> Self {
        GatewayError::InvalidInput(rejection.body_text())
    }
}
