//! Intake Server
//!
//! HTTP text transport for the intake line plus shared tracing setup for the
//! server and headless binaries.

pub mod http;
pub mod metrics;
pub mod session;
pub mod state;
pub mod telemetry;

pub use http::create_router;
pub use metrics::{init_metrics, metrics_handler};
pub use session::{CallEntry, SessionManager};
pub use state::AppState;
pub use telemetry::init_tracing;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use intake_agent::AgentError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Call not found: {0}")]
    NotFound(String),

    #[error("Call {0} is already closed")]
    Closed(String),

    #[error("Max sessions reached ({0})")]
    Capacity(usize),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn code(&self) -> &'static str {
        match self {
            ServerError::NotFound(_) => "not_found",
            ServerError::Closed(_) => "session_closed",
            ServerError::Capacity(_) => "capacity",
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::Config(_) => "config",
            ServerError::Internal(_) => "internal",
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Closed(_) => StatusCode::CONFLICT,
            ServerError::Capacity(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Config(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        StatusCode::from(&err)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<AgentError> for ServerError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::SessionClosed(id) => ServerError::Closed(id),
            AgentError::Config(msg) => ServerError::Config(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<intake_config::ConfigError> for ServerError {
    fn from(err: intake_config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}
