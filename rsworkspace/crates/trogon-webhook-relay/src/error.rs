//! Request-time errors and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::forward::ForwardError;

/// Everything a webhook call can fail with, mapped to `{ ok: false, error }`.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid_path")]
    InvalidPath,

    #[error("Unknown source '{0}'")]
    UnknownSource(String),

    #[error("Unknown host '{0}'")]
    UnknownDestination(String),

    /// The source is bound to a different destination than the path names.
    #[error("route_not_allowed")]
    RouteNotAllowed,

    #[error("invalid_body")]
    ReadBody(String),

    /// Never carries detail; the reason code only goes to the debug log.
    #[error("unauthorized")]
    Unauthorized,

    #[error("Missing env '{0}'")]
    MissingSecretEnv(String),

    /// Deployment problem detected at request time.
    #[error("{0}")]
    ConfigFault(String),

    #[error("{0}")]
    Upstream(#[from] ForwardError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPath | Self::RouteNotAllowed | Self::ReadBody(_) => StatusCode::BAD_REQUEST,
            Self::UnknownSource(_) | Self::UnknownDestination(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MissingSecretEnv(_) | Self::ConfigFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(ForwardError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(ForwardError::Transport(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Webhook relay failed");
        }
        (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}
