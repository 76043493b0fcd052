//! Gateway error taxonomy.
//!
//! Every failure is classified once, as close to its source as possible, into a
//! [`GatewayError`]. Handlers turn it into the fixed JSON envelope
//! `{error, message, request_id}`; the detailed `Display` text only ever goes to
//! the operational log.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Caller-visible error kinds.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No descriptor registered under this name.
    #[error("unknown service '{0}'")]
    UnknownService(String),

    /// The service's breaker rejected the call without attempting it.
    #[error("circuit breaker for '{service}' is open")]
    CircuitOpen { service: String },

    /// The outbound call exceeded the descriptor timeout.
    #[error("call to '{service}' timed out after {after:?}")]
    Timeout { service: String, after: Duration },

    /// The connection could not be established or was lost.
    #[error("connection to '{service}' failed: {source}")]
    Connection {
        service: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The whole inbound request ran past its deadline.
    #[error("request exceeded the {0:?} gateway deadline")]
    DeadlineExceeded(Duration),

    /// Inbound method outside GET/POST/PUT/PATCH/DELETE.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// The backend replied but the reply could not be interpreted.
    #[error("uninterpretable response from '{service}': {reason}")]
    Upstream { service: String, reason: String },

    /// The backend replied with a non-success status where a payload was required.
    #[error("'{service}' responded with {status}")]
    UpstreamStatus { service: String, status: StatusCode },

    /// Malformed JSON body under the `reject` policy.
    #[error("request body is not valid JSON")]
    InvalidJsonBody,

    /// Identity capability check failed.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A required dependency could not be reached; the message is caller-safe.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Fixed JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: &'static str,
    pub message: String,
    pub request_id: String,
}

impl GatewayError {
    /// HTTP status surfaced to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UnknownService(_) | GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::CircuitOpen { .. } | GatewayError::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::Timeout { .. } | GatewayError::DeadlineExceeded(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            GatewayError::Connection { .. } | GatewayError::UpstreamStatus { .. } => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::UnsupportedMethod(_)
            | GatewayError::InvalidJsonBody
            | GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Upstream { .. } | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short error title for the envelope's `error` field.
    pub fn title(&self) -> &'static str {
        match self {
            GatewayError::UnknownService(_) => "Unknown service",
            GatewayError::CircuitOpen { .. } => "Service unavailable",
            GatewayError::Timeout { .. } => "Service timeout",
            GatewayError::DeadlineExceeded(_) => "Gateway timeout",
            GatewayError::Connection { .. } => "Service connection error",
            GatewayError::UnsupportedMethod(_) => "Unsupported method",
            GatewayError::Upstream { .. } => "Response forwarding error",
            GatewayError::UpstreamStatus { .. } => "Upstream error",
            GatewayError::InvalidJsonBody => "Invalid request body",
            GatewayError::Unauthorized(_) => "Unauthorized",
            GatewayError::BadRequest(_) => "Bad request",
            GatewayError::NotFound(_) => "Not found",
            GatewayError::Unavailable(_) => "Service unavailable",
            GatewayError::Internal(_) => "Internal server error",
        }
    }

    /// Message safe to show the caller. Never includes transport or parse internals.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::UnknownService(name) => format!("No service named '{}' is registered", name),
            GatewayError::CircuitOpen { .. } => {
                "The requested service is temporarily unavailable".to_string()
            }
            GatewayError::Timeout { .. } => "The service request timed out".to_string(),
            GatewayError::DeadlineExceeded(_) => "The request took too long to complete".to_string(),
            GatewayError::Connection { .. } => {
                "Unable to connect to the requested service".to_string()
            }
            GatewayError::UnsupportedMethod(method) => {
                format!("HTTP method {} is not supported", method)
            }
            GatewayError::Upstream { .. } => "Error processing service response".to_string(),
            GatewayError::UpstreamStatus { status, .. } => {
                format!("The service responded with status {}", status.as_u16())
            }
            GatewayError::InvalidJsonBody => "Request body must be valid JSON".to_string(),
            GatewayError::Unauthorized(reason) => (*reason).to_string(),
            GatewayError::BadRequest(message)
            | GatewayError::NotFound(message)
            | GatewayError::Unavailable(message) => message.clone(),
            GatewayError::Internal(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// Build the envelope for this error.
    pub fn envelope(&self, request_id: &str) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.title(),
            message: self.public_message(),
            request_id: request_id.to_string(),
        }
    }

    /// Convert into the caller-visible response.
    pub fn into_response_with(self, request_id: &str) -> Response {
        (self.status(), Json(self.envelope(request_id))).into_response()
    }

    /// Emit the full detail to the operational log at a level matching the kind.
    pub fn log(&self, service: &str, request_id: &str) {
        match self {
            GatewayError::CircuitOpen { .. }
            | GatewayError::Timeout { .. }
            | GatewayError::DeadlineExceeded(_)
            | GatewayError::UpstreamStatus { .. }
            | GatewayError::Unavailable(_) => {
                tracing::warn!(service = %service, request_id = %request_id, error = %self, "Upstream call failed");
            }
            GatewayError::UnsupportedMethod(_)
            | GatewayError::InvalidJsonBody
            | GatewayError::BadRequest(_)
            | GatewayError::NotFound(_)
            | GatewayError::UnknownService(_)
            | GatewayError::Unauthorized(_) => {
                tracing::info!(service = %service, request_id = %request_id, error = %self, "Request rejected");
            }
            GatewayError::Connection { .. }
            | GatewayError::Upstream { .. }
            | GatewayError::Internal(_) => {
                tracing::error!(service = %service, request_id = %request_id, error = %self, "Proxy error");
            }
        }
    }
}
