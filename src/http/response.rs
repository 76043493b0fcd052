//! Gateway-originated response bodies.
//!
//! Proxied responses are built in `proxy::response`; this module covers the
//! JSON the gateway produces itself (aggregated views, info endpoints).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{success: true, data, message, request_id}`.
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub message: String,
    pub request_id: String,
}

impl<T: Serialize> SuccessEnvelope<T> {
    pub fn new(data: T, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
            request_id: request_id.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for SuccessEnvelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let value = serde_json::to_value(SuccessEnvelope::new(json!({"a": 1}), "ok", "r")).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "data": {"a": 1}, "message": "ok", "request_id": "r"})
        );
    }
}
