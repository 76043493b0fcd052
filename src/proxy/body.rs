//! Outbound request body preparation.

use axum::body::Bytes;
use axum::http::{header, HeaderMap};

use crate::config::InvalidJsonPolicy;
use crate::error::GatewayError;
use crate::proxy::ProxyMethod;

/// Whether a content type names a JSON media type (`application/json`,
/// `application/problem+json`, ...).
pub fn is_json_content_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn declares_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_json_content_type)
}

/// Body to send upstream, or `None` for methods that carry no body.
///
/// A JSON-declared, non-blank body that fails to parse is handled by `policy`.
pub fn prepare_body(
    method: ProxyMethod,
    headers: &HeaderMap,
    body: &Bytes,
    policy: InvalidJsonPolicy,
) -> Result<Option<Bytes>, GatewayError> {
    if !method.carries_body() {
        return Ok(None);
    }

    let blank = body.iter().all(u8::is_ascii_whitespace);
    if blank || !declares_json(headers) {
        return Ok(Some(body.clone()));
    }

    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(_) => Ok(Some(body.clone())),
        Err(e) => match policy {
            InvalidJsonPolicy::SubstituteEmpty => {
                tracing::warn!(error = %e, "Invalid JSON in request body, forwarding {{}}");
                Ok(Some(Bytes::from_static(b"{}")))
            }
            InvalidJsonPolicy::Reject => Err(GatewayError::InvalidJsonBody),
        },
    }
}
