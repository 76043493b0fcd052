//! Forwarded response construction.
//!
//! # Design Decisions
//! - Status is copied verbatim, including 4xx/5xx from the backend
//! - Only Content-Type and Cache-Control survive from upstream headers
//! - Body is re-interpreted once: JSON, text, opaque bytes or empty

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::error::GatewayError;
use crate::http::X_REQUEST_ID;
use crate::proxy::body::is_json_content_type;
use crate::proxy::client::UpstreamReply;
use crate::security::headers::filter_response_headers;

pub const X_PROXY: HeaderName = HeaderName::from_static("x-proxy");
pub const X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");

/// Interpreted upstream body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Text { content_type: String, text: String },
    Binary { content_type: String, bytes: Bytes },
}

impl ResponseBody {
    /// Classify raw upstream bytes given the declared content type.
    pub fn classify(service: &str, content_type: Option<&str>, bytes: Bytes) -> Result<Self, GatewayError> {
        if bytes.is_empty() {
            return Ok(ResponseBody::Empty);
        }
        if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
            return Ok(ResponseBody::Json(value));
        }

        let claims_json = content_type.is_some_and(is_json_content_type);
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => {
                let content_type = match content_type {
                    Some(ct) if !claims_json => ct.to_string(),
                    _ => "text/plain; charset=utf-8".to_string(),
                };
                Ok(ResponseBody::Text { content_type, text })
            }
            Err(e) => {
                let claims_text = content_type
                    .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/"));
                if claims_json || claims_text {
                    return Err(GatewayError::Upstream {
                        service: service.to_string(),
                        reason: format!("body declared as {:?} is not valid UTF-8: {}", content_type, e),
                    });
                }
                Ok(ResponseBody::Binary {
                    content_type: content_type.unwrap_or("application/octet-stream").to_string(),
                    bytes,
                })
            }
        }
    }
}

/// Response returned to the caller for a proxied request.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ProxyResponse {
    /// Build the forwarded response from a raw upstream reply.
    pub fn from_upstream(
        service: &str,
        reply: UpstreamReply,
        proxy_name: &str,
        request_id: &str,
        elapsed: Duration,
    ) -> Result<Self, GatewayError> {
        let content_type = reply
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let body = ResponseBody::classify(service, content_type, reply.body)?;

        let mut headers = filter_response_headers(&reply.headers);
        if let Ok(v) = HeaderValue::from_str(proxy_name) {
            headers.insert(X_PROXY, v);
        }
        if let Ok(v) = HeaderValue::from_str(request_id) {
            headers.insert(X_REQUEST_ID, v);
        }
        headers.insert(X_RESPONSE_TIME, response_time_value(elapsed));

        Ok(Self {
            status: reply.status,
            headers,
            body,
        })
    }
}

/// Elapsed milliseconds with two decimals, e.g. "12.34".
fn response_time_value(elapsed: Duration) -> HeaderValue {
    let ms = elapsed.as_secs_f64() * 1000.0;
    HeaderValue::from_str(&format!("{:.2}", ms)).unwrap_or(HeaderValue::from_static("0.00"))
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let ProxyResponse {
            status,
            mut headers,
            body,
        } = self;

        let body = match body {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Json(value) => match serde_json::to_vec(&value) {
                Ok(bytes) => {
                    if !headers
                        .get(header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .is_some_and(is_json_content_type)
                    {
                        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    }
                    Body::from(bytes)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize forwarded JSON body");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            },
            ResponseBody::Text { content_type, text } => {
                set_content_type(&mut headers, &content_type);
                Body::from(text)
            }
            ResponseBody::Binary { content_type, bytes } => {
                set_content_type(&mut headers, &content_type);
                Body::from(bytes)
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        response.headers_mut().extend(headers);
        response
    }
}

fn set_content_type(headers: &mut HeaderMap, content_type: &str) {
    if let Ok(v) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, v);
    }
}
