//! Request identification and context extraction.
//!
//! # Responsibilities
//! - Name the request-id header used end to end
//! - Read the request id assigned by the request-id layer
//! - Build the [`RequestContext`] forwarded to backends
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (outermost layer)
//! - Host and scheme come from the inbound request, never from X-Forwarded-*

use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{header, request::Parts, HeaderMap, HeaderName, Request},
};

use crate::proxy::RequestContext;
use crate::resilience::Deadline;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Read the request id from headers or a request.
pub trait RequestIdExt {
    /// The assigned request id, or "unknown" if none was set.
    fn request_id(&self) -> String;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> String {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string()
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> String {
        self.headers().request_id()
    }
}

impl RequestIdExt for Parts {
    fn request_id(&self) -> String {
        self.headers.request_id()
    }
}

/// Context for outbound calls derived from the inbound request parts.
pub fn request_context(parts: &Parts) -> RequestContext {
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let host = parts
        .uri
        .host()
        .map(str::to_string)
        .or_else(|| {
            parts
                .headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });
    let scheme = parts
        .uri
        .scheme_str()
        .unwrap_or("http")
        .to_string();

    RequestContext {
        request_id: parts.request_id(),
        peer,
        scheme,
        host,
        deadline: parts.extensions.get::<Deadline>().copied(),
    }
}
