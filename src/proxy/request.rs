//! Per-call forwarding input.

use std::net::IpAddr;

use axum::body::Bytes;
use axum::http::HeaderMap;

use crate::proxy::ProxyMethod;
use crate::resilience::Deadline;
use crate::security::CallerIdentity;

/// Facts about the inbound call that travel to the backend as headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub peer: Option<IpAddr>,
    /// "http" or "https" as seen by the gateway.
    pub scheme: String,
    pub host: Option<String>,
    /// Whole-request budget; outbound calls never outlive it.
    pub deadline: Option<Deadline>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            peer: None,
            scheme: "http".to_string(),
            host: None,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// One inbound call, resolved to a backend-relative path.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: ProxyMethod,
    /// Path relative to the service mount, without a leading slash.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub context: RequestContext,
    pub identity: Option<CallerIdentity>,
}

impl ProxyRequest {
    pub fn new(method: ProxyMethod, path: impl Into<String>, context: RequestContext) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            context,
            identity: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_identity(mut self, identity: Option<CallerIdentity>) -> Self {
        self.identity = identity;
        self
    }
}
