//! Closed set of forwardable HTTP methods.

use std::fmt;

use axum::http::Method;

use crate::error::GatewayError;

/// Methods the gateway forwards. Anything else is rejected before any
/// outbound call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl ProxyMethod {
    pub fn as_http(self) -> Method {
        match self {
            ProxyMethod::Get => Method::GET,
            ProxyMethod::Post => Method::POST,
            ProxyMethod::Put => Method::PUT,
            ProxyMethod::Patch => Method::PATCH,
            ProxyMethod::Delete => Method::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProxyMethod::Get => "GET",
            ProxyMethod::Post => "POST",
            ProxyMethod::Put => "PUT",
            ProxyMethod::Patch => "PATCH",
            ProxyMethod::Delete => "DELETE",
        }
    }

    /// GET and DELETE are forwarded without a body.
    pub fn carries_body(self) -> bool {
        !matches!(self, ProxyMethod::Get | ProxyMethod::Delete)
    }

    /// Safe to replay against a backend.
    pub fn is_safe(self) -> bool {
        matches!(self, ProxyMethod::Get)
    }
}

impl TryFrom<&Method> for ProxyMethod {
    type Error = GatewayError;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        match *method {
            Method::GET => Ok(ProxyMethod::Get),
            Method::POST => Ok(ProxyMethod::Post),
            Method::PUT => Ok(ProxyMethod::Put),
            Method::PATCH => Ok(ProxyMethod::Patch),
            Method::DELETE => Ok(ProxyMethod::Delete),
            _ => Err(GatewayError::UnsupportedMethod(method.to_string())),
        }
    }
}

impl fmt::Display for ProxyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
