//! Caller identity capability.
//!
//! Token issuance and format are owned elsewhere; the gateway only asks an
//! [`IdentityVerifier`] whether a bearer token maps to a caller.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::error::GatewayError;
use crate::http::RequestIdExt;

/// Authenticated caller, attached to request extensions by
/// [`identity_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

/// Capability check for bearer tokens.
pub trait IdentityVerifier: Send + Sync + 'static {
    /// `None` when the token is invalid or expired.
    fn verify(&self, token: &str) -> Option<CallerIdentity>;
}

/// Fixed token table. Useful for tests and local development.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, CallerIdentity>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: CallerIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<CallerIdentity> {
        self.tokens.get(token).cloned()
    }
}

/// Extract the bearer token from `Authorization`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GatewayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::Unauthorized("Authorization token required"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(GatewayError::Unauthorized("Authorization token required")),
    }
}

/// Require a verified caller; on success the [`CallerIdentity`] is inserted
/// into the request extensions.
pub async fn identity_middleware(
    State(verifier): State<Arc<dyn IdentityVerifier>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let request_id = req.request_id();

    let identity = match bearer_token(req.headers()) {
        Ok(token) => verifier
            .verify(token)
            .ok_or(GatewayError::Unauthorized("Invalid or expired token")),
        Err(e) => Err(e),
    };

    match identity {
        Ok(identity) => {
            tracing::debug!(request_id = %request_id, user_id = %identity.user_id, "Caller authenticated");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => {
            e.log("gateway", &request_id);
            e.into_response_with(&request_id)
        }
    }
}
