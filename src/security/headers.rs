//! Header propagation.
//!
//! # Responsibilities
//! - Build the outbound header set for a backend call
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Attach caller identity and gateway identification
//! - Select which upstream response headers reach the caller
//!
//! # Design Decisions
//! - Allow-list, not deny-list: only named headers are copied, so hop-by-hop
//!   and credential headers never leak to a backend
//! - Never trust inbound X-Forwarded-* or X-User-*; they are rebuilt here
//! - Pure functions: same input, byte-identical output

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::GatewayIdentityConfig;
use crate::http::X_REQUEST_ID;
use crate::proxy::RequestContext;
use crate::security::CallerIdentity;

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_EMAIL: HeaderName = HeaderName::from_static("x-user-email");
pub const X_USER_ROLES: HeaderName = HeaderName::from_static("x-user-roles");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_GATEWAY: HeaderName = HeaderName::from_static("x-gateway");
pub const X_GATEWAY_VERSION: HeaderName = HeaderName::from_static("x-gateway-version");

/// Connection-scoped headers that must never be forwarded.
pub const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Outbound headers for a proxied call.
///
/// Copies Content-Type and Accept from `inbound`; everything else is rebuilt
/// from `context`, `identity` and `gateway`.
pub fn build_outbound_headers(
    inbound: &HeaderMap,
    context: &RequestContext,
    identity: Option<&CallerIdentity>,
    gateway: &GatewayIdentityConfig,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [header::CONTENT_TYPE, header::ACCEPT] {
        if let Some(value) = inbound.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    attach_context(&mut headers, context, identity, gateway);
    headers
}

/// Outbound headers for a gateway-originated JSON call (aggregation, probes).
pub fn build_service_headers(
    context: &RequestContext,
    identity: Option<&CallerIdentity>,
    gateway: &GatewayIdentityConfig,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    attach_context(&mut headers, context, identity, gateway);
    headers
}

fn attach_context(
    headers: &mut HeaderMap,
    context: &RequestContext,
    identity: Option<&CallerIdentity>,
    gateway: &GatewayIdentityConfig,
) {
    if let Some(identity) = identity {
        insert(headers, X_USER_ID, &identity.user_id);
        if let Some(email) = &identity.email {
            insert(headers, X_USER_EMAIL, email);
        }
        if !identity.roles.is_empty() {
            insert(headers, X_USER_ROLES, &identity.roles.join(","));
        }
    }

    insert(headers, X_REQUEST_ID, &context.request_id);
    if let Some(peer) = context.peer {
        insert(headers, X_FORWARDED_FOR, &peer.to_string());
    }
    insert(headers, X_FORWARDED_PROTO, &context.scheme);
    if let Some(host) = &context.host {
        insert(headers, X_FORWARDED_HOST, host);
    }
    insert(headers, X_GATEWAY, &gateway.name);
    insert(headers, X_GATEWAY_VERSION, &gateway.version);
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::debug!(header = %name, "Dropping header with invalid value"),
    }
}

/// Upstream response headers the caller may see: Content-Type and Cache-Control.
pub fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [header::CONTENT_TYPE, header::CACHE_CONTROL] {
        if let Some(value) = upstream.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    headers
}
