//! Retry policy.
//!
//! # Design Decisions
//! - Only GET is retried; writes are never replayed against a backend
//! - Only transport-level failures (timeout, connection) are retryable
//! - An open circuit is never retried by the gateway itself
//! - Every attempt goes through the breaker, so retries count as failures too

use crate::error::GatewayError;
use crate::proxy::ProxyMethod;

/// Whether a failed attempt may be repeated.
pub fn is_retryable(method: ProxyMethod, error: &GatewayError) -> bool {
    if !method.is_safe() {
        return false;
    }
    matches!(
        error,
        GatewayError::Timeout { .. } | GatewayError::Connection { .. }
    )
}

/// Total attempts allowed for a method given the descriptor's retry count.
pub fn max_attempts(method: ProxyMethod, retries: u32) -> u32 {
    if method.is_safe() {
        retries.saturating_add(1)
    } else {
        1
    }
}
