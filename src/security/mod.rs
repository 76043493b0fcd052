//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming /api/* request:
//!     → identity.rs (bearer token → CallerIdentity, when a verifier is installed)
//!     → headers.rs (rebuild outbound headers, add X-Forwarded-* and X-User-*)
//!     → Pass to forwarder / aggregation
//! ```
//!
//! # Design Decisions
//! - Fail closed: a missing or rejected token never reaches a backend
//! - No trust in client input: identity and forwarding headers are rebuilt

pub mod headers;
pub mod identity;

pub use identity::{identity_middleware, CallerIdentity, IdentityVerifier, StaticTokenVerifier};
