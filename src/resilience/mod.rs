//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call to a service:
//!     → circuit_breaker.rs (admit, or reject fast while the circuit is open)
//!     → timeouts.rs (per-call deadline, capped by the request deadline)
//!     → On timeout/connection failure: retries.rs (idempotent reads only, with backoff)
//!     → circuit_breaker.rs (record the classified outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound call has a deadline
//! - Retries only for GET, and never for an open circuit
//! - One breaker per service so a failing dependency cannot open another's circuit

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{
    BreakerConfig, BreakerError, BreakerSnapshot, CallOutcome, CircuitBreaker, CircuitState,
};
pub use timeouts::Deadline;
