//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! On demand (/health/detailed, dashboard):
//!     → probe.rs (concurrent GET {base_url}/health per service)
//!     → per-service ServiceHealth + breaker state
//!
//! Background (monitor.rs, optional):
//!     Periodic timer
//!     → probe.rs
//!     → log transitions, update gateway_service_health gauge
//! ```
//!
//! # Design Decisions
//! - Health is reported, not enforced: routing never consults it; the
//!   circuit breakers gate live traffic on their own

pub mod monitor;
pub mod probe;

pub use monitor::HealthMonitor;
pub use probe::{overall_status, timestamp_now, HealthProber, ServiceHealth};
