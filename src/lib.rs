//! Resilient API gateway for the invoicing services.
//!
//! Per-service circuit breakers, a generic reverse-proxy forwarder and a
//! fan-out aggregation layer in front of the customer, invoice and audit
//! backends.

pub mod admin;
pub mod aggregation;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod registry;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
