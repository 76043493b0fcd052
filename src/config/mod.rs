//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → service registry and breakers built once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the registry never changes at request time
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    CircuitBreakerSettings, GatewayConfig, GatewayIdentityConfig, HealthCheckConfig,
    InvalidJsonPolicy, ListenerConfig, LogFormat, ObservabilityConfig, ProxySettings,
    RetryConfig, ServiceConfig, Services, TimeoutConfig,
};
