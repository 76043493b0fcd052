//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Identification attached to outbound calls and responses.
    pub gateway: GatewayIdentityConfig,

    /// Inbound request timeouts.
    pub timeouts: TimeoutConfig,

    /// Forwarding behaviour.
    pub proxy: ProxySettings,

    /// Backoff between retry attempts.
    pub retries: RetryConfig,

    /// Backend service definitions.
    pub services: Services,

    /// Health probe settings.
    pub health_check: HealthCheckConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Values for the `X-Gateway` / `X-Gateway-Version` headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayIdentityConfig {
    pub name: String,
    pub version: String,
}

impl Default for GatewayIdentityConfig {
    fn default() -> Self {
        Self {
            name: "api-gateway".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request deadline in seconds, including any fan-out. Outbound
    /// attempts and retries are cut to fit inside it.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// What to do with a JSON-declared request body that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvalidJsonPolicy {
    /// Forward `{}` instead of the malformed payload.
    #[default]
    SubstituteEmpty,
    /// Reject the request with 400 before any outbound call.
    Reject,
}

/// Forwarding settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    pub invalid_json_policy: InvalidJsonPolicy,

    /// Largest inbound body accepted, in bytes.
    pub max_request_body_bytes: usize,

    /// Largest upstream body buffered, in bytes.
    pub max_response_body_bytes: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            invalid_json_policy: InvalidJsonPolicy::SubstituteEmpty,
            max_request_body_bytes: 2 * 1024 * 1024,
            max_response_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Retry backoff configuration. Retry counts live on each service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Ordered list of services; defaults to the three invoicing backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Services(pub Vec<ServiceConfig>);

impl Default for Services {
    fn default() -> Self {
        Self(vec![
            ServiceConfig {
                timeout_ms: 10_000,
                retries: 3,
                ..ServiceConfig::new("customer", "http://customer-service:3001", "/api/v1/customers")
            },
            ServiceConfig {
                timeout_ms: 15_000,
                retries: 3,
                ..ServiceConfig::new("invoice", "http://invoice-service:3002", "/api/v1/invoices")
            },
            ServiceConfig {
                timeout_ms: 20_000,
                retries: 2,
                circuit_breaker: CircuitBreakerSettings {
                    failure_threshold: 10,
                    recovery_timeout_ms: 60_000,
                    ..CircuitBreakerSettings::default()
                },
                ..ServiceConfig::new("audit", "http://audit-service:3003", "/api/v1/audit")
            },
        ])
    }
}

impl std::ops::Deref for Services {
    type Target = Vec<ServiceConfig>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Services {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// One backend service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique logical name (e.g. "invoice").
    pub name: String,

    /// Base URL, e.g. "http://invoice-service:3002".
    pub base_url: String,

    /// Inbound path prefix proxied to this service.
    pub mount: String,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Connection establishment timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Extra attempts for idempotent reads.
    #[serde(default)]
    pub retries: u32,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
}

impl ServiceConfig {
    /// A service with default timeouts and breaker thresholds.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, mount: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            mount: mount.into(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retries: 0,
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }

    /// Environment variable overriding `base_url`, e.g. `INVOICE_SERVICE_URL`.
    pub fn url_env_var(&self) -> String {
        format!("{}_SERVICE_URL", self.name.to_uppercase().replace('-', "_"))
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Breaker thresholds for a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Failures since the last success that open the circuit.
    pub failure_threshold: u32,

    /// Cool-down after the last failure before a probe is allowed, in milliseconds.
    pub recovery_timeout_ms: u64,

    /// Count 502/503/504 replies as failures, not just transport errors.
    pub trip_on_server_error: bool,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            trip_on_server_error: false,
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Run the periodic background monitor.
    pub monitor_enabled: bool,

    /// Monitor interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Probe connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Path probed on each service.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            monitor_enabled: false,
            interval_secs: 30,
            timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
            path: "/health".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
