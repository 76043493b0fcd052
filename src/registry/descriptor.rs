//! Service descriptors.
//!
//! A [`ServiceDescriptor`] is the validated, immutable form of a
//! [`ServiceConfig`]: everything the resilient client needs to reach one
//! backend service.

use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::config::validation::{validate_service, ValidationError};
use crate::config::ServiceConfig;
use crate::resilience::BreakerConfig;

/// Immutable description of one backend service.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub base_url: Url,
    pub mount: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retries: u32,
    pub breaker: BreakerConfig,
    /// Count 502/503/504 replies as breaker failures.
    pub trip_on_server_error: bool,
}

impl ServiceDescriptor {
    /// Outbound URL for a backend-relative path and optional query string.
    ///
    /// `base_url` and `path` are joined with exactly one `/`; an empty query is dropped.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Inbound mount without a trailing slash.
    pub fn mount_prefix(&self) -> &str {
        self.mount.trim_end_matches('/')
    }

    pub fn summary(&self) -> DescriptorSummary {
        DescriptorSummary {
            name: self.name.clone(),
            base_url: self.base_url.to_string(),
            mount: self.mount.clone(),
            timeout_ms: self.timeout.as_millis() as u64,
            connect_timeout_ms: self.connect_timeout.as_millis() as u64,
            retries: self.retries,
            failure_threshold: self.breaker.failure_threshold,
            recovery_timeout_ms: self.breaker.recovery_timeout.as_millis() as u64,
        }
    }
}

impl TryFrom<&ServiceConfig> for ServiceDescriptor {
    type Error = Vec<ValidationError>;

    fn try_from(config: &ServiceConfig) -> Result<Self, Self::Error> {
        let errors = validate_service(config);
        if !errors.is_empty() {
            return Err(errors);
        }
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            vec![ValidationError::Service {
                service: config.name.clone(),
                reason: format!("invalid base_url: {}", e),
            }]
        })?;

        Ok(Self {
            name: config.name.clone(),
            base_url,
            mount: config.mount.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            retries: config.retries,
            breaker: BreakerConfig {
                failure_threshold: config.circuit_breaker.failure_threshold,
                recovery_timeout: Duration::from_millis(config.circuit_breaker.recovery_timeout_ms),
            },
            trip_on_server_error: config.circuit_breaker.trip_on_server_error,
        })
    }
}

/// Serializable view for the `/gateway/services` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorSummary {
    pub name: String,
    pub base_url: String,
    pub mount: String,
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub retries: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
}
