//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, ServiceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("timeouts.request_secs must be positive")]
    RequestDeadline,

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("duplicate mount '{mount}' (service '{service}')")]
    DuplicateMount { service: String, mount: String },

    #[error("service '{service}': {reason}")]
    Service { service: String, reason: String },
}

impl ValidationError {
    fn service(service: &ServiceConfig, reason: impl Into<String>) -> Self {
        ValidationError::Service {
            service: service.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Validate a whole configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::RequestDeadline);
    }

    let mut names = HashSet::new();
    let mut mounts = HashSet::new();
    for service in config.services.iter() {
        if !names.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if !mounts.insert(service.mount.trim_end_matches('/')) {
            errors.push(ValidationError::DuplicateMount {
                service: service.name.clone(),
                mount: service.mount.clone(),
            });
        }
        errors.extend(validate_service(service));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one service entry.
pub fn validate_service(service: &ServiceConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if service.name.trim().is_empty() {
        errors.push(ValidationError::service(service, "name must not be empty"));
    }

    match Url::parse(&service.base_url) {
        Ok(url) if url.scheme() != "http" => {
            errors.push(ValidationError::service(service, "base_url must use http"));
        }
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::service(service, "base_url has no host"));
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::service(service, format!("invalid base_url: {}", e))),
    }

    if !service.mount.starts_with('/') || service.mount.trim_end_matches('/').is_empty() {
        errors.push(ValidationError::service(service, "mount must be a non-root path starting with '/'"));
    }
    if service.timeout_ms == 0 {
        errors.push(ValidationError::service(service, "timeout_ms must be positive"));
    }
    if service.connect_timeout_ms == 0 {
        errors.push(ValidationError::service(service, "connect_timeout_ms must be positive"));
    }
    if service.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::service(service, "failure_threshold must be at least 1"));
    }

    errors
}
