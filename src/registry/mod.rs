//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig.services
//!     → descriptor.rs (validate each entry into a ServiceDescriptor)
//!     → ServiceRegistry (name → descriptor, read-only)
//!     → breakers.rs (one CircuitBreaker per descriptor)
//!     → both injected into the resilient client via Arc
//! ```
//!
//! # Design Decisions
//! - Built once at startup, never mutated afterwards (no locks on lookup)
//! - No ambient globals: whoever needs a breaker gets the registry passed in
//! - Iteration follows configuration order for stable status output

pub mod breakers;
pub mod descriptor;

use std::collections::HashMap;

use crate::config::validation::ValidationError;
use crate::config::ServiceConfig;
use crate::error::GatewayError;

pub use breakers::BreakerRegistry;
pub use descriptor::{DescriptorSummary, ServiceDescriptor};

/// Read-only mapping from service name to descriptor.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceDescriptor>,
    order: Vec<String>,
}

impl ServiceRegistry {
    /// Build the registry, collecting every invalid entry.
    pub fn from_configs(configs: &[ServiceConfig]) -> Result<Self, Vec<ValidationError>> {
        let mut registry = Self::default();
        let mut errors = Vec::new();

        for config in configs {
            match ServiceDescriptor::try_from(config) {
                Ok(descriptor) => {
                    if registry.services.contains_key(&descriptor.name) {
                        errors.push(ValidationError::DuplicateService(descriptor.name.clone()));
                        continue;
                    }
                    registry.order.push(descriptor.name.clone());
                    registry.services.insert(descriptor.name.clone(), descriptor);
                }
                Err(mut e) => errors.append(&mut e),
            }
        }

        if errors.is_empty() {
            tracing::info!(services = ?registry.order, "Service registry initialized");
            Ok(registry)
        } else {
            Err(errors)
        }
    }

    /// Look up a descriptor by name.
    pub fn resolve(&self, name: &str) -> Result<&ServiceDescriptor, GatewayError> {
        self.services
            .get(name)
            .ok_or_else(|| GatewayError::UnknownService(name.to_string()))
    }

    /// Descriptors in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.order.iter().filter_map(|name| self.services.get(name))
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
