//! Per-service circuit breakers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::registry::ServiceRegistry;
use crate::resilience::{BreakerSnapshot, CircuitBreaker};

/// Explicitly constructed map of service name → breaker.
///
/// Each breaker is shared by every concurrent request to its service; no two
/// services share a breaker.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// One closed breaker per registered service.
    pub fn from_registry(registry: &ServiceRegistry) -> Self {
        let breakers = registry
            .iter()
            .map(|d| {
                (
                    d.name.clone(),
                    Arc::new(CircuitBreaker::new(d.name.clone(), d.breaker)),
                )
            })
            .collect();
        Self { breakers }
    }

    pub fn get(&self, service: &str) -> Result<Arc<CircuitBreaker>, GatewayError> {
        self.breakers
            .get(service)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownService(service.to_string()))
    }

    pub fn snapshot(&self, service: &str) -> Option<BreakerSnapshot> {
        self.breakers.get(service).map(|b| b.snapshot())
    }
}
