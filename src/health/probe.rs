//! Service health probes.
//!
//! # Responsibilities
//! - Probe `GET {base_url}{path}` of each service
//! - Report status, latency and breaker state per service
//!
//! # Design Decisions
//! - Probes bypass the breakers: an open circuit must not hide recovery,
//!   and probe failures must not count against live traffic
//! - All services are probed concurrently

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request};
use chrono::{SecondsFormat, Utc};
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Serialize;
use tokio::time::{self, Instant};

use crate::config::HealthCheckConfig;
use crate::registry::{BreakerRegistry, ServiceDescriptor, ServiceRegistry};
use crate::resilience::timeouts::attempt_budget;
use crate::resilience::{CircuitState, Deadline};

/// Result of probing one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub healthy: bool,
    /// "UP" or "DOWN".
    pub status: &'static str,
    pub response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub last_checked: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit: Option<CircuitState>,
}

/// "healthy" when every service is up, otherwise "degraded".
pub fn overall_status<'a>(results: impl IntoIterator<Item = &'a ServiceHealth>) -> &'static str {
    if results.into_iter().all(|h| h.healthy) {
        "healthy"
    } else {
        "degraded"
    }
}

/// RFC 3339 timestamp, second precision, UTC.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct HealthProber {
    registry: Arc<ServiceRegistry>,
    breakers: Arc<BreakerRegistry>,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    path: String,
}

impl HealthProber {
    pub fn new(registry: Arc<ServiceRegistry>, breakers: Arc<BreakerRegistry>, config: &HealthCheckConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            registry,
            breakers,
            client,
            timeout: Duration::from_millis(config.timeout_ms),
            path: config.path.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Probe one service, giving up at the probe timeout or `deadline`,
    /// whichever comes first.
    pub async fn probe(&self, descriptor: &ServiceDescriptor, deadline: Option<Deadline>) -> ServiceHealth {
        let start = Instant::now();
        let outcome = self.request(descriptor, attempt_budget(self.timeout, deadline)).await;
        let response_time_ms = (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

        let (healthy, error) = match outcome {
            Ok(()) => (true, None),
            Err(e) => {
                tracing::debug!(service = %descriptor.name, error = %e, "Health probe failed");
                (false, Some(e))
            }
        };

        ServiceHealth {
            healthy,
            status: if healthy { "UP" } else { "DOWN" },
            response_time_ms,
            error,
            last_checked: timestamp_now(),
            circuit: self.breakers.snapshot(&descriptor.name).map(|s| s.state),
        }
    }

    async fn request(&self, descriptor: &ServiceDescriptor, timeout: Duration) -> Result<(), String> {
        let request = Request::builder()
            .method("GET")
            .uri(descriptor.target_url(&self.path, None))
            .header("user-agent", "invoicing-gateway-health-check")
            .body(Body::empty())
            .map_err(|e| format!("invalid probe request: {}", e))?;

        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(format!("HTTP {}", response.status().as_u16())),
            Ok(Err(e)) => Err(format!("connection failed: {}", e)),
            Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
        }
    }

    /// Probe every registered service concurrently.
    pub async fn check_all(&self, deadline: Option<Deadline>) -> BTreeMap<String, ServiceHealth> {
        let probes = self
            .registry
            .iter()
            .map(|d| async move { (d.name.clone(), self.probe(d, deadline).await) });
        join_all(probes).await.into_iter().collect()
    }
}
