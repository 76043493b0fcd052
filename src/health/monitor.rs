//! Background health monitoring.
//!
//! # Responsibilities
//! - Periodically probe every service
//! - Log UP/DOWN transitions and record the health gauge

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::health::HealthProber;
use crate::observability::metrics;

pub struct HealthMonitor {
    prober: Arc<HealthProber>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(prober: Arc<HealthProber>, interval: Duration) -> Self {
        Self { prober, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Health monitor starting");

        let mut ticker = time::interval(self.interval);
        let mut last: HashMap<String, bool> = HashMap::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all(&mut last).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self, last: &mut HashMap<String, bool>) {
        for (service, health) in self.prober.check_all(None).await {
            metrics::record_service_health(&service, health.healthy);

            let previous = last.insert(service.clone(), health.healthy);
            match (previous, health.healthy) {
                (Some(true), false) | (None, false) => {
                    tracing::warn!(
                        service = %service,
                        error = health.error.as_deref().unwrap_or(""),
                        "Service is DOWN"
                    );
                }
                (Some(false), true) => tracing::info!(service = %service, "Service recovered"),
                _ => {}
            }
        }
    }
}
