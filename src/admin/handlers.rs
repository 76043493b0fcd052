use axum::{
    extract::{Request, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::health::{overall_status, timestamp_now, ServiceHealth};
use crate::http::server::AppState;
use crate::registry::DescriptorSummary;
use crate::resilience::{BreakerSnapshot, Deadline};

#[derive(Serialize)]
pub struct LivenessStatus {
    pub status: &'static str,
    pub service: String,
    pub timestamp: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct DetailedStatus {
    pub status: &'static str,
    pub service: String,
    pub timestamp: String,
    pub version: String,
    pub response_time_ms: f64,
    pub services: std::collections::BTreeMap<String, ServiceHealth>,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    #[serde(flatten)]
    pub descriptor: DescriptorSummary,
    pub circuit: Option<BreakerSnapshot>,
}

/// Liveness: the gateway process answers.
pub async fn health(State(state): State<AppState>) -> Json<LivenessStatus> {
    Json(LivenessStatus {
        status: "healthy",
        service: state.gateway.name.clone(),
        timestamp: timestamp_now(),
        version: state.gateway.version.clone(),
    })
}

/// Probe every backend and report per-service health.
pub async fn health_detailed(State(state): State<AppState>, request: Request) -> Json<DetailedStatus> {
    let start = Instant::now();
    let deadline = request.extensions().get::<Deadline>().copied();
    let services = state.prober.check_all(deadline).await;
    let response_time_ms = (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

    Json(DetailedStatus {
        status: overall_status(services.values()),
        service: state.gateway.name.clone(),
        timestamp: timestamp_now(),
        version: state.gateway.version.clone(),
        response_time_ms,
        services,
    })
}

pub async fn gateway_info(State(state): State<AppState>) -> Json<Value> {
    let services: Vec<Value> = state
        .registry
        .iter()
        .map(|d| json!({"name": d.name, "mount": d.mount_prefix()}))
        .collect();

    Json(json!({
        "name": state.gateway.name,
        "version": state.gateway.version,
        "services": services,
        "aggregated": "/api/v1/aggregated",
    }))
}

/// Every descriptor with its breaker snapshot.
pub async fn gateway_services(State(state): State<AppState>) -> Json<Vec<ServiceStatus>> {
    let statuses = state
        .registry
        .iter()
        .map(|d| ServiceStatus {
            descriptor: d.summary(),
            circuit: state.breakers.snapshot(&d.name),
        })
        .collect();
    Json(statuses)
}
