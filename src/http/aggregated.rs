//! Aggregated endpoints under `/api/v1/aggregated`.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{request::Parts, Request},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::http::request::request_context;
use crate::http::response::SuccessEnvelope;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::CallerIdentity;

const DEFAULT_DATE_RANGE_DAYS: u32 = 30;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/aggregated/dashboard", get(dashboard))
        .route("/api/v1/aggregated/customer/{id}/full_profile", get(customer_profile))
        .route("/api/v1/aggregated/invoice/{id}/complete_details", get(invoice_details))
        .route("/api/v1/aggregated/reports/business_summary", get(business_summary))
}

fn respond(parts: &Parts, start: Instant, result: Result<(Value, &'static str), GatewayError>) -> Response {
    let request_id = request_context(parts).request_id;
    match result {
        Ok((data, message)) => {
            metrics::record_request("aggregated", "GET", 200, start);
            SuccessEnvelope::new(data, message, request_id).into_response()
        }
        Err(e) => {
            e.log("aggregated", &request_id);
            metrics::record_request("aggregated", "GET", e.status().as_u16(), start);
            e.into_response_with(&request_id)
        }
    }
}

async fn dashboard(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, _) = request.into_parts();
    let context = request_context(&parts);
    let data = state
        .dashboard
        .overview(&context, parts.extensions.get::<CallerIdentity>())
        .await;
    respond(&parts, start, Ok((data, "Dashboard overview retrieved successfully")))
}

async fn customer_profile(State(state): State<AppState>, Path(id): Path<String>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, _) = request.into_parts();
    let context = request_context(&parts);
    let result = state
        .dashboard
        .customer_profile(&id, &context, parts.extensions.get::<CallerIdentity>())
        .await
        .map(|data| (data, "Customer profile retrieved successfully"));
    respond(&parts, start, result)
}

async fn invoice_details(State(state): State<AppState>, Path(id): Path<String>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, _) = request.into_parts();
    let context = request_context(&parts);
    let result = state
        .dashboard
        .invoice_details(&id, &context, parts.extensions.get::<CallerIdentity>())
        .await
        .map(|data| (data, "Invoice details retrieved successfully"));
    respond(&parts, start, result)
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    date_range: Option<String>,
}

fn parse_date_range(raw: Option<&str>) -> Result<u32, GatewayError> {
    match raw {
        None => Ok(DEFAULT_DATE_RANGE_DAYS),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(days) if days > 0 => Ok(days),
            _ => Err(GatewayError::BadRequest(
                "date_range must be a positive number of days".to_string(),
            )),
        },
    }
}

async fn business_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, _) = request.into_parts();
    let context = request_context(&parts);
    let result = match parse_date_range(params.date_range.as_deref()) {
        Ok(days) => Ok((
            state
                .dashboard
                .business_summary(days, &context, parts.extensions.get::<CallerIdentity>())
                .await,
            "Business summary retrieved successfully",
        )),
        Err(e) => Err(e),
    };
    respond(&parts, start, result)
}
