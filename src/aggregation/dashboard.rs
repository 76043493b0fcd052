//! Aggregated dashboard views.
//!
//! Each view declares its dependencies and their fallbacks and hands them to
//! [`aggregate`]. Entities the view cannot exist without (the customer of a
//! profile, the invoice of a details page) are fetched first and fail the
//! request instead of degrading.
//!
//! Fallbacks say "Service unavailable" when a backend could not be reached and
//! "Unable to fetch ..." when it answered with a non-success status.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};

use crate::aggregation::{aggregate, build_invoice_timeline, try_or_fallback, Dependency, ExecutionMode};
use crate::config::GatewayIdentityConfig;
use crate::error::GatewayError;
use crate::health::{timestamp_now, HealthProber};
use crate::proxy::{OutboundRequest, RequestContext, ResilientClient};
use crate::resilience::Deadline;
use crate::security::headers::build_service_headers;
use crate::security::CallerIdentity;

const CUSTOMER: &str = "customer";
const INVOICE: &str = "invoice";
const AUDIT: &str = "audit";

fn unavailable_summary() -> Value {
    json!({"error": "Service unavailable", "total_count": 0})
}

fn unavailable() -> Value {
    json!({"error": "Service unavailable"})
}

fn unable(what: &str) -> Value {
    json!({"error": format!("Unable to fetch {}", what)})
}

fn unable_summary(what: &str) -> Value {
    json!({"error": format!("Unable to fetch {}", what), "total_count": 0})
}

/// Headers and request budget shared by every call a view makes.
#[derive(Clone)]
struct ViewCall {
    headers: HeaderMap,
    deadline: Option<Deadline>,
}

/// Builds the composite views served under `/api/v1/aggregated`.
pub struct DashboardService {
    client: ResilientClient,
    prober: Arc<HealthProber>,
    gateway: GatewayIdentityConfig,
}

impl DashboardService {
    pub fn new(client: ResilientClient, prober: Arc<HealthProber>, gateway: GatewayIdentityConfig) -> Self {
        Self {
            client,
            prober,
            gateway,
        }
    }

    fn call(&self, context: &RequestContext, identity: Option<&CallerIdentity>) -> ViewCall {
        ViewCall {
            headers: build_service_headers(context, identity, &self.gateway),
            deadline: context.deadline,
        }
    }

    /// GET a JSON document from `service`. Non-2xx replies are errors.
    async fn fetch_json(
        &self,
        service: &str,
        path: impl Into<String>,
        query: Option<String>,
        call: ViewCall,
    ) -> Result<Value, GatewayError> {
        let request = OutboundRequest {
            query,
            ..OutboundRequest::get(path, call.headers)
        };
        let reply = self
            .client
            .send(service, request.with_deadline(call.deadline))
            .await?;

        if !reply.status.is_success() {
            return Err(GatewayError::UpstreamStatus {
                service: service.to_string(),
                status: reply.status,
            });
        }
        if reply.body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&reply.body).map_err(|e| GatewayError::Upstream {
            service: service.to_string(),
            reason: format!("invalid JSON payload: {}", e),
        })
    }

    /// Summary counts from every service plus live health.
    pub async fn overview(&self, context: &RequestContext, identity: Option<&CallerIdentity>) -> Value {
        let call = self.call(context, identity);
        let dependencies = vec![
            Dependency::new(
                "customers",
                self.fetch_json(CUSTOMER, "/api/customers/summary", None, call.clone()),
                unavailable_summary(),
            )
            .on_rejection(unable_summary("customer summary")),
            Dependency::new(
                "invoices",
                self.fetch_json(INVOICE, "/api/invoices/summary", None, call.clone()),
                unavailable_summary(),
            )
            .on_rejection(unable_summary("invoice summary")),
            Dependency::new(
                "recent_activity",
                self.fetch_json(AUDIT, "/api/audit_logs/recent", Some("limit=10".to_string()), call),
                json!({"activities": [], "error": "Service unavailable"}),
            )
            .on_rejection(json!({"activities": [], "error": "Unable to fetch recent activity"})),
        ];

        let (result, health) = tokio::join!(
            aggregate(dependencies, ExecutionMode::Concurrent),
            self.prober.check_all(context.deadline)
        );

        let mut data = result.into_data();
        data.insert("system_health".to_string(), serde_json::to_value(health).unwrap_or_default());
        data.insert("timestamp".to_string(), Value::String(timestamp_now()));
        Value::Object(data)
    }

    /// A customer with their invoices and invoice totals.
    pub async fn customer_profile(
        &self,
        customer_id: &str,
        context: &RequestContext,
        identity: Option<&CallerIdentity>,
    ) -> Result<Value, GatewayError> {
        validate_id("Customer", customer_id)?;
        let call = self.call(context, identity);

        let customer = self
            .fetch_json(CUSTOMER, format!("/api/customers/{}", customer_id), None, call.clone())
            .await
            .map_err(|e| required("Customer", e))?;

        let invoice_data = try_or_fallback(
            "customer_invoices",
            self.fetch_json(
                INVOICE,
                "/api/invoices",
                Some(format!("customer_id={}", customer_id)),
                call,
            ),
            json!({"invoices": [], "total_count": 0}),
        )
        .await
        .into_value();

        let field = |key: &str| {
            invoice_data
                .get(key)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| json!(0))
        };
        let invoice_summary = json!({
            "total_count": field("total_count"),
            "total_amount": field("total_amount"),
            "pending_count": field("pending_count"),
            "paid_count": field("paid_count"),
        });
        let invoices = invoice_data
            .get("invoices")
            .filter(|v| v.is_array())
            .cloned()
            .unwrap_or_else(|| json!([]));

        Ok(json!({
            "customer": customer,
            "invoices": invoices,
            "invoice_summary": invoice_summary,
        }))
    }

    /// An invoice with its customer, audit trail and merged timeline.
    pub async fn invoice_details(
        &self,
        invoice_id: &str,
        context: &RequestContext,
        identity: Option<&CallerIdentity>,
    ) -> Result<Value, GatewayError> {
        validate_id("Invoice", invoice_id)?;
        let call = self.call(context, identity);

        let invoice = self
            .fetch_json(INVOICE, format!("/api/invoices/{}", invoice_id), None, call.clone())
            .await
            .map_err(|e| required("Invoice", e))?;

        let customer_id = invoice.get("customer_id").and_then(id_string);
        let customer_call = call.clone();
        let customer = async move {
            match customer_id {
                Some(id) => {
                    self.fetch_json(CUSTOMER, format!("/api/customers/{}", id), None, customer_call)
                        .await
                }
                None => Ok(Value::Null),
            }
        };
        let audit_logs = async move {
            let body = self
                .fetch_json(
                    AUDIT,
                    "/api/audit_logs",
                    Some(format!("resource_type=Invoice&resource_id={}", invoice_id)),
                    call,
                )
                .await?;
            Ok::<_, GatewayError>(
                body.get("audit_logs")
                    .filter(|v| v.is_array())
                    .cloned()
                    .unwrap_or_else(|| json!([])),
            )
        };

        let mut result = aggregate(
            vec![
                Dependency::new("customer", customer, Value::Null),
                Dependency::new("audit_logs", audit_logs, json!([])),
            ],
            ExecutionMode::Concurrent,
        )
        .await;

        let customer = result.take("customer");
        let audit_logs = result.take("audit_logs");
        let timeline = build_invoice_timeline(
            &invoice,
            audit_logs.as_array().map(Vec::as_slice).unwrap_or(&[]),
            Utc::now(),
        );

        Ok(json!({
            "invoice": invoice,
            "customer": customer,
            "audit_logs": audit_logs,
            "timeline": timeline,
        }))
    }

    /// Per-service analytics over the last `days` days.
    pub async fn business_summary(
        &self,
        days: u32,
        context: &RequestContext,
        identity: Option<&CallerIdentity>,
    ) -> Value {
        let call = self.call(context, identity);
        let query = format!("days={}", days);
        let dependencies = vec![
            Dependency::new(
                "customers",
                self.fetch_json(CUSTOMER, "/api/customers/analytics", Some(query.clone()), call.clone()),
                unavailable(),
            )
            .on_rejection(unable("customer analytics")),
            Dependency::new(
                "invoices",
                self.fetch_json(INVOICE, "/api/invoices/analytics", Some(query.clone()), call.clone()),
                unavailable(),
            )
            .on_rejection(unable("invoice analytics")),
            Dependency::new(
                "activity",
                self.fetch_json(AUDIT, "/api/audit_logs/analytics", Some(query), call),
                unavailable(),
            )
            .on_rejection(unable("activity analytics")),
        ];

        let mut data = aggregate(dependencies, ExecutionMode::Concurrent).await.into_data();
        data.insert("date_range".to_string(), Value::String(format!("{} days", days)));
        data.insert("generated_at".to_string(), Value::String(timestamp_now()));
        Value::Object(data)
    }
}

/// Ids are interpolated into backend paths and queries.
fn validate_id(entity: &str, id: &str) -> Result<(), GatewayError> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GatewayError::BadRequest(format!("{} ID is invalid", entity)))
    }
}

/// A backend id as a path segment, if it is a string or integer that is safe to use.
fn id_string(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_u64() || n.is_i64() => n.to_string(),
        _ => return None,
    };
    validate_id("Customer", &id).ok().map(|_| id)
}

/// Map a failed required dependency to the caller-facing error.
fn required(entity: &str, error: GatewayError) -> GatewayError {
    match error {
        GatewayError::UpstreamStatus { status, .. } if status == StatusCode::NOT_FOUND => {
            GatewayError::NotFound(format!("{} not found", entity))
        }
        other => {
            tracing::warn!(entity = %entity, error = %other, "Required dependency unavailable");
            GatewayError::Unavailable(format!("Unable to fetch {} data", entity.to_lowercase()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("Customer", "42").is_ok());
        assert!(validate_id("Customer", "c_9-a").is_ok());
        assert!(validate_id("Customer", "").is_err());
        assert!(validate_id("Customer", "1?admin=true").is_err());
        assert!(validate_id("Customer", "../secrets").is_err());
    }

    #[test]
    fn test_id_string() {
        assert_eq!(id_string(&json!(17)), Some("17".to_string()));
        assert_eq!(id_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_string(&json!(1.5)), None);
        assert_eq!(id_string(&json!("a/b")), None);
        assert_eq!(id_string(&Value::Null), None);
    }

    #[test]
    fn test_required_mapping() {
        let not_found = GatewayError::UpstreamStatus {
            service: "customer".into(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(matches!(required("Customer", not_found), GatewayError::NotFound(ref m) if m == "Customer not found"));

        let open = GatewayError::CircuitOpen { service: "customer".into() };
        let mapped = required("Customer", open);
        assert_eq!(mapped.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
