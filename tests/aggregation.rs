//! Aggregated endpoints against live mock backends.

mod common;

use std::time::Duration;

use serde_json::{json, Value};

use common::{gateway_config, http_client, service, start_gateway, unreachable_addr, MockBackend, MockReply};
use invoicing_gateway::{HttpServer, Shutdown};

struct Backends {
    customer: MockBackend,
    invoice: MockBackend,
    audit: MockBackend,
}

async fn backends(audit_delay: Duration) -> Backends {
    let customer = MockBackend::start(|req| match req.path() {
        "/health" => MockReply::json(200, json!({"status": "ok"})),
        "/api/customers/summary" => MockReply::json(200, json!({"total_count": 12})),
        "/api/customers/7" => MockReply::json(200, json!({"id": 7, "name": "Acme"})),
        "/api/customers/analytics" => MockReply::json(200, json!({"new_customers": 3})),
        _ => MockReply::json(404, json!({"error": "not found"})),
    })
    .await;

    let invoice = MockBackend::start(|req| match req.path() {
        "/health" => MockReply::json(200, json!({"status": "ok"})),
        "/api/invoices/summary" => MockReply::json(200, json!({"total_count": 40})),
        "/api/invoices/55" => MockReply::json(
            200,
            json!({"id": 55, "customer_id": 7, "created_at": "2024-03-01T10:00:00+02:00"}),
        ),
        "/api/invoices" => MockReply::json(
            200,
            json!({"invoices": [{"id": 55}], "total_count": 1, "total_amount": 120.5, "paid_count": 1}),
        ),
        "/api/invoices/analytics" => MockReply::json(200, json!({"revenue": 999})),
        _ => MockReply::json(404, json!({"error": "not found"})),
    })
    .await;

    let audit = MockBackend::start(move |req| match req.path() {
        "/health" => MockReply::json(200, json!({"status": "ok"})),
        "/api/audit_logs/recent" => {
            MockReply::json(200, json!({"activities": [{"id": 1}]})).delayed(audit_delay)
        }
        "/api/audit_logs" => MockReply::json(
            200,
            json!({"audit_logs": [
                {"action": "paid", "created_at": "2024-03-03T09:00:00Z", "user_email": "bob@example.com"},
                {"action": "drafted", "created_at": "2024-03-01T07:30:00Z"},
                {"action": "sent", "created_at": "2024-03-02T12:00:00Z", "description": "Sent to client"},
            ]}),
        ),
        "/api/audit_logs/analytics" => MockReply::json(200, json!({"events": 17})),
        _ => MockReply::json(404, json!({"error": "not found"})),
    })
    .await;

    Backends { customer, invoice, audit }
}

async fn gateway(backends: &Backends, audit_timeout_ms: u64) -> (String, Shutdown) {
    let mut audit = service("audit", &backends.audit.url(), "/api/v1/audit");
    audit.timeout_ms = audit_timeout_ms;
    let config = gateway_config(vec![
        service("customer", &backends.customer.url(), "/api/v1/customers"),
        service("invoice", &backends.invoice.url(), "/api/v1/invoices"),
        audit,
    ]);
    let (addr, shutdown) = start_gateway(HttpServer::new(config).unwrap()).await;
    (format!("http://{}", addr), shutdown)
}

async fn get_json(url: String) -> (u16, Value) {
    let resp = http_client().get(url).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_dashboard_degrades_slow_dependency() {
    let backends = backends(Duration::from_secs(2)).await;
    let (base, shutdown) = gateway(&backends, 300).await;

    let (status, body) = get_json(format!("{}/api/v1/aggregated/dashboard", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Dashboard overview retrieved successfully");
    let data = &body["data"];
    assert_eq!(data["customers"], json!({"total_count": 12}));
    assert_eq!(data["invoices"], json!({"total_count": 40}));
    assert_eq!(
        data["recent_activity"],
        json!({"activities": [], "error": "Service unavailable"})
    );
    assert_eq!(data["system_health"]["customer"]["status"], "UP");
    assert!(data["timestamp"].as_str().is_some());

    let audit_calls = backends.audit.requests();
    assert_eq!(audit_calls[0].target, "/api/audit_logs/recent?limit=10");

    shutdown.trigger();
}

#[tokio::test]
async fn test_dashboard_fully_healthy() {
    let backends = backends(Duration::ZERO).await;
    let (base, shutdown) = gateway(&backends, 2_000).await;

    let (status, body) = get_json(format!("{}/api/v1/aggregated/dashboard", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["recent_activity"], json!({"activities": [{"id": 1}]}));
    assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));

    shutdown.trigger();
}

#[tokio::test]
async fn test_invoice_details_timeline_is_chronological() {
    let backends = backends(Duration::ZERO).await;
    let (base, shutdown) = gateway(&backends, 2_000).await;

    let (status, body) = get_json(format!("{}/api/v1/aggregated/invoice/55/complete_details", base)).await;

    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["invoice"]["id"], 55);
    assert_eq!(data["customer"]["name"], "Acme");
    assert_eq!(data["audit_logs"].as_array().unwrap().len(), 3);

    let events: Vec<&str> = data["timeline"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    // created is 08:00Z, after the 07:30Z draft
    assert_eq!(events, ["drafted", "created", "sent", "paid"]);
    assert_eq!(data["timeline"][2]["description"], "Sent to client");
    assert_eq!(data["timeline"][3]["user"], "bob@example.com");

    let audit_calls = backends.audit.requests();
    assert_eq!(audit_calls[0].target, "/api/audit_logs?resource_type=Invoice&resource_id=55");

    shutdown.trigger();
}

#[tokio::test]
async fn test_customer_profile() {
    let backends = backends(Duration::ZERO).await;
    let (base, shutdown) = gateway(&backends, 2_000).await;

    let (status, body) = get_json(format!("{}/api/v1/aggregated/customer/7/full_profile", base)).await;

    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["customer"]["name"], "Acme");
    assert_eq!(data["invoices"], json!([{"id": 55}]));
    assert_eq!(
        data["invoice_summary"],
        json!({"total_count": 1, "total_amount": 120.5, "pending_count": 0, "paid_count": 1})
    );
    assert_eq!(backends.invoice.requests()[0].target, "/api/invoices?customer_id=7");

    let (status, body) = get_json(format!("{}/api/v1/aggregated/customer/404/full_profile", base)).await;
    assert_eq!(status, 404);
    assert_eq!(body["message"], "Customer not found");

    shutdown.trigger();
}

#[tokio::test]
async fn test_profile_invoices_fall_back_when_invoice_service_down() {
    let backends = backends(Duration::ZERO).await;
    let dead = unreachable_addr().await;
    let config = gateway_config(vec![
        service("customer", &backends.customer.url(), "/api/v1/customers"),
        service("invoice", &format!("http://{}", dead), "/api/v1/invoices"),
        service("audit", &backends.audit.url(), "/api/v1/audit"),
    ]);
    let (addr, shutdown) = start_gateway(HttpServer::new(config).unwrap()).await;

    let (status, body) =
        get_json(format!("http://{}/api/v1/aggregated/customer/7/full_profile", addr)).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["invoices"], json!([]));
    assert_eq!(body["data"]["invoice_summary"]["total_count"], 0);

    let (status, body) = get_json(format!("http://{}/health/detailed", addr)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["invoice"]["status"], "DOWN");
    assert_eq!(body["services"]["customer"]["status"], "UP");

    shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_ids_rejected_before_fanout() {
    let backends = backends(Duration::ZERO).await;
    let (base, shutdown) = gateway(&backends, 2_000).await;

    let (status, body) = get_json(format!("{}/api/v1/aggregated/invoice/a%3Fx%3D1/complete_details", base)).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "Bad request");
    assert!(backends.invoice.requests().is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_business_summary_date_range() {
    let backends = backends(Duration::ZERO).await;
    let (base, shutdown) = gateway(&backends, 2_000).await;

    let (status, body) =
        get_json(format!("{}/api/v1/aggregated/reports/business_summary?date_range=7", base)).await;

    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["date_range"], "7 days");
    assert_eq!(data["customers"], json!({"new_customers": 3}));
    assert_eq!(data["invoices"], json!({"revenue": 999}));
    assert_eq!(data["activity"], json!({"events": 17}));
    assert_eq!(backends.customer.requests()[0].target, "/api/customers/analytics?days=7");

    let (status, _) =
        get_json(format!("{}/api/v1/aggregated/reports/business_summary?date_range=0", base)).await;
    assert_eq!(status, 400);

    shutdown.trigger();
}

#[tokio::test]
async fn test_dashboard_degrades_within_request_deadline() {
    let backends = backends(Duration::ZERO).await;
    let hung_audit =
        MockBackend::start(|_| MockReply::json(200, json!({})).delayed(Duration::from_secs(10))).await;
    let mut audit = service("audit", &hung_audit.url(), "/api/v1/audit");
    audit.timeout_ms = 700;
    audit.retries = 1;
    let mut config = gateway_config(vec![
        service("customer", &backends.customer.url(), "/api/v1/customers"),
        service("invoice", &backends.invoice.url(), "/api/v1/invoices"),
        audit,
    ]);
    config.timeouts.request_secs = 1;
    let (addr, shutdown) = start_gateway(HttpServer::new(config).unwrap()).await;

    let (status, body) = get_json(format!("http://{}/api/v1/aggregated/dashboard", addr)).await;

    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["customers"], json!({"total_count": 12}));
    assert_eq!(
        data["recent_activity"],
        json!({"activities": [], "error": "Service unavailable"})
    );
    assert_eq!(data["system_health"]["audit"]["status"], "DOWN");

    shutdown.trigger();
}

#[tokio::test]
async fn test_refused_summary_has_its_own_marker() {
    let customer = MockBackend::start(|req| match req.path() {
        "/api/customers/summary" => MockReply::json(500, json!({"error": "db down"})),
        _ => MockReply::json(200, json!({})),
    })
    .await;
    let dead = unreachable_addr().await;
    let backends = backends(Duration::ZERO).await;
    let config = gateway_config(vec![
        service("customer", &customer.url(), "/api/v1/customers"),
        service("invoice", &format!("http://{}", dead), "/api/v1/invoices"),
        service("audit", &backends.audit.url(), "/api/v1/audit"),
    ]);
    let (addr, shutdown) = start_gateway(HttpServer::new(config).unwrap()).await;

    let (status, body) = get_json(format!("http://{}/api/v1/aggregated/dashboard", addr)).await;

    assert_eq!(status, 200);
    assert_eq!(
        body["data"]["customers"],
        json!({"error": "Unable to fetch customer summary", "total_count": 0})
    );
    assert_eq!(
        body["data"]["invoices"],
        json!({"error": "Service unavailable", "total_count": 0})
    );

    shutdown.trigger();
}
