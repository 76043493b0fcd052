//! Chronological event timeline for invoice details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One entry of an invoice timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub event: String,
    pub timestamp: Option<String>,
    pub description: String,
    pub user: String,
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Stable chronological sort. Events without a parsable timestamp sort as if
/// they happened at `now`; none are dropped.
pub fn sort_chronologically(events: &mut [TimelineEvent], now: DateTime<Utc>) {
    events.sort_by_key(|e| parse_timestamp(e.timestamp.as_deref()).unwrap_or(now));
}

/// Merge the invoice's creation with its audit log entries.
pub fn build_invoice_timeline(invoice: &Value, audit_logs: &[Value], now: DateTime<Utc>) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(audit_logs.len() + 1);

    if let Some(created_at) = invoice.get("created_at").and_then(Value::as_str) {
        events.push(TimelineEvent {
            event: "created".to_string(),
            timestamp: Some(created_at.to_string()),
            description: "Invoice created".to_string(),
            user: "System".to_string(),
        });
    }

    for log in audit_logs {
        let field = |key: &str| log.get(key).and_then(Value::as_str);
        let action = field("action").unwrap_or("updated");
        events.push(TimelineEvent {
            event: action.to_string(),
            timestamp: field("created_at").map(str::to_string),
            description: field("description")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Invoice {}", action)),
            user: field("user_email").unwrap_or("System").to_string(),
        });
    }

    sort_chronologically(&mut events, now);
    events
}
