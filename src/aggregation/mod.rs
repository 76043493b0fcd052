//! Aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! Aggregated endpoint
//!     → dashboard.rs (declares dependencies: name, future, fallback)
//!     → aggregate() (concurrent or sequential)
//!         → try_or_fallback() per dependency
//!             → ResilientClient (same breakers as the proxy)
//!     → AggregatedResult (name → success | degraded)
//!     → timeline.rs (chronological merge for invoice details)
//! ```
//!
//! # Design Decisions
//! - One generic "try dependency, substitute fallback" combinator; endpoints
//!   only declare what they need and what to show when it is missing
//! - Results are keyed by dependency name, never by completion order
//! - A degraded dependency is not an error; only `require_any` turns an
//!   all-degraded result into one
//! - A backend that answered with a non-success status may get its own
//!   fallback, so operators can tell "refused" from "unreachable"

pub mod dashboard;
pub mod timeline;

use std::collections::BTreeMap;
use std::future::Future;

use futures_util::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::observability::metrics;

pub use dashboard::DashboardService;
pub use timeline::{build_invoice_timeline, TimelineEvent};

/// One named call with the value to use if it fails.
pub struct Dependency<'a> {
    name: String,
    future: BoxFuture<'a, Result<Value, GatewayError>>,
    fallback: Value,
    rejected: Option<Value>,
}

impl<'a> Dependency<'a> {
    pub fn new<F>(name: impl Into<String>, future: F, fallback: Value) -> Self
    where
        F: Future<Output = Result<Value, GatewayError>> + Send + 'a,
    {
        Self {
            name: name.into(),
            future: future.boxed(),
            fallback,
            rejected: None,
        }
    }

    /// Fallback used instead when the backend replied with a non-success status.
    pub fn on_rejection(mut self, fallback: Value) -> Self {
        self.rejected = Some(fallback);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn settle(self) -> (String, Outcome) {
        let Dependency {
            name,
            future,
            fallback,
            rejected,
        } = self;
        let outcome = try_or_fallback_with(&name, future, |e| match (e, rejected) {
            (GatewayError::UpstreamStatus { .. }, Some(rejected)) => rejected,
            _ => fallback,
        }).await;
        (name, outcome)
    }
}

/// How a dependency ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { payload: Value },
    Degraded { fallback: Value, reason: String },
}

impl Outcome {
    /// The payload, or the fallback when degraded.
    pub fn value(&self) -> &Value {
        match self {
            Outcome::Success { payload } => payload,
            Outcome::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Outcome::Success { payload } => payload,
            Outcome::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }
}

/// How dependencies are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// All dependencies in flight at once.
    Concurrent,
    /// One after another, in declaration order.
    Sequential,
}

/// Outcomes keyed by dependency name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregatedResult {
    entries: BTreeMap<String, Outcome>,
}

impl AggregatedResult {
    pub fn get(&self, name: &str) -> Option<&Outcome> {
        self.entries.get(name)
    }

    /// Payload or fallback for `name`.
    pub fn payload(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(Outcome::value)
    }

    /// Names of dependencies that fell back, in name order.
    pub fn degraded(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, outcome)| outcome.is_degraded())
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail when every dependency degraded.
    pub fn require_any(self) -> Result<Self, GatewayError> {
        if !self.entries.is_empty() && self.entries.values().all(Outcome::is_degraded) {
            return Err(GatewayError::Unavailable(
                "All dependent services are unavailable".to_string(),
            ));
        }
        Ok(self)
    }

    /// Remove `name` and return its value (`null` if it was never declared).
    pub fn take(&mut self, name: &str) -> Value {
        self.entries
            .remove(name)
            .map(Outcome::into_value)
            .unwrap_or(Value::Null)
    }

    /// Flatten to `{name: value}`.
    pub fn into_data(self) -> serde_json::Map<String, Value> {
        self.entries
            .into_iter()
            .map(|(name, outcome)| (name, outcome.into_value()))
            .collect()
    }
}

/// Await `future`; on error log it, count it and substitute `fallback`.
pub async fn try_or_fallback<F>(name: &str, future: F, fallback: Value) -> Outcome
where
    F: Future<Output = Result<Value, GatewayError>>,
{
    try_or_fallback_with(name, future, |_| fallback).await
}

/// Like [`try_or_fallback`], choosing the fallback from the error.
pub async fn try_or_fallback_with<F, S>(name: &str, future: F, select: S) -> Outcome
where
    F: Future<Output = Result<Value, GatewayError>>,
    S: FnOnce(&GatewayError) -> Value,
{
    match future.await {
        Ok(payload) => Outcome::Success { payload },
        Err(e) => {
            tracing::warn!(dependency = %name, error = %e, "Dependency failed, using fallback");
            metrics::record_aggregation_fallback(name);
            Outcome::Degraded {
                fallback: select(&e),
                reason: e.public_message(),
            }
        }
    }
}

/// Run every dependency and collect the outcomes by name.
pub async fn aggregate(dependencies: Vec<Dependency<'_>>, mode: ExecutionMode) -> AggregatedResult {
    let mut result = AggregatedResult::default();

    let outcomes: Vec<(String, Outcome)> = match mode {
        ExecutionMode::Concurrent => join_all(dependencies.into_iter().map(Dependency::settle)).await,
        ExecutionMode::Sequential => {
            let mut outcomes = Vec::with_capacity(dependencies.len());
            for dep in dependencies {
                outcomes.push(dep.settle().await);
            }
            outcomes
        }
    };

    for (name, outcome) in outcomes {
        if result.entries.insert(name.clone(), outcome).is_some() {
            tracing::warn!(dependency = %name, "Duplicate dependency name, keeping the last outcome");
        }
    }
    result
}
