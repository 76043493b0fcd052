//! Timeout enforcement.
//!
//! Wraps an outbound exchange in the descriptor's per-call deadline. Elapsed
//! deadlines become [`GatewayError::Timeout`], which the breaker classifies as
//! a failure like any other error.
//!
//! A [`Deadline`] is the whole-request budget. Outbound attempts and health
//! probes made on behalf of a request are capped by what is left of it, so the
//! per-call timeout always fires before the request as a whole runs out.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::GatewayError;

/// Point in time by which an inbound request must be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// `budget`, shortened to what is left before the deadline.
    pub fn cap(&self, budget: Duration) -> Duration {
        budget.min(self.remaining())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Per-call budget, capped by the request deadline when there is one.
pub fn attempt_budget(timeout: Duration, deadline: Option<Deadline>) -> Duration {
    deadline.map_or(timeout, |d| d.cap(timeout))
}

/// Run `fut` with a deadline.
pub async fn with_deadline<T, F>(service: &str, deadline: Duration, fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            service: service.to_string(),
            after: deadline,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_is_timeout() {
        let result: Result<(), _> = with_deadline("invoice", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(GatewayError::Timeout { ref service, .. }) if service == "invoice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_caps_attempt_budget() {
        let deadline = Deadline::after(Duration::from_secs(1));
        assert_eq!(attempt_budget(Duration::from_millis(700), Some(deadline)), Duration::from_millis(700));

        tokio::time::advance(Duration::from_millis(800)).await;
        assert_eq!(attempt_budget(Duration::from_millis(700), Some(deadline)), Duration::from_millis(200));
        assert_eq!(attempt_budget(Duration::from_millis(700), None), Duration::from_millis(700));

        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(deadline.is_expired());
        assert!(attempt_budget(Duration::from_millis(700), Some(deadline)).is_zero());
    }

    #[tokio::test]
    async fn test_fast_result_passes_through() {
        let result = with_deadline("invoice", Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
