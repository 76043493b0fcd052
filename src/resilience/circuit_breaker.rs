//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: a single probe is testing whether the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold (failures since the last success)
//! Open → Half-Open: first call after recovery_timeout since the last failure
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! # Design Decisions
//! - Per-service circuit breaker (not global)
//! - The mutex only covers admission and outcome recording; it is never held
//!   while the guarded operation is awaited
//! - Single probe in Half-Open; everything else is rejected until it resolves
//! - An admitted call whose future is dropped is recorded as a failure

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::observability::metrics;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

/// Thresholds for a single breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Failures since the last success that open the circuit.
    pub failure_threshold: u32,
    /// Cool-down measured from the last recorded failure.
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// How the caller classifies a finished call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Rejected without invoking the operation.
    #[error("circuit breaker is open")]
    Open,
    /// The operation ran and failed; the failure has been recorded.
    #[error("{0}")]
    Inner(E),
}

/// Point-in-time view of a breaker, for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub seconds_since_last_failure: Option<f64>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// A circuit breaker guarding one backend service.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: BreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            service: service.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.lock().last_failure
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            seconds_since_last_failure: inner
                .last_failure
                .map(|at| Instant::now().saturating_duration_since(at).as_secs_f64()),
        }
    }

    /// Run `op` through the breaker; any `Err` counts as a failure.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(op, |result| match result {
            Ok(_) => CallOutcome::Success,
            Err(_) => CallOutcome::Failure,
        })
        .await
    }

    /// Run `op` through the breaker, letting `classify` decide what counts as a failure.
    ///
    /// The result of `op` is returned unchanged either way; classification only
    /// affects the breaker's counters.
    pub async fn call_classified<F, Fut, T, E, C>(
        &self,
        op: F,
        classify: C,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&Result<T, E>) -> CallOutcome,
    {
        let permit = self.acquire().ok_or(BreakerError::Open)?;
        let result = op().await;
        permit.record(classify(&result));
        result.map_err(BreakerError::Inner)
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // A panic while holding the guard cannot leave the counters half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admission decision. Returns `None` when the call must be rejected.
    fn acquire(&self) -> Option<CallPermit<'_>> {
        let decision = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => Some(false),
                CircuitState::Open => {
                    let cooled_down = inner.last_failure.map_or(true, |at| {
                        Instant::now().saturating_duration_since(at) >= self.config.recovery_timeout
                    });
                    if cooled_down {
                        inner.state = CircuitState::HalfOpen;
                        Some(true)
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => None,
            }
        };

        match decision {
            Some(true) => {
                tracing::info!(service = %self.service, "Circuit breaker transitioning to HALF_OPEN");
                metrics::record_circuit_state(&self.service, CircuitState::HalfOpen);
            }
            Some(false) => {}
            None => {
                tracing::debug!(service = %self.service, "Circuit breaker rejected call");
                metrics::record_circuit_rejection(&self.service);
            }
        }

        decision.map(|probe| CallPermit {
            breaker: self,
            probe,
            recorded: false,
        })
    }

    fn on_outcome(&self, probe: bool, outcome: CallOutcome) {
        let (previous, current, failures) = {
            let mut inner = self.lock();
            let previous = inner.state;
            match (outcome, probe) {
                (CallOutcome::Success, true) => {
                    inner.failure_count = 0;
                    inner.last_failure = None;
                    inner.state = CircuitState::Closed;
                }
                (CallOutcome::Success, false) => {
                    // Late successes of calls admitted before the circuit opened do not close it.
                    if inner.state == CircuitState::Closed {
                        inner.failure_count = 0;
                        inner.last_failure = None;
                    }
                }
                (CallOutcome::Failure, true) => {
                    inner.failure_count = inner.failure_count.saturating_add(1);
                    inner.last_failure = Some(Instant::now());
                    inner.state = CircuitState::Open;
                }
                (CallOutcome::Failure, false) => {
                    inner.failure_count = inner.failure_count.saturating_add(1);
                    inner.last_failure = Some(Instant::now());
                    if inner.state == CircuitState::Closed
                        && inner.failure_count >= self.config.failure_threshold
                    {
                        inner.state = CircuitState::Open;
                    }
                }
            }
            (previous, inner.state, inner.failure_count)
        };

        if previous == current {
            return;
        }
        match (previous, current) {
            (CircuitState::HalfOpen, CircuitState::Closed) => {
                tracing::info!(service = %self.service, "Circuit breaker reset to CLOSED");
            }
            (CircuitState::HalfOpen, CircuitState::Open) => {
                tracing::warn!(service = %self.service, "Circuit breaker reopened during half-open probe");
            }
            _ => {
                tracing::warn!(service = %self.service, failures, "Circuit breaker opened");
            }
        }
        metrics::record_circuit_state(&self.service, current);
    }
}

/// Admission ticket for one call. Must be resolved with [`CallPermit::record`];
/// dropping it unresolved records a failure.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    recorded: bool,
}

impl CallPermit<'_> {
    fn record(mut self, outcome: CallOutcome) {
        self.recorded = true;
        self.breaker.on_outcome(self.probe, outcome);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            tracing::debug!(service = %self.breaker.service, probe = self.probe, "Guarded call abandoned");
            self.breaker.on_outcome(self.probe, CallOutcome::Failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn breaker(threshold: u32, recovery_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "invoice",
            BreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_secs(recovery_secs),
            },
        )
    }

    async fn fail(b: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        b.call(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(b: &CircuitBreaker) -> Result<u32, BreakerError<&'static str>> {
        b.call(|| async { Ok::<_, &'static str>(7) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_rejects_without_invoking() {
        let b = breaker(3, 30);
        for _ in 0..3 {
            assert!(matches!(fail(&b).await, Err(BreakerError::Inner("boom"))));
        }
        assert_eq!(b.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result = b
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>(())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open)));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let b = breaker(3, 30);
        let _ = fail(&b).await;
        let _ = fail(&b).await;
        assert_eq!(b.failure_count(), 2);
        assert!(b.last_failure().is_some());

        assert_eq!(succeed(&b).await.unwrap(), 7);
        assert_eq!(b.failure_count(), 0);
        assert!(b.last_failure().is_none());

        let _ = fail(&b).await;
        let _ = fail(&b).await;
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_successes_stay_closed() {
        let b = breaker(1, 30);
        for _ in 0..50 {
            succeed(&b).await.unwrap();
            assert_eq!(b.state(), CircuitState::Closed);
        }
        assert_eq!(b.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_before_recovery_timeout() {
        let b = breaker(3, 30);
        for _ in 0..3 {
            let _ = fail(&b).await;
        }
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(matches!(succeed(&b).await, Err(BreakerError::Open)));
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_success_closes() {
        let b = breaker(3, 30);
        for _ in 0..3 {
            let _ = fail(&b).await;
        }
        tokio::time::advance(Duration::from_secs(31)).await;

        let invoked = AtomicU32::new(0);
        let result = b
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>("recovered")
            })
            .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.failure_count(), 0);
        assert!(b.last_failure().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_admitted_exactly_at_recovery_timeout() {
        let b = breaker(1, 30);
        let _ = fail(&b).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(succeed(&b).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_failure_reopens() {
        let b = breaker(3, 30);
        for _ in 0..3 {
            let _ = fail(&b).await;
        }
        let first_failure = b.last_failure().unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        assert!(matches!(fail(&b).await, Err(BreakerError::Inner(_))));
        assert_eq!(b.state(), CircuitState::Open);
        assert!(b.last_failure().unwrap() > first_failure);

        // Cool-down restarts from the probe failure.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(matches!(succeed(&b).await, Err(BreakerError::Open)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_while_half_open() {
        let b = breaker(1, 5);
        let _ = fail(&b).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let probe = b.acquire().expect("probe admitted");
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert!(b.acquire().is_none());
        probe.record(CallOutcome::Success);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_call_counts_as_failure() {
        let b = breaker(2, 5);
        drop(b.acquire());
        assert_eq!(b.failure_count(), 1);
        drop(b.acquire());
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_success_does_not_close_open_circuit() {
        let b = breaker(1, 30);
        let slow = b.acquire().expect("admitted while closed");
        let _ = fail(&b).await;
        assert_eq!(b.state(), CircuitState::Open);

        slow.record(CallOutcome::Success);
        assert_eq!(b.state(), CircuitState::Open);
        assert_eq!(b.failure_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_keeps_half_open_probe_in_charge() {
        let b = breaker(1, 30);
        let slow = b.acquire().expect("admitted while closed");
        let _ = fail(&b).await;
        let opened_at = b.last_failure().unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        let probe = b.acquire().expect("probe admitted");
        assert_eq!(b.state(), CircuitState::HalfOpen);

        slow.record(CallOutcome::Failure);
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert_eq!(b.failure_count(), 2);
        assert!(b.last_failure().unwrap() > opened_at);
        assert!(b.acquire().is_none());

        probe.record(CallOutcome::Success);
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classifier_decides_failures() {
        let b = breaker(2, 30);
        for _ in 0..2 {
            let result = b
                .call_classified(
                    || async { Ok::<u16, &'static str>(503) },
                    |r| match r {
                        Ok(status) if *status >= 500 => CallOutcome::Failure,
                        Ok(_) => CallOutcome::Success,
                        Err(_) => CallOutcome::Failure,
                    },
                )
                .await;
            assert_eq!(result.unwrap(), 503);
        }
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_lock_not_held_across_operation() {
        let b = Arc::new(breaker(5, 30));
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let run = |b: Arc<CircuitBreaker>, barrier: Arc<tokio::sync::Barrier>| async move {
            b.call(|| async move {
                barrier.wait().await;
                Ok::<_, &'static str>(())
            })
            .await
        };

        let (first, second) = tokio::join!(
            run(b.clone(), barrier.clone()),
            run(b.clone(), barrier.clone())
        );
        assert!(first.is_ok() && second.is_ok());
    }

    #[test]
    fn test_breakers_do_not_share_counters() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let a = breaker(1, 30);
            let c = CircuitBreaker::new("customer", BreakerConfig::default());
            let _ = fail(&a).await;
            assert_eq!(a.state(), CircuitState::Open);
            assert_eq!(c.state(), CircuitState::Closed);
            assert_eq!(c.failure_count(), 0);
        });
    }
}
