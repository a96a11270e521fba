use crate::telemetry::GatewayTelemetry;
use config::CircuitConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub retry_in_ms: u64
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started_at: Option<Instant>
}

impl BreakerInner {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_started_at: None
        }
    }
}

/// Consecutive-failure circuit breaker shared by every upstream caller.
///
/// In half-open state exactly one trial call is admitted. It holds a lease of
/// one cooldown; if its outcome is never recorded the lease expires and
/// another caller may take the trial.
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
    telemetry: Arc<GatewayTelemetry>
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration, telemetry: Arc<GatewayTelemetry>) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerInner::closed()),
            telemetry
        }
    }

    pub fn from_config(config: &CircuitConfig, telemetry: Arc<GatewayTelemetry>) -> Self {
        Self::new(config.failure_threshold, config.cooldown(), telemetry)
    }

    pub fn allow(&self) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_none_or(|at| now.duration_since(at) >= self.cooldown);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_started_at = Some(now);
                    drop(inner);
                    self.telemetry.record_circuit_transition(CircuitState::HalfOpen);
                    tracing::info!("Circuit breaker transitioned to HALF-OPEN, admitting a trial");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                let trial_free = inner
                    .trial_started_at
                    .is_none_or(|at| now.duration_since(at) >= self.cooldown);
                if trial_free {
                    inner.trial_started_at = Some(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                *inner = BreakerInner::closed();
                drop(inner);
                self.telemetry.record_circuit_transition(CircuitState::Closed);
                tracing::info!("Circuit breaker closed after successful trial call");
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                    let failures = inner.consecutive_failures;
                    drop(inner);
                    self.telemetry.record_circuit_transition(CircuitState::Open);
                    tracing::error!(
                        consecutive_failures = failures,
                        threshold = self.failure_threshold,
                        "Circuit breaker OPENED"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.consecutive_failures += 1;
                inner.opened_at = Some(now);
                inner.trial_started_at = None;
                drop(inner);
                self.telemetry.record_circuit_transition(CircuitState::Open);
                tracing::error!("Circuit breaker re-OPENED after failed trial call");
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Time until a call could be admitted; zero when one would be now.
    pub fn retry_in(&self) -> Duration {
        let inner = self.inner.lock();
        self.retry_in_locked(&inner, Instant::now())
    }

    fn retry_in_locked(&self, inner: &BreakerInner, now: Instant) -> Duration {
        let since = match inner.state {
            CircuitState::Closed => None,
            CircuitState::Open => inner.opened_at,
            CircuitState::HalfOpen => inner.trial_started_at
        };
        since
            .map(|at| (at + self.cooldown).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.failure_threshold,
            retry_in_ms: self.retry_in_locked(&inner, Instant::now()).as_millis() as u64
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = BreakerInner::closed();
        tracing::info!("Circuit breaker reset to CLOSED");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            threshold,
            Duration::from_secs(cooldown_secs),
            Arc::new(GatewayTelemetry::new())
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_allows_requests() {
        let cb = breaker(3, 60);
        assert!(cb.allow());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let cb = breaker(3, 60);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow());
        assert_eq!(cb.retry_in(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_count() {
        let cb = breaker(3, 60);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.snapshot().consecutive_failures, 0);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_success_two_failures_stays_closed() {
        let cb = breaker(4, 60);
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trial_call_after_cooldown() {
        let cb = breaker(2, 30);
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.allow());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!cb.allow());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.allow());
        assert!(!cb.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_success_closes() {
        let cb = breaker(1, 10);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cb.allow());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 0);
        assert!(cb.allow());
        assert!(cb.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_failure_reopens_with_fresh_cooldown() {
        let cb = breaker(1, 10);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cb.allow());

        tokio::time::advance(Duration::from_secs(3)).await;
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.retry_in(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!cb.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_lease_expires() {
        let cb = breaker(1, 10);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cb.allow());
        assert!(!cb.allow());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cb.allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_closes() {
        let cb = breaker(1, 60);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().retry_in_ms, 0);
    }

    #[test]
    fn test_snapshot_serializes_state() {
        let snapshot = CircuitSnapshot {
            state: CircuitState::HalfOpen,
            consecutive_failures: 1,
            failure_threshold: 5,
            retry_in_ms: 0
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "half_open");
    }
}
