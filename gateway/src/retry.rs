use crate::circuit_breaker::CircuitBreaker;
use crate::quota::{Admission, QuotaTracker};
use crate::stats::GatewayStats;
use crate::telemetry::GatewayTelemetry;
use config::RetryConfig;
use errors::{GatewayError, UpstreamError};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};

/// Exponential backoff with a per-caller jitter.
///
/// `delay(i) = min(base * 2^i, max_delay - max_jitter) + jitter`, where one
/// jitter in `(0, max_jitter]` is drawn per logical call. A single caller's
/// delays are therefore non-decreasing and never exceed `max_delay`, while
/// two callers almost surely never share a delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max_delay: Duration,
    max_jitter: Duration
}

impl Backoff {
    pub fn new(base: Duration, max_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            base: base.min(max_delay),
            max_delay,
            max_jitter: max_jitter.min(max_delay)
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            Duration::from_millis(config.max_jitter_ms)
        )
    }

    pub fn sample_jitter(&self) -> Duration {
        let fraction = 1.0 - rand::random::<f64>();
        self.max_jitter.mul_f64(fraction).max(Duration::from_nanos(1))
    }

    /// Delay slept after the failed attempt with zero-based index `retry_index`.
    pub fn delay(&self, retry_index: u32, jitter: Duration) -> Duration {
        let ceiling = self.max_delay.saturating_sub(self.max_jitter);
        let exponential = self.base.saturating_mul(2u32.saturating_pow(retry_index));
        exponential.min(ceiling) + jitter.min(self.max_jitter)
    }

    /// Full schedule of `retries` delays sharing one jitter draw.
    pub fn schedule(&self, retries: u32) -> Vec<Duration> {
        let jitter = self.sample_jitter();
        (0..retries).map(|i| self.delay(i, jitter)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    TransientError,
    QuotaExceeded,
    CircuitOpen,
    FatalError,
    DeadlineExceeded
}

impl AttemptOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::TransientError => "transient_error",
            AttemptOutcome::QuotaExceeded => "quota_exceeded",
            AttemptOutcome::CircuitOpen => "circuit_open",
            AttemptOutcome::FatalError => "fatal_error",
            AttemptOutcome::DeadlineExceeded => "deadline_exceeded"
        }
    }
}

/// One iteration of the retry loop, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallAttempt {
    pub attempt_number: u32,
    /// Backoff plus any quota wait spent before this attempt
    pub delay_before_attempt: Duration,
    pub outcome: AttemptOutcome
}

/// Wraps one logical upstream call with admission control, circuit breaking
/// and bounded exponential-backoff retry.
pub struct RetryScheduler {
    quota: Arc<QuotaTracker>,
    breaker: Arc<CircuitBreaker>,
    stats: Arc<GatewayStats>,
    telemetry: Arc<GatewayTelemetry>,
    backoff: Backoff,
    max_attempts: u32,
    max_quota_wait: Duration
}

impl RetryScheduler {
    pub fn new(
        quota: Arc<QuotaTracker>,
        breaker: Arc<CircuitBreaker>,
        stats: Arc<GatewayStats>,
        telemetry: Arc<GatewayTelemetry>,
        config: &RetryConfig
    ) -> Self {
        Self {
            quota,
            breaker,
            stats,
            telemetry,
            backoff: Backoff::from_config(config),
            max_attempts: config.max_attempts.max(1),
            max_quota_wait: Duration::from_millis(config.max_quota_wait_ms)
        }
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn execute<T, F, Fut>(&self, deadline: Instant, call: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>
    {
        let (result, attempts) = self.execute_with_attempts(deadline, call).await;
        tracing::debug!(attempts = ?attempts, "Gated upstream call finished");
        result
    }

    /// Runs `call` until it succeeds, fails fatally, runs out of attempts or
    /// hits `deadline`. `call` must perform exactly one upstream invocation.
    pub async fn execute_with_attempts<T, F, Fut>(
        &self,
        deadline: Instant,
        mut call: F
    ) -> (Result<T, GatewayError>, Vec<CallAttempt>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>
    {
        let started = Instant::now();
        let budget_ms = deadline.saturating_duration_since(started).as_millis() as u64;
        let jitter = self.backoff.sample_jitter();
        let mut attempts = Vec::with_capacity(self.max_attempts as usize);
        let mut pending_delay = Duration::ZERO;
        let mut last_reason = String::new();

        for attempt_number in 1..=self.max_attempts {
            let mut delay_before_attempt = std::mem::take(&mut pending_delay);

            if Instant::now() >= deadline {
                return self.expired_before_call(
                    attempt_number,
                    delay_before_attempt,
                    budget_ms,
                    attempts
                );
            }

            if !self.breaker.allow() {
                self.stats.record_circuit_rejection();
                attempts.push(CallAttempt {
                    attempt_number,
                    delay_before_attempt,
                    outcome: AttemptOutcome::CircuitOpen
                });
                let retry_after_ms = self.breaker.retry_in().as_millis() as u64;
                tracing::warn!(attempt_number, retry_after_ms, "Circuit open, call rejected");
                return (Err(GatewayError::CircuitOpen { retry_after_ms }), attempts);
            }

            loop {
                match self.quota.try_acquire() {
                    Admission::Granted => break,
                    Admission::Denied { retry_after } => {
                        if Instant::now() + retry_after > deadline {
                            attempts.push(CallAttempt {
                                attempt_number,
                                delay_before_attempt,
                                outcome: AttemptOutcome::QuotaExceeded
                            });
                            let retry_after_ms = retry_after.as_millis() as u64;
                            tracing::warn!(
                                retry_after_ms,
                                "Quota reset falls after the deadline, giving up"
                            );
                            return (Err(GatewayError::QuotaExceeded { retry_after_ms }), attempts);
                        }
                        let wait = retry_after.min(self.max_quota_wait);
                        self.stats.record_quota_wait();
                        tracing::info!(wait_ms = wait.as_millis() as u64, "Waiting for quota");
                        sleep(wait).await;
                        delay_before_attempt += wait;
                        if Instant::now() >= deadline {
                            return self.expired_before_call(
                                attempt_number,
                                delay_before_attempt,
                                budget_ms,
                                attempts
                            );
                        }
                    }
                }
            }

            self.stats.record_call();
            let call_started = Instant::now();
            let outcome = timeout_at(deadline, call()).await;
            let elapsed = call_started.elapsed();

            match outcome {
                Err(_) => {
                    self.breaker.record_failure();
                    self.stats.record_deadline_expiry();
                    self.telemetry
                        .record_upstream_call(AttemptOutcome::DeadlineExceeded, elapsed);
                    attempts.push(CallAttempt {
                        attempt_number,
                        delay_before_attempt,
                        outcome: AttemptOutcome::DeadlineExceeded
                    });
                    tracing::warn!(attempt_number, budget_ms, "Deadline expired mid-call");
                    return (
                        Err(GatewayError::DeadlineExceeded {
                            timeout_ms: budget_ms
                        }),
                        attempts
                    );
                }
                Ok(Ok(value)) => {
                    self.breaker.record_success();
                    self.stats.record_success();
                    self.telemetry
                        .record_upstream_call(AttemptOutcome::Success, elapsed);
                    attempts.push(CallAttempt {
                        attempt_number,
                        delay_before_attempt,
                        outcome: AttemptOutcome::Success
                    });
                    return (Ok(value), attempts);
                }
                Ok(Err(UpstreamError::Fatal { reason })) => {
                    self.breaker.record_failure();
                    self.stats.record_fatal_failure();
                    self.telemetry
                        .record_upstream_call(AttemptOutcome::FatalError, elapsed);
                    attempts.push(CallAttempt {
                        attempt_number,
                        delay_before_attempt,
                        outcome: AttemptOutcome::FatalError
                    });
                    tracing::error!(attempt_number, reason = %reason, "Upstream rejected call");
                    return (Err(GatewayError::FatalUpstream { reason }), attempts);
                }
                Ok(Err(UpstreamError::Transient {
                    reason,
                    retry_after_ms
                })) => {
                    self.breaker.record_failure();
                    self.stats.record_transient_failure();
                    self.telemetry
                        .record_upstream_call(AttemptOutcome::TransientError, elapsed);
                    attempts.push(CallAttempt {
                        attempt_number,
                        delay_before_attempt,
                        outcome: AttemptOutcome::TransientError
                    });
                    tracing::warn!(attempt_number, reason = %reason, "Transient upstream failure");
                    last_reason = reason;

                    if attempt_number < self.max_attempts {
                        let mut delay = self.backoff.delay(attempt_number - 1, jitter);
                        if let Some(hint_ms) = retry_after_ms {
                            let hint = Duration::from_millis(hint_ms);
                            if Instant::now() + hint > deadline {
                                tracing::warn!(
                                    retry_after_ms = hint_ms,
                                    "Upstream rate limit outlasts the deadline, giving up"
                                );
                                return (
                                    Err(GatewayError::QuotaExceeded {
                                        retry_after_ms: hint_ms
                                    }),
                                    attempts
                                );
                            }
                            let hint = hint.min(self.max_quota_wait);
                            if hint > delay {
                                self.stats.record_quota_wait();
                                delay = hint;
                            }
                        }
                        if Instant::now() + delay > deadline {
                            self.stats.record_deadline_expiry();
                            return (
                                Err(GatewayError::DeadlineExceeded {
                                    timeout_ms: budget_ms
                                }),
                                attempts
                            );
                        }
                        sleep(delay).await;
                        pending_delay = delay;
                    }
                }
            }
        }

        (
            Err(GatewayError::TransientUpstream {
                reason: last_reason,
                attempts: self.max_attempts
            }),
            attempts
        )
    }

    /// The deadline passed before the upstream was reached. Quota and the
    /// breaker are left untouched.
    fn expired_before_call<T>(
        &self,
        attempt_number: u32,
        delay_before_attempt: Duration,
        budget_ms: u64,
        mut attempts: Vec<CallAttempt>
    ) -> (Result<T, GatewayError>, Vec<CallAttempt>) {
        self.stats.record_deadline_expiry();
        attempts.push(CallAttempt {
            attempt_number,
            delay_before_attempt,
            outcome: AttemptOutcome::DeadlineExceeded
        });
        tracing::warn!(attempt_number, budget_ms, "Deadline passed before the call");
        (
            Err(GatewayError::DeadlineExceeded {
                timeout_ms: budget_ms
            }),
            attempts
        )
    }
}
