//! # Gateway
//!
//! Admission-controlled, fault-tolerant access to the single upstream
//! text-generation service.
//!
//! - [`QuotaTracker`]: per-minute and per-day admission windows
//! - [`CircuitBreaker`]: consecutive-failure isolation with a single trial call
//! - [`RetryScheduler`]: bounded exponential-backoff retry behind both guards
//! - [`BatchScheduler`]: groups work items into few upstream calls
//!
//! All four share process-wide state through one [`Gateway`] value, built
//! once from configuration and injected into every agent.

pub mod batch;
pub mod circuit_breaker;
pub mod quota;
pub mod retry;
pub mod stats;
pub mod telemetry;

pub use batch::{BatchReport, BatchScheduler, ItemOutcome, WorkBatch};
pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use quota::{Admission, QuotaTracker, QuotaWindowSnapshot, WindowKind};
pub use retry::{AttemptOutcome, Backoff, CallAttempt, RetryScheduler};
pub use stats::{GatewayStats, StatsSnapshot};
pub use telemetry::GatewayTelemetry;

use config::Config;
use errors::{GatewayError, UpstreamError};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Read-only view of quota, circuit and usage state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    pub quota: Vec<QuotaWindowSnapshot>,
    pub circuit: CircuitSnapshot,
    pub stats: StatsSnapshot
}

/// The process-wide gateway service object.
pub struct Gateway {
    quota: Arc<QuotaTracker>,
    breaker: Arc<CircuitBreaker>,
    stats: Arc<GatewayStats>,
    retry: RetryScheduler,
    batch: BatchScheduler
}

impl Gateway {
    pub fn from_config(config: &Config) -> Self {
        let telemetry = Arc::new(GatewayTelemetry::new());
        let quota = Arc::new(QuotaTracker::from_config(&config.quota, telemetry.clone()));
        let breaker = Arc::new(CircuitBreaker::from_config(
            &config.circuit,
            telemetry.clone()
        ));
        let stats = Arc::new(GatewayStats::new());
        let retry = RetryScheduler::new(
            quota.clone(),
            breaker.clone(),
            stats.clone(),
            telemetry.clone(),
            &config.retry
        );
        let batch = BatchScheduler::from_config(&config.batch, telemetry);

        tracing::info!(
            per_minute = config.quota.requests_per_minute,
            per_day = config.quota.requests_per_day,
            failure_threshold = config.circuit.failure_threshold,
            max_attempts = config.retry.max_attempts,
            max_items_per_batch = config.batch.max_items_per_batch,
            "Gateway initialized"
        );

        Self {
            quota,
            breaker,
            stats,
            retry,
            batch
        }
    }

    pub async fn execute<T, F, Fut>(&self, deadline: Instant, call: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>
    {
        self.retry.execute(deadline, call).await
    }

    pub async fn execute_with_attempts<T, F, Fut>(
        &self,
        deadline: Instant,
        call: F
    ) -> (Result<T, GatewayError>, Vec<CallAttempt>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>
    {
        self.retry.execute_with_attempts(deadline, call).await
    }

    pub async fn schedule_batches<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        deadline: Instant,
        analyze: F
    ) -> BatchReport<R>
    where
        T: Clone,
        F: Fn(WorkBatch<T>) -> Fut,
        Fut: Future<Output = Result<Vec<R>, UpstreamError>>
    {
        self.batch
            .schedule(&self.retry, items, deadline, analyze)
            .await
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            quota: self.quota.snapshot(),
            circuit: self.breaker.snapshot(),
            stats: self.stats.snapshot()
        }
    }

    /// Clears quota windows, closes the breaker and zeroes statistics.
    pub fn reset(&self) {
        self.quota.reset();
        self.breaker.reset();
        self.stats.reset();
        tracing::warn!("Gateway state reset by operator");
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn batch_scheduler(&self) -> &BatchScheduler {
        &self.batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_status_reflects_calls_and_reset() {
        let gateway = Gateway::from_config(&Config::default());
        let deadline = Instant::now() + Duration::from_secs(10);

        let value = gateway
            .execute(deadline, || async { Ok::<_, UpstreamError>(1) })
            .await
            .unwrap();
        assert_eq!(value, 1);

        let status = gateway.status();
        assert_eq!(status.quota[0].count, 1);
        assert_eq!(status.quota[0].limit, 50);
        assert_eq!(status.circuit.state, CircuitState::Closed);
        assert_eq!(status.stats.total_calls, 1);
        assert_eq!(status.stats.successes, 1);

        gateway.reset();
        let status = gateway.status();
        assert_eq!(status.quota[0].count, 0);
        assert_eq!(status.stats.total_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_serializes() {
        let gateway = Gateway::from_config(&Config::default());
        let json = serde_json::to_value(gateway.status()).unwrap();
        assert_eq!(json["circuit"]["state"], "closed");
        assert_eq!(json["quota"][1]["kind"], "day");
    }
}
