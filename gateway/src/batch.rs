use crate::retry::RetryScheduler;
use crate::telemetry::GatewayTelemetry;
use config::BatchConfig;
use errors::{FailureMarker, UpstreamError};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// A contiguous slice of the input, submitted as one upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkBatch<T> {
    pub batch_id: usize,
    /// Index of the first item within the full input
    pub offset: usize,
    pub items: Vec<T>
}

/// Per-item result, aligned by position with the scheduled input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ItemOutcome<R> {
    Completed(R),
    #[serde(rename = "analysis_unavailable")]
    Unavailable(FailureMarker)
}

impl<R> ItemOutcome<R> {
    pub fn completed(&self) -> Option<&R> {
        match self {
            ItemOutcome::Completed(value) => Some(value),
            ItemOutcome::Unavailable(_) => None
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ItemOutcome::Unavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport<R> {
    pub results: Vec<ItemOutcome<R>>,
    pub batches: usize,
    pub failed_batches: Vec<usize>
}

impl<R> BatchReport<R> {
    pub fn completed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_unavailable()).count()
    }
}

pub struct BatchScheduler {
    max_items_per_batch: usize,
    concurrency: usize,
    telemetry: Arc<GatewayTelemetry>
}

impl BatchScheduler {
    pub fn new(max_items_per_batch: usize, concurrency: usize, telemetry: Arc<GatewayTelemetry>) -> Self {
        Self {
            max_items_per_batch: max_items_per_batch.max(1),
            concurrency: concurrency.max(1),
            telemetry
        }
    }

    pub fn from_config(config: &BatchConfig, telemetry: Arc<GatewayTelemetry>) -> Self {
        Self::new(config.max_items_per_batch, config.concurrency, telemetry)
    }

    pub fn max_items_per_batch(&self) -> usize {
        self.max_items_per_batch
    }

    /// Splits `items` into contiguous batches; only the last may be short.
    pub fn partition<T>(&self, items: Vec<T>) -> Vec<WorkBatch<T>> {
        let mut batches = Vec::with_capacity(items.len().div_ceil(self.max_items_per_batch));
        let mut items = items.into_iter().peekable();
        let mut offset = 0;

        while items.peek().is_some() {
            let chunk: Vec<T> = items.by_ref().take(self.max_items_per_batch).collect();
            let len = chunk.len();
            batches.push(WorkBatch {
                batch_id: batches.len(),
                offset,
                items: chunk
            });
            offset += len;
        }

        batches
    }

    /// Runs `analyze` once per batch through `retry`.
    ///
    /// The output always has one entry per input item, in input order. A
    /// batch that fails after all retries marks each of its items
    /// unavailable; sibling batches are unaffected. A response whose length
    /// differs from its batch is treated as malformed and retried.
    pub async fn schedule<T, R, F, Fut>(
        &self,
        retry: &RetryScheduler,
        items: Vec<T>,
        deadline: Instant,
        analyze: F
    ) -> BatchReport<R>
    where
        T: Clone,
        F: Fn(WorkBatch<T>) -> Fut,
        Fut: Future<Output = Result<Vec<R>, UpstreamError>>
    {
        let total = items.len();
        let batches = self.partition(items);
        let batch_count = batches.len();
        let analyze = &analyze;

        tracing::info!(
            items = total,
            batches = batch_count,
            concurrency = self.concurrency,
            "Scheduling batches"
        );

        let outcomes: Vec<_> = stream::iter(batches)
            .map(move |batch| async move {
                let expected = batch.items.len();
                let result = retry
                    .execute(deadline, || {
                        let attempt = batch.clone();
                        async move {
                            let results = analyze(attempt).await?;
                            if results.len() != expected {
                                return Err(UpstreamError::malformed(format!(
                                    "expected {} results, got {}",
                                    expected,
                                    results.len()
                                )));
                            }
                            Ok(results)
                        }
                    })
                    .await;
                (batch.batch_id, expected, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut results = Vec::with_capacity(total);
        let mut failed_batches = Vec::new();

        for (batch_id, len, outcome) in outcomes {
            match outcome {
                Ok(values) => {
                    self.telemetry.record_batch_items(true, len);
                    results.extend(values.into_iter().map(ItemOutcome::Completed));
                }
                Err(err) => {
                    tracing::warn!(batch_id, items = len, error = %err, "Batch degraded");
                    self.telemetry.record_batch_items(false, len);
                    failed_batches.push(batch_id);
                    let marker = FailureMarker::from(&err);
                    results.extend((0..len).map(|_| ItemOutcome::Unavailable(marker.clone())));
                }
            }
        }

        BatchReport {
            results,
            batches: batch_count,
            failed_batches
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreaker;
    use crate::quota::QuotaTracker;
    use crate::stats::GatewayStats;
    use config::RetryConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn retry_scheduler(threshold: u32) -> RetryScheduler {
        let telemetry = Arc::new(GatewayTelemetry::new());
        RetryScheduler::new(
            Arc::new(QuotaTracker::new(1_000, 10_000, telemetry.clone())),
            Arc::new(CircuitBreaker::new(
                threshold,
                Duration::from_secs(60),
                telemetry.clone()
            )),
            Arc::new(GatewayStats::new()),
            telemetry,
            &RetryConfig {
                max_attempts: 2,
                base_delay_ms: 10,
                max_delay_ms: 100,
                max_jitter_ms: 5,
                max_quota_wait_ms: 65_000
            }
        )
    }

    fn scheduler(max_items: usize, concurrency: usize) -> BatchScheduler {
        BatchScheduler::new(max_items, concurrency, Arc::new(GatewayTelemetry::new()))
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn test_partition_sizes() {
        let batches = scheduler(4, 1).partition((0..10).collect::<Vec<_>>());
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].items, vec![0, 1, 2, 3]);
        assert_eq!(batches[1].offset, 4);
        assert_eq!(batches[2].items, vec![8, 9]);
        assert_eq!(batches[2].batch_id, 2);
    }

    #[test]
    fn test_partition_counts_match_ceiling() {
        for total in 0..20usize {
            for max in 1..6usize {
                let batches = scheduler(max, 1).partition(vec![(); total]);
                assert_eq!(batches.len(), total.div_ceil(max));
                assert!(batches.iter().all(|b| b.items.len() <= max));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_marks_only_its_items() {
        let retry = retry_scheduler(100);
        let report = scheduler(4, 1)
            .schedule(&retry, (1..=10).collect::<Vec<u32>>(), deadline(), |batch| async move {
                if batch.batch_id == 1 {
                    Err(UpstreamError::transient("503"))
                } else {
                    Ok(batch.items.iter().map(|n| n * 10).collect::<Vec<u32>>())
                }
            })
            .await;

        assert_eq!(report.results.len(), 10);
        assert_eq!(report.batches, 3);
        assert_eq!(report.failed_batches, vec![1]);
        for (i, outcome) in report.results.iter().enumerate() {
            if (4..8).contains(&i) {
                assert!(outcome.is_unavailable());
            } else {
                assert_eq!(outcome.completed(), Some(&((i as u32 + 1) * 10)));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_length_mismatch_is_retried() {
        let retry = retry_scheduler(100);
        let calls = AtomicUsize::new(0);
        let report = scheduler(3, 1)
            .schedule(&retry, vec!["a", "b", "c"], deadline(), |batch| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok::<_, UpstreamError>(vec![1usize])
                    } else {
                        Ok(batch.items.iter().map(|s| s.len()).collect())
                    }
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(report.failed_batches.is_empty());
        assert_eq!(report.completed_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_batches_keep_order() {
        let retry = retry_scheduler(100);
        let report = scheduler(2, 3)
            .schedule(&retry, (0..7).collect::<Vec<u64>>(), deadline(), |batch| async move {
                tokio::time::sleep(Duration::from_millis(100 - batch.batch_id as u64 * 20)).await;
                Ok::<_, UpstreamError>(batch.items.clone())
            })
            .await;

        let values: Vec<u64> = report
            .results
            .iter()
            .filter_map(|r| r.completed().copied())
            .collect();
        assert_eq!(values, (0..7).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_schedules_nothing() {
        let retry = retry_scheduler(100);
        let report = scheduler(4, 1)
            .schedule(&retry, Vec::<u8>::new(), deadline(), |_batch| async {
                Ok::<Vec<u8>, _>(Vec::new())
            })
            .await;
        assert_eq!(report.batches, 0);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_unavailable_serializes_with_marker() {
        let outcome: ItemOutcome<u8> = ItemOutcome::Unavailable(FailureMarker {
            code: "CIRCUIT_OPEN".to_string(),
            message: "Circuit open".to_string()
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "analysis_unavailable");
        assert_eq!(json["detail"]["code"], "CIRCUIT_OPEN");
    }
}
