use crate::telemetry::GatewayTelemetry;
use config::QuotaConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Minute,
    Day
}

impl WindowKind {
    pub fn duration(self) -> Duration {
        match self {
            WindowKind::Minute => Duration::from_secs(60),
            WindowKind::Day => Duration::from_secs(86_400)
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    Denied { retry_after: Duration }
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

#[derive(Debug)]
struct QuotaWindow {
    kind: WindowKind,
    limit: u32,
    count: u32,
    window_start: Option<Instant>
}

impl QuotaWindow {
    fn new(kind: WindowKind, limit: u32) -> Self {
        Self {
            kind,
            limit: limit.max(1),
            count: 0,
            window_start: None
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.window_start
            .is_some_and(|start| now.duration_since(start) >= self.kind.duration())
    }

    fn roll(&mut self, now: Instant) {
        if self.is_expired(now) {
            self.count = 0;
            self.window_start = None;
        }
    }

    fn current_count(&self, now: Instant) -> u32 {
        if self.is_expired(now) { 0 } else { self.count }
    }

    fn resets_in(&self, now: Instant) -> Duration {
        match self.window_start {
            Some(start) => (start + self.kind.duration()).saturating_duration_since(now),
            None => Duration::ZERO
        }
    }
}

/// Point-in-time view of one quota window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaWindowSnapshot {
    pub kind: WindowKind,
    pub limit: u32,
    pub count: u32,
    pub remaining: u32,
    pub resets_in_ms: u64
}

/// Process-wide admission control for upstream calls.
///
/// Each window is a fixed window anchored at the first call it admits. The
/// check and the increment of every window happen under one lock, so
/// concurrent callers can never be over-admitted.
pub struct QuotaTracker {
    windows: Mutex<Vec<QuotaWindow>>,
    telemetry: Arc<GatewayTelemetry>
}

impl QuotaTracker {
    pub fn new(per_minute: u32, per_day: u32, telemetry: Arc<GatewayTelemetry>) -> Self {
        Self {
            windows: Mutex::new(vec![
                QuotaWindow::new(WindowKind::Minute, per_minute),
                QuotaWindow::new(WindowKind::Day, per_day),
            ]),
            telemetry
        }
    }

    pub fn from_config(config: &QuotaConfig, telemetry: Arc<GatewayTelemetry>) -> Self {
        Self::new(
            config.requests_per_minute,
            config.requests_per_day,
            telemetry
        )
    }

    /// Grants a call only when every window has headroom.
    ///
    /// When denied, `retry_after` is the time until the last exhausted window
    /// resets, the earliest moment at which a retry can succeed.
    pub fn try_acquire(&self) -> Admission {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        for window in windows.iter_mut() {
            window.roll(now);
        }

        let retry_after = windows
            .iter()
            .filter(|w| w.count >= w.limit)
            .map(|w| w.resets_in(now))
            .max();

        if let Some(retry_after) = retry_after {
            drop(windows);
            self.telemetry.record_quota_denial();
            tracing::debug!(
                retry_after_ms = retry_after.as_millis() as u64,
                "Quota exhausted, call denied"
            );
            return Admission::Denied { retry_after };
        }

        for window in windows.iter_mut() {
            window.window_start.get_or_insert(now);
            window.count += 1;
        }

        Admission::Granted
    }

    /// Read-only view; never rolls or mutates a window.
    pub fn snapshot(&self) -> Vec<QuotaWindowSnapshot> {
        let now = Instant::now();
        self.windows
            .lock()
            .iter()
            .map(|w| {
                let count = w.current_count(now);
                let resets_in = if w.is_expired(now) {
                    Duration::ZERO
                } else {
                    w.resets_in(now)
                };
                QuotaWindowSnapshot {
                    kind: w.kind,
                    limit: w.limit,
                    count,
                    remaining: w.limit.saturating_sub(count),
                    resets_in_ms: resets_in.as_millis() as u64
                }
            })
            .collect()
    }

    pub fn reset(&self) {
        for window in self.windows.lock().iter_mut() {
            window.count = 0;
            window.window_start = None;
        }
        tracing::info!("Quota windows reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(per_minute: u32, per_day: u32) -> QuotaTracker {
        QuotaTracker::new(per_minute, per_day, Arc::new(GatewayTelemetry::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_grants_exactly_limit_within_window() {
        let quota = tracker(5, 100);

        let outcomes: Vec<Admission> = (0..8).map(|_| quota.try_acquire()).collect();
        let granted = outcomes.iter().filter(|a| a.is_granted()).count();
        assert_eq!(granted, 5);

        for denied in &outcomes[5..] {
            match denied {
                Admission::Denied { retry_after } => assert!(*retry_after > Duration::ZERO),
                Admission::Granted => panic!("expected denial")
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_duration() {
        let quota = tracker(2, 100);
        assert!(quota.try_acquire().is_granted());
        assert!(quota.try_acquire().is_granted());

        tokio::time::advance(Duration::from_secs(20)).await;
        match quota.try_acquire() {
            Admission::Denied { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(40));
            }
            Admission::Granted => panic!("window should still be exhausted")
        }

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(quota.try_acquire().is_granted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_day_window_caps_minute_resets() {
        let quota = tracker(2, 3);
        assert!(quota.try_acquire().is_granted());
        assert!(quota.try_acquire().is_granted());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(quota.try_acquire().is_granted());

        match quota.try_acquire() {
            Admission::Denied { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(86_400 - 60));
            }
            Admission::Granted => panic!("day window should be exhausted")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_pure_read() {
        let quota = tracker(2, 10);
        quota.try_acquire();

        let first = quota.snapshot();
        let second = quota.snapshot();
        assert_eq!(first, second);
        assert_eq!(first[0].kind, WindowKind::Minute);
        assert_eq!(first[0].count, 1);
        assert_eq!(first[0].remaining, 1);
        assert_eq!(first[1].count, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let expired = quota.snapshot();
        assert_eq!(expired[0].count, 0);
        assert_eq!(expired[0].resets_in_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_counts() {
        let quota = tracker(1, 10);
        assert!(quota.try_acquire().is_granted());
        assert!(!quota.try_acquire().is_granted());

        quota.reset();
        assert!(quota.try_acquire().is_granted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_over_admitted() {
        let quota = Arc::new(tracker(10, 1000));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let quota = quota.clone();
            handles.push(tokio::spawn(async move { quota.try_acquire().is_granted() }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
    }
}
