use crate::circuit_breaker::CircuitState;
use crate::retry::AttemptOutcome;
use metrics::{counter, histogram};
use std::time::Duration;

#[derive(Debug)]
pub struct GatewayTelemetry {
    _phantom: std::marker::PhantomData<()>
}

impl Default for GatewayTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayTelemetry {
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData
        }
    }

    pub fn record_upstream_call(&self, outcome: AttemptOutcome, duration: Duration) {
        counter!("gateway_upstream_calls_total", "outcome" => outcome.as_str()).increment(1);
        histogram!("gateway_call_duration_ms", "outcome" => outcome.as_str())
            .record(duration.as_secs_f64() * 1000.0);
    }

    pub fn record_quota_denial(&self) {
        counter!("gateway_quota_denials_total").increment(1);
    }

    pub fn record_circuit_transition(&self, to: CircuitState) {
        counter!("gateway_circuit_transitions_total", "to" => to.as_str()).increment(1);
    }

    pub fn record_batch_items(&self, completed: bool, items: usize) {
        let outcome = if completed { "completed" } else { "unavailable" };
        counter!("gateway_batch_items_total", "outcome" => outcome).increment(items as u64);
    }
}
