use metrics::{counter, histogram};
use std::time::Duration;

pub struct PipelineTelemetry;

impl PipelineTelemetry {
    pub fn record_stage(stage: &'static str, outcome: &'static str) {
        counter!("pipeline_stage_total", "stage" => stage, "outcome" => outcome).increment(1);
    }

    pub fn record_duration(elapsed: Duration, completed: bool) {
        let status = if completed { "done" } else { "failed" };
        histogram!("pipeline_duration_ms", "status" => status).record(elapsed.as_millis() as f64);
    }

    pub fn record_request(route: &'static str) {
        counter!("service_requests_total", "route" => route).increment(1);
    }

    pub fn record_error(route: &'static str, code: String) {
        counter!("service_errors_total", "route" => route, "code" => code).increment(1);
    }
}
