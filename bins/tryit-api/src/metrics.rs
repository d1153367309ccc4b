// Prometheus metrics for the Try It API

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};
use tracing::error;

lazy_static! {
    /// Requests by endpoint and outcome (ok / user_error / infra_error /
    /// bad_request).
    pub static ref REQUESTS: IntCounterVec = register_int_counter_vec!(
        "tryit_requests_total",
        "Code execution requests by endpoint and outcome",
        &["endpoint", "outcome"]
    )
    .expect("failed to register tryit_requests_total");

    /// Child-process executions currently running.
    pub static ref EXECUTIONS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "tryit_executions_in_flight",
        "Code executions currently running"
    )
    .expect("failed to register tryit_executions_in_flight");
}

/// Render the default registry in the Prometheus text exposition format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_registered_metrics() {
        REQUESTS.with_label_values(&["run-python", "ok"]).inc();
        let body = render();
        assert!(body.contains("tryit_requests_total"));
    }
}
