//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter, serves the /metrics payload and wraps
//! the domain counters recorded by the handlers.

use super::providers::TokenUsage;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Call once at startup before any metrics are recorded. Later calls are
/// ignored so test binaries can share one recorder.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        // A recorder is already installed globally; render from a detached one.
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder already installed");
            PrometheusBuilder::new().build_recorder().handle()
        }
    });
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

/// Outcome label shared by the analysis and report counters.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Success,
    ClientError,
    Failure,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::ClientError => "client_error",
            Outcome::Failure => "failure",
        }
    }
}

pub fn record_analysis(outcome: Outcome) {
    counter!("plant_analyses_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_genai_call(model: &str, elapsed: Duration, usage: TokenUsage) {
    histogram!("genai_request_duration_seconds", "model" => model.to_string())
        .record(elapsed.as_secs_f64());
    counter!("genai_tokens_total", "direction" => "input").increment(usage.input);
    counter!("genai_tokens_total", "direction" => "output").increment(usage.output);
}

pub fn record_report(outcome: Outcome) {
    counter!("reports_generated_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_render_duration(elapsed: Duration) {
    histogram!("report_render_duration_seconds").record(elapsed.as_secs_f64());
}
