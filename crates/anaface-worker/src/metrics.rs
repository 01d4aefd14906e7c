//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use anaface_models::ErrorKind;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const COMMANDS_TOTAL: &str = "anaface_commands_total";
    pub const COMMAND_DURATION_SECONDS: &str = "anaface_command_duration_seconds";
    pub const COMMAND_ERRORS_TOTAL: &str = "anaface_command_errors_total";
    pub const FACES_DETECTED_TOTAL: &str = "anaface_faces_detected_total";
    pub const WORKER_READY: &str = "anaface_worker_ready";
    pub use anaface_vision::stage::STAGE_DURATION_SECONDS;
}

/// Record a handled command.
pub fn record_command(command: &str, reply: &str, duration_secs: f64) {
    let labels = [("command", command.to_string()), ("reply", reply.to_string())];
    counter!(names::COMMANDS_TOTAL, &labels).increment(1);
    histogram!(names::COMMAND_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a command that produced an error reply.
pub fn record_error(command: &str, kind: ErrorKind) {
    let labels = [("command", command.to_string()), ("kind", kind.to_string())];
    counter!(names::COMMAND_ERRORS_TOTAL, &labels).increment(1);
}

/// Record faces returned by one analyze call.
pub fn record_faces(count: usize) {
    counter!(names::FACES_DETECTED_TOTAL).increment(count as u64);
}

/// Track readiness as a 0/1 gauge.
pub fn set_ready(ready: bool) {
    gauge!(names::WORKER_READY).set(if ready { 1.0 } else { 0.0 });
}
