//! Stage timing for the pipeline.

use std::time::Instant;

use metrics::histogram;
use tracing::debug;

/// Histogram of per-stage latency, labelled by `stage`.
pub const STAGE_DURATION_SECONDS: &str = "anaface_stage_duration_seconds";

/// Named pipeline stages.
pub mod stages {
    pub const SETUP_ORT: &str = "setup-ort";
    pub const INIT: &str = "init";
    pub const PAINT: &str = "paint";
    pub const PIXELS: &str = "pixels";
    pub const RUN: &str = "run";
    pub const RETINAFACE: &str = "retinaface";
}

/// Measures one stage; logs and records on [`StageTimer::finish`].
#[derive(Debug)]
pub struct StageTimer {
    stage: &'static str,
    start: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        Self {
            stage,
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed seconds.
    pub fn finish(self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        debug!(stage = self.stage, elapsed_ms = elapsed * 1000.0, "Stage finished");
        histogram!(STAGE_DURATION_SECONDS, "stage" => self.stage).record(elapsed);
        elapsed
    }
}
