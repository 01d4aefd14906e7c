//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use anaface_vision::model_config::{DEFAULT_INPUT_NAME, DEFAULT_INTRA_THREADS};
use anaface_vision::retinaface::{DEFAULT_NMS_THRESHOLD, DEFAULT_SCORE_THRESHOLD};
use anaface_vision::{ExecutionTarget, ModelConfig, Thresholds, DEFAULT_SURFACE_SIZE};
use tracing::warn;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Explicit model file; the standard locations are searched when unset
    pub model_path: Option<PathBuf>,
    /// Input tensor name
    pub input_name: String,
    /// Side of the square surface allocated for a bare `init`
    pub surface_size: u32,
    /// Detector score threshold
    pub score_threshold: f32,
    /// Detector overlap threshold
    pub nms_threshold: f32,
    /// Inference intra-op threads
    pub intra_threads: usize,
    /// Execution providers in priority order, CPU last
    pub providers: Vec<ExecutionTarget>,
    /// Capacity of the command and reply channels
    pub queue_capacity: usize,
    /// Prometheus listener, if any
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_name: DEFAULT_INPUT_NAME.to_string(),
            surface_size: DEFAULT_SURFACE_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            intra_threads: DEFAULT_INTRA_THREADS,
            providers: ExecutionTarget::DEFAULT_PRIORITY.to_vec(),
            queue_capacity: 32,
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("ANAFACE_MODEL_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            input_name: std::env::var("ANAFACE_INPUT_NAME").unwrap_or(defaults.input_name),
            surface_size: std::env::var("ANAFACE_SURFACE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&s: &u32| s > 0)
                .unwrap_or(defaults.surface_size),
            score_threshold: std::env::var("ANAFACE_SCORE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.score_threshold),
            nms_threshold: std::env::var("ANAFACE_NMS_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.nms_threshold),
            intra_threads: std::env::var("ANAFACE_INTRA_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.intra_threads),
            providers: std::env::var("ANAFACE_EXECUTION_PROVIDERS")
                .ok()
                .and_then(|s| match ExecutionTarget::parse_list(&s) {
                    Ok(list) => Some(list),
                    Err(e) => {
                        warn!("Ignoring ANAFACE_EXECUTION_PROVIDERS: {}", e);
                        None
                    }
                })
                .unwrap_or(defaults.providers),
            queue_capacity: std::env::var("ANAFACE_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&c: &usize| c > 0)
                .unwrap_or(defaults.queue_capacity),
            metrics_addr: std::env::var("ANAFACE_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Model options derived from this config.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model_path: self.model_path.clone(),
            input_name: self.input_name.clone(),
            intra_threads: self.intra_threads,
            providers: self.providers.clone(),
            ..ModelConfig::default()
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            score: self.score_threshold,
            nms: self.nms_threshold,
        }
    }
}
