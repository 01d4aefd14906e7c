//! ONNX Runtime bring-up and execution provider selection.
//!
//! Providers are tried in priority order and the first one that can load the
//! model wins. CPU is always the last resort:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - DirectML on Windows
//! - CPU on all platforms

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{VisionError, VisionResult};

/// A selectable backend for executing the network graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionTarget {
    Cuda,
    CoreMl,
    DirectMl,
    Cpu,
}

impl ExecutionTarget {
    /// Default priority: accelerators first, CPU last.
    pub const DEFAULT_PRIORITY: [ExecutionTarget; 4] = [
        ExecutionTarget::Cuda,
        ExecutionTarget::CoreMl,
        ExecutionTarget::DirectMl,
        ExecutionTarget::Cpu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionTarget::Cuda => "cuda",
            ExecutionTarget::CoreMl => "coreml",
            ExecutionTarget::DirectMl => "directml",
            ExecutionTarget::Cpu => "cpu",
        }
    }

    /// Whether this build can register the provider at all.
    pub fn is_compiled_in(&self) -> bool {
        match self {
            ExecutionTarget::Cuda => cfg!(all(target_os = "linux", feature = "cuda")),
            ExecutionTarget::CoreMl => cfg!(target_os = "macos"),
            ExecutionTarget::DirectMl => cfg!(target_os = "windows"),
            ExecutionTarget::Cpu => true,
        }
    }

    /// Parse a comma-separated priority list. Unknown names are an error;
    /// duplicates are dropped and `cpu` is appended when missing.
    pub fn parse_list(list: &str) -> VisionResult<Vec<ExecutionTarget>> {
        let mut targets = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let target: ExecutionTarget = name.parse()?;
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        if !targets.contains(&ExecutionTarget::Cpu) {
            targets.push(ExecutionTarget::Cpu);
        }
        Ok(targets)
    }
}

impl FromStr for ExecutionTarget {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cuda" => Ok(ExecutionTarget::Cuda),
            "coreml" => Ok(ExecutionTarget::CoreMl),
            "directml" | "dml" => Ok(ExecutionTarget::DirectMl),
            "cpu" => Ok(ExecutionTarget::Cpu),
            other => Err(VisionError::backend_init(format!(
                "unknown execution provider '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs an async initializer at most once per process.
///
/// A failed attempt leaves the guard unset so a later caller may try again.
pub struct OnceInit {
    cell: OnceCell<()>,
    runs: AtomicUsize,
}

impl OnceInit {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
            runs: AtomicUsize::new(0),
        }
    }

    /// Run `init` unless a previous call already succeeded.
    /// Returns `true` when this call performed the initialization.
    pub async fn run<F, Fut>(&self, init: F) -> VisionResult<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = VisionResult<()>>,
    {
        let performed = AtomicBool::new(false);
        let performed_ref = &performed;
        let runs = &self.runs;

        self.cell
            .get_or_try_init(move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                init().await?;
                performed_ref.store(true, Ordering::SeqCst);
                Ok::<(), VisionError>(())
            })
            .await?;

        Ok(performed.load(Ordering::SeqCst))
    }

    pub fn is_done(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of times the initializer body was entered.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Default for OnceInit {
    fn default() -> Self {
        Self::new()
    }
}

static ORT_BACKEND: OnceInit = OnceInit::new();

/// Configure the ONNX Runtime environment for this process.
///
/// Later calls observe the configuration as done and return `Ok(false)`.
pub async fn configure_backend() -> VisionResult<bool> {
    ORT_BACKEND
        .run(|| async {
            // false when an environment already existed in this process
            let committed = ort::init()
                .with_name("anaface")
                .commit()
                .map_err(|e| VisionError::backend_init(format!("ORT environment: {e}")))?;
            debug!(committed, "ONNX Runtime environment commit");
            info!("ONNX Runtime environment configured");
            Ok(())
        })
        .await
}

/// How many times this process entered backend configuration.
pub fn backend_configure_runs() -> usize {
    ORT_BACKEND.runs()
}

/// Build a session from model bytes, trying `providers` in order.
///
/// Blocking; call from the blocking pool.
pub fn build_session(
    model_bytes: &[u8],
    providers: &[ExecutionTarget],
    intra_threads: usize,
) -> VisionResult<(Session, ExecutionTarget)> {
    let builder = Session::builder()
        .map_err(|e| VisionError::session_create(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::session_create(format!("Failed to set optimization level: {e}")))?
        .with_intra_threads(intra_threads.max(1))
        .map_err(|e| VisionError::session_create(format!("Failed to set intra threads: {e}")))?;

    let mut last_error = None;
    for &target in providers {
        if !target.is_compiled_in() {
            debug!(provider = %target, "Execution provider not compiled in, skipping");
            continue;
        }

        let attempt = register(builder.clone(), target).and_then(|b| {
            b.commit_from_memory(model_bytes)
                .map_err(|e| VisionError::session_create(format!("Failed to load ONNX model: {e}")))
        });

        match attempt {
            Ok(session) => {
                info!(provider = %target, "Using {} execution provider for face detection", target);
                return Ok((session, target));
            }
            Err(e) => {
                warn!(provider = %target, error = %e, "Execution provider unavailable, trying next");
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| VisionError::session_create("no usable execution provider")))
}

fn register(builder: SessionBuilder, target: ExecutionTarget) -> VisionResult<SessionBuilder> {
    match target {
        ExecutionTarget::Cuda => register_cuda(builder),
        ExecutionTarget::CoreMl => register_coreml(builder),
        ExecutionTarget::DirectMl => register_directml(builder),
        ExecutionTarget::Cpu => Ok(builder),
    }
}

#[cfg(all(target_os = "linux", feature = "cuda"))]
fn register_cuda(builder: SessionBuilder) -> VisionResult<SessionBuilder> {
    use ort::execution_providers::CUDAExecutionProvider;
    builder
        .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
        .map_err(|e| VisionError::session_create(format!("CUDA provider: {e}")))
}

#[cfg(not(all(target_os = "linux", feature = "cuda")))]
fn register_cuda(_builder: SessionBuilder) -> VisionResult<SessionBuilder> {
    Err(VisionError::session_create("CUDA provider not compiled in"))
}

#[cfg(target_os = "macos")]
fn register_coreml(builder: SessionBuilder) -> VisionResult<SessionBuilder> {
    use ort::execution_providers::CoreMLExecutionProvider;
    builder
        .with_execution_providers([CoreMLExecutionProvider::default().build().error_on_failure()])
        .map_err(|e| VisionError::session_create(format!("CoreML provider: {e}")))
}

#[cfg(not(target_os = "macos"))]
fn register_coreml(_builder: SessionBuilder) -> VisionResult<SessionBuilder> {
    Err(VisionError::session_create("CoreML provider not compiled in"))
}

#[cfg(target_os = "windows")]
fn register_directml(builder: SessionBuilder) -> VisionResult<SessionBuilder> {
    use ort::execution_providers::DirectMLExecutionProvider;
    builder
        .with_execution_providers([DirectMLExecutionProvider::default().build().error_on_failure()])
        .map_err(|e| VisionError::session_create(format!("DirectML provider: {e}")))
}

#[cfg(not(target_os = "windows"))]
fn register_directml(_builder: SessionBuilder) -> VisionResult<SessionBuilder> {
    Err(VisionError::session_create("DirectML provider not compiled in"))
}
