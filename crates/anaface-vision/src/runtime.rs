//! Factories for the backend, session and detector.
//!
//! The worker brings these up at `init` through [`ModelRuntime`], so tests can
//! swap the ONNX Runtime for a scripted session.

use async_trait::async_trait;
use tracing::info;

use crate::backend::{build_session, configure_backend};
use crate::error::{VisionError, VisionResult};
use crate::model_config::ModelConfig;
use crate::retinaface::{FaceDetector, RetinaFaceDetector};
use crate::session::{InferenceSession, OrtSession};
use crate::stage::{stages, StageTimer};

#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Process-wide backend configuration. Must be idempotent: returns
    /// `Ok(true)` only for the call that actually configured it.
    async fn configure_backend(&self) -> VisionResult<bool>;

    /// Load the network into a new session.
    async fn create_session(&self) -> VisionResult<Box<dyn InferenceSession>>;

    /// Construct the detector module.
    async fn create_detector(&self) -> VisionResult<Box<dyn FaceDetector>>;
}

/// ONNX Runtime with the RetinaFace decoder.
#[derive(Debug, Clone, Default)]
pub struct OrtRuntime {
    config: ModelConfig,
}

impl OrtRuntime {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

#[async_trait]
impl ModelRuntime for OrtRuntime {
    async fn configure_backend(&self) -> VisionResult<bool> {
        configure_backend().await
    }

    async fn create_session(&self) -> VisionResult<Box<dyn InferenceSession>> {
        let timer = StageTimer::start(stages::SETUP_ORT);
        let config = self.config.clone();

        let (path, session, provider) = tokio::task::spawn_blocking(move || {
            let (path, bytes) = config.read_model()?;
            let (session, provider) =
                build_session(&bytes, &config.providers, config.intra_threads)?;
            Ok::<_, VisionError>((path, session, provider))
        })
        .await
        .map_err(|e| VisionError::session_create(format!("session task panicked: {e}")))??;

        let session = OrtSession::new(session, self.config.input_name.clone(), provider)?;
        timer.finish();

        info!(
            model_path = %path.display(),
            provider = %provider,
            "Face detection session ready"
        );
        Ok(Box::new(session))
    }

    async fn create_detector(&self) -> VisionResult<Box<dyn FaceDetector>> {
        Ok(Box::new(RetinaFaceDetector::new()))
    }
}
