//! Bring-up of the inference session and detector module.

use std::sync::Arc;

use anaface_vision::stage::{stages, StageTimer};
use anaface_vision::{FacePipeline, ModelRuntime, Surface, Thresholds};
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

/// Owns the runtime used to acquire the session and detector.
///
/// Both acquisitions run concurrently and both must succeed; the first
/// failure aborts the join. Nothing is retried.
#[derive(Clone)]
pub struct SessionManager {
    runtime: Arc<dyn ModelRuntime>,
    thresholds: Thresholds,
}

impl SessionManager {
    pub fn new(runtime: Arc<dyn ModelRuntime>, thresholds: Thresholds) -> Self {
        Self {
            runtime,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Acquire everything and take ownership of `surface`.
    pub async fn bring_up(&self, surface: Surface) -> WorkerResult<FacePipeline> {
        let timer = StageTimer::start(stages::INIT);
        let runtime = &self.runtime;

        let session = async {
            let configured = runtime.configure_backend().await?;
            debug!(configured_now = configured, "Inference backend available");
            runtime.create_session().await
        };
        let detector = runtime.create_detector();

        let (session, detector) = tokio::try_join!(session, detector)?;
        let provider = session.provider();
        let detector_name = detector.name();

        let pipeline = FacePipeline::new(surface, session, detector, self.thresholds)
            .map_err(WorkerError::from)?;
        let elapsed = timer.finish();

        info!(
            provider = %provider,
            detector = detector_name,
            size = pipeline.size(),
            elapsed_ms = elapsed * 1000.0,
            "Face detection pipeline ready"
        );
        Ok(pipeline)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anaface_models::ErrorKind;
    use anaface_vision::{
        DetectionHeads, ExecutionTarget, FaceDetector, InferenceSession, InputTensor,
        OnceInit, RetinaFaceDetector, VisionError, VisionResult,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EmptySession;

    #[async_trait]
    impl InferenceSession for EmptySession {
        async fn run(&mut self, input: InputTensor) -> VisionResult<DetectionHeads> {
            Ok(DetectionHeads::zeroed(input.size() as u32))
        }

        fn provider(&self) -> ExecutionTarget {
            ExecutionTarget::Cpu
        }
    }

    #[derive(Default)]
    struct FakeRuntime {
        backend: OnceInit,
        sessions: AtomicUsize,
        fail_session: bool,
        fail_detector: bool,
    }

    #[async_trait]
    impl ModelRuntime for FakeRuntime {
        async fn configure_backend(&self) -> VisionResult<bool> {
            self.backend.run(|| async { Ok(()) }).await
        }

        async fn create_session(&self) -> VisionResult<Box<dyn InferenceSession>> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            if self.fail_session {
                return Err(VisionError::model_not_found("det_10g.onnx"));
            }
            Ok(Box::new(EmptySession))
        }

        async fn create_detector(&self) -> VisionResult<Box<dyn FaceDetector>> {
            if self.fail_detector {
                return Err(VisionError::backend_init("detector module failed to load"));
            }
            Ok(Box::new(RetinaFaceDetector::new()))
        }
    }

    #[tokio::test]
    async fn test_bring_up_builds_pipeline() {
        let runtime = Arc::new(FakeRuntime::default());
        let manager = SessionManager::new(runtime.clone(), Thresholds::default());

        let pipeline = manager.bring_up(Surface::square(64)).await.unwrap();
        assert_eq!(pipeline.size(), 64);
        assert_eq!(runtime.backend.runs(), 1);
        assert_eq!(runtime.sessions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_configured_once_across_bring_ups() {
        let runtime = Arc::new(FakeRuntime::default());
        let first = SessionManager::new(runtime.clone(), Thresholds::default());
        let second = SessionManager::new(runtime.clone(), Thresholds::default());

        first.bring_up(Surface::square(32)).await.unwrap();
        second.bring_up(Surface::square(32)).await.unwrap();
        assert_eq!(runtime.backend.runs(), 1);
        assert_eq!(runtime.sessions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_session_failure_is_fatal() {
        let runtime = Arc::new(FakeRuntime {
            fail_session: true,
            ..FakeRuntime::default()
        });
        let manager = SessionManager::new(runtime, Thresholds::default());
        let err = manager.bring_up(Surface::square(32)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }

    #[tokio::test]
    async fn test_detector_failure_aborts_join() {
        let runtime = Arc::new(FakeRuntime {
            fail_detector: true,
            ..FakeRuntime::default()
        });
        let manager = SessionManager::new(runtime, Thresholds::default());
        let err = manager.bring_up(Surface::square(32)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }
}
