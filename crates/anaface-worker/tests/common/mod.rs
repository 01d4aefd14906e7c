//! Scripted runtime shared by the worker integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anaface_vision::{
    DetectionHeads, ExecutionTarget, FaceDetector, InferenceSession, InputTensor, ModelRuntime,
    OnceInit, RetinaFaceDetector, Thresholds, VisionError, VisionResult,
};
use anaface_worker::{CommandRouter, SessionManager};
use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};

pub const SIZE: u32 = 640;

/// What the scripted sessions saw.
#[derive(Debug, Default)]
pub struct SessionLog {
    /// Red value of the top-left pixel of every input, in call order
    pub first_red: Mutex<Vec<f32>>,
    /// Runs that should fail before succeeding again
    pub failures_left: AtomicUsize,
}

impl SessionLog {
    pub fn runs(&self) -> usize {
        self.first_red.lock().unwrap().len()
    }
}

pub struct ScriptedSession {
    heads: DetectionHeads,
    delay: Duration,
    log: Arc<SessionLog>,
}

#[async_trait]
impl InferenceSession for ScriptedSession {
    async fn run(&mut self, input: InputTensor) -> VisionResult<DetectionHeads> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.first_red.lock().unwrap().push(input.plane(2)[0]);

        let pending = self.log.failures_left.load(Ordering::SeqCst);
        if pending > 0 {
            self.log.failures_left.store(pending - 1, Ordering::SeqCst);
            return Err(VisionError::inference_failed("scripted failure"));
        }
        Ok(self.heads.clone())
    }

    fn provider(&self) -> ExecutionTarget {
        ExecutionTarget::Cpu
    }
}

/// Runtime that hands out scripted sessions and the real detector.
pub struct ScriptedRuntime {
    pub backend: OnceInit,
    pub sessions: AtomicUsize,
    pub log: Arc<SessionLog>,
    heads: DetectionHeads,
    delay: Duration,
    fail_session: bool,
}

impl ScriptedRuntime {
    pub fn new(heads: DetectionHeads) -> Self {
        Self {
            backend: OnceInit::new(),
            sessions: AtomicUsize::new(0),
            log: Arc::new(SessionLog::default()),
            heads,
            delay: Duration::ZERO,
            fail_session: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_session = true;
        self
    }
}

#[async_trait]
impl ModelRuntime for ScriptedRuntime {
    async fn configure_backend(&self) -> VisionResult<bool> {
        self.backend.run(|| async { Ok(()) }).await
    }

    async fn create_session(&self) -> VisionResult<Box<dyn InferenceSession>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        if self.fail_session {
            return Err(VisionError::model_not_found("det_10g.onnx"));
        }
        Ok(Box::new(ScriptedSession {
            heads: self.heads.clone(),
            delay: self.delay,
            log: Arc::clone(&self.log),
        }))
    }

    async fn create_detector(&self) -> VisionResult<Box<dyn FaceDetector>> {
        Ok(Box::new(RetinaFaceDetector::new()))
    }
}

/// Heads with one confident anchor centred at (80, 80) on the stride-8 grid,
/// box distances of 16 px on every side and keypoints on the centre.
pub fn one_face_heads() -> DetectionHeads {
    let mut heads = DetectionHeads::zeroed(SIZE);
    let cells = (SIZE / 8) as usize;
    let k = (10 * cells + 10) * 2;
    heads.score_mut(0)[k] = 0.92;
    heads.bbox_mut(0)[k * 4..k * 4 + 4].copy_from_slice(&[2.0; 4]);
    heads
}

pub fn solid_image(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([rgb[0], rgb[1], rgb[2], 255]),
    ))
}

pub fn router(runtime: Arc<ScriptedRuntime>) -> CommandRouter {
    CommandRouter::new(SessionManager::new(runtime, Thresholds::default()))
}
