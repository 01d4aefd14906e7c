#![deny(unreachable_patterns)]
//! Face detection pipeline.
//!
//! This crate provides:
//! - Aspect-preserving letterboxing onto a fixed square surface
//! - Planar BGR tensor encoding for the detection network
//! - ONNX Runtime sessions with prioritized execution providers
//! - RetinaFace head decoding with NMS
//! - Mapping of detections into relative coordinates

pub mod backend;
pub mod error;
pub mod face;
pub mod letterbox;
pub mod mapping;
pub mod model_config;
pub mod pipeline;
pub mod retinaface;
pub mod runtime;
pub mod scale;
pub mod session;
pub mod stage;
pub mod surface;
pub mod tensor;

pub use backend::{backend_configure_runs, configure_backend, ExecutionTarget, OnceInit};
pub use error::{VisionError, VisionResult};
pub use face::{AbsoluteFace, RelativeFace};
pub use letterbox::FrameProcessor;
pub use mapping::CoordinateMapper;
pub use model_config::{is_model_available, ModelConfig};
pub use pipeline::{FacePipeline, Thresholds};
pub use retinaface::{DetectParams, DetectionHeads, FaceDetector, RetinaFaceDetector};
pub use runtime::{ModelRuntime, OrtRuntime};
pub use scale::{ScaleInfo, ScaleTracker, DEFAULT_SURFACE_SIZE};
pub use session::{InferenceSession, OrtSession};
pub use surface::{check_dimensions, Surface, MAX_SURFACE_SIDE};
pub use tensor::{InputTensor, TensorEncoder};
