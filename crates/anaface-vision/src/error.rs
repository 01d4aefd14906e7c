//! Error types for the detection pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur while bringing up or running the pipeline.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Surface must be square, got {width}x{height}")]
    NonSquareSurface { width: u32, height: u32 },

    #[error("Invalid surface: {0}")]
    InvalidSurface(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to read model {path}: {source}")]
    ModelRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend initialization failed: {0}")]
    BackendInit(String),

    #[error("Session creation failed: {0}")]
    SessionCreate(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Face detection failed: {0}")]
    DetectionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VisionError {
    /// Create an invalid surface error.
    pub fn invalid_surface(message: impl Into<String>) -> Self {
        Self::InvalidSurface(message.into())
    }

    /// Create an invalid image error.
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create a backend initialization error.
    pub fn backend_init(message: impl Into<String>) -> Self {
        Self::BackendInit(message.into())
    }

    /// Create a session creation error.
    pub fn session_create(message: impl Into<String>) -> Self {
        Self::SessionCreate(message.into())
    }

    /// Create an inference failure error.
    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::InferenceFailed(message.into())
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the surface handed to `init` was unusable.
    pub fn is_surface_rejection(&self) -> bool {
        matches!(
            self,
            VisionError::NonSquareSurface { .. } | VisionError::InvalidSurface(_)
        )
    }

    /// Whether this error can only come from bringing the pipeline up.
    pub fn is_bring_up(&self) -> bool {
        matches!(
            self,
            VisionError::ModelNotFound(_)
                | VisionError::ModelRead { .. }
                | VisionError::BackendInit(_)
                | VisionError::SessionCreate(_)
        )
    }
}
