//! Worker error types.

use anaface_models::ErrorKind;
use anaface_vision::VisionError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Worker is not ready (state: {0})")]
    NotReady(&'static str),

    #[error("Worker already initialized (state: {0})")]
    AlreadyInitialized(&'static str),

    #[error("Worker failed permanently: {0}")]
    Unusable(String),

    #[error("Unrecognized command: {0}")]
    UnknownCommand(String),

    #[error("Initialization failed: {0}")]
    InitFailed(String),

    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn unknown_command(msg: impl Into<String>) -> Self {
        Self::UnknownCommand(msg.into())
    }

    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitFailed(msg.into())
    }

    pub fn image_decode(msg: impl Into<String>) -> Self {
        Self::ImageDecode(msg.into())
    }

    pub fn channel_closed(msg: impl Into<String>) -> Self {
        Self::ChannelClosed(msg.into())
    }

    /// Failure class reported to the host.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::NotReady(_)
            | WorkerError::AlreadyInitialized(_)
            | WorkerError::UnknownCommand(_) => ErrorKind::Precondition,
            WorkerError::Vision(e) if e.is_surface_rejection() => ErrorKind::Precondition,
            WorkerError::Unusable(_) | WorkerError::InitFailed(_) => ErrorKind::Fatal,
            WorkerError::Vision(e) if e.is_bring_up() => ErrorKind::Fatal,
            WorkerError::ImageDecode(_) | WorkerError::Vision(_) | WorkerError::Io(_) => {
                ErrorKind::Inference
            }
            WorkerError::ChannelClosed(_) => ErrorKind::Fatal,
        }
    }

    /// Whether the worker can keep serving after this error.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}
