//! Protocol decoding errors.

use thiserror::Error;

pub type ModelsResult<T> = Result<T, ModelsError>;

#[derive(Debug, Error)]
pub enum ModelsError {
    #[error("Empty command line")]
    EmptyCommand,

    #[error("Unknown or malformed command {raw:?}: {reason}")]
    UnknownCommand { raw: String, reason: String },

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}
