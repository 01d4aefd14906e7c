//! Host/worker message envelopes.
//!
//! Commands flow host → worker tagged by `cmd`, replies flow worker → host
//! tagged by `what`. Every command produces exactly one reply.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelsError, ModelsResult};
use crate::face::FaceRecord;

/// Command envelope as it arrives on the wire.
///
/// Payloads that cannot cross a text boundary (the surface, decoded images)
/// are described here and materialized by the host before routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum WireCommand {
    /// Allocate the rendering surface and bring up the backend.
    /// Missing dimensions fall back to the configured square size.
    Init {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
    },
    /// Detect faces in the image file at `path`.
    Analyze { path: String },
}

impl WireCommand {
    /// Decode one protocol line.
    pub fn parse(line: &str) -> ModelsResult<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ModelsError::EmptyCommand);
        }
        serde_json::from_str(trimmed).map_err(|e| ModelsError::UnknownCommand {
            raw: trimmed.to_string(),
            reason: e.to_string(),
        })
    }

    /// Protocol tag of this command.
    pub fn tag(&self) -> &'static str {
        match self {
            WireCommand::Init { .. } => "init",
            WireCommand::Analyze { .. } => "analyze",
        }
    }
}

/// Failure class reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller broke the protocol: non-square surface, analyze before ready,
    /// repeated init, unknown command.
    Precondition,
    /// Backend or detector bring-up failed; the worker is permanently unusable.
    Fatal,
    /// A single analyze call failed; the worker stays ready.
    Inference,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Inference => "inference",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reply envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "what", rename_all = "snake_case")]
pub enum Reply {
    /// Backend and detector are up; `analyze` may be sent.
    Ready,
    /// Faces found in the last analyzed image, best score first.
    Faces { faces: Vec<FaceRecord> },
    /// The command could not be served.
    Error { kind: ErrorKind, message: String },
}

impl Reply {
    /// Create a faces reply.
    pub fn faces(faces: Vec<FaceRecord>) -> Self {
        Reply::Faces { faces }
    }

    /// Create an error reply.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Reply::Error {
            kind,
            message: message.into(),
        }
    }

    /// Protocol tag of this reply.
    pub fn tag(&self) -> &'static str {
        match self {
            Reply::Ready => "ready",
            Reply::Faces { .. } => "faces",
            Reply::Error { .. } => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }

    /// Serialize as a single protocol line (no trailing newline).
    pub fn to_line(&self) -> ModelsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
