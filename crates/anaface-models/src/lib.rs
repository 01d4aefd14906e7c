//! Wire types for the anaface detection worker.
//!
//! This crate provides Serde-serializable types for:
//! - The host command envelope (`init`, `analyze`)
//! - The reply envelope (`ready`, `faces`, `error`)
//! - Face records with relative bounding boxes

pub mod error;
pub mod face;
pub mod protocol;

pub use error::{ModelsError, ModelsResult};
pub use face::{FaceRecord, RelativeBbox, KEYPOINT_COUNT};
pub use protocol::{ErrorKind, Reply, WireCommand};
