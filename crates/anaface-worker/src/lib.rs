//! Face detection worker.
//!
//! This crate provides:
//! - The worker state machine and command router actor
//! - Concurrent bring-up of the inference session and detector
//! - Translation of JSON-lines protocol input into commands
//! - Logging and metrics for command handling

pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod router;
pub mod session_manager;
pub mod state;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::CommandLogger;
pub use router::{spawn, Command, CommandRouter, WorkerHandle};
pub use session_manager::SessionManager;
pub use state::WorkerState;
