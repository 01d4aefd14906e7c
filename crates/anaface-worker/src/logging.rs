//! Structured command logging.
//!
//! Logs go to stderr; stdout carries the reply protocol.

use tracing::{debug, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. JSON when `LOG_FORMAT=json`, ANSI text otherwise.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("anaface=info,anaface_vision=info,anaface_worker=info,ort=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Per-command logger carrying the sequence number and command tag.
#[derive(Debug, Clone)]
pub struct CommandLogger {
    seq: u64,
    command: &'static str,
}

impl CommandLogger {
    pub fn new(seq: u64, command: &'static str) -> Self {
        Self { seq, command }
    }

    pub fn log_start(&self) {
        debug!(seq = self.seq, command = self.command, "Command received");
    }

    pub fn log_reply(&self, reply: &'static str, elapsed_ms: f64) {
        info!(
            seq = self.seq,
            command = self.command,
            reply,
            elapsed_ms,
            "Command handled"
        );
    }

    pub fn log_rejected(&self, kind: &str, message: &str) {
        warn!(
            seq = self.seq,
            command = self.command,
            kind,
            "Command rejected: {}", message
        );
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn command(&self) -> &'static str {
        self.command
    }

    /// Span covering the handling of this command.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("command", seq = self.seq, command = self.command)
    }
}
