//! The worker's single message-driven entry point.
//!
//! One task consumes commands in arrival order and answers each with exactly
//! one reply. A command arriving while another is in flight waits in the
//! channel; nothing is cancelled or coalesced.

use std::time::Instant;

use anaface_models::{FaceRecord, Reply};
use anaface_vision::{FacePipeline, Surface, VisionError};
use image::DynamicImage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::CommandLogger;
use crate::metrics;
use crate::session_manager::SessionManager;
use crate::state::WorkerState;

/// A command as the router sees it. Payloads are moved in.
pub enum Command {
    /// Take ownership of the surface and bring up the pipeline.
    Init { surface: Surface },
    /// An init whose surface was refused before allocation.
    RejectedInit {
        width: u32,
        height: u32,
        error: VisionError,
    },
    /// Detect faces in a decoded image.
    Analyze { image: DynamicImage },
    /// An analyze request whose image could not be decoded.
    Undecodable { source: String, reason: String },
    /// Input that is not a known command.
    Unrecognized { raw: String, reason: String },
}

impl Command {
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Init { .. } | Command::RejectedInit { .. } => "init",
            Command::Analyze { .. } | Command::Undecodable { .. } => "analyze",
            Command::Unrecognized { .. } => "unrecognized",
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Init { surface } => f
                .debug_struct("Init")
                .field("width", &surface.width())
                .field("height", &surface.height())
                .finish(),
            Command::RejectedInit {
                width,
                height,
                error,
            } => f
                .debug_struct("RejectedInit")
                .field("width", width)
                .field("height", height)
                .field("error", error)
                .finish(),
            Command::Analyze { image } => f
                .debug_struct("Analyze")
                .field("width", &image.width())
                .field("height", &image.height())
                .finish(),
            Command::Undecodable { source, reason } => f
                .debug_struct("Undecodable")
                .field("source", source)
                .field("reason", reason)
                .finish(),
            Command::Unrecognized { raw, reason } => f
                .debug_struct("Unrecognized")
                .field("raw", raw)
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Sequences `init` and `analyze` against the worker state.
#[derive(Debug)]
pub struct CommandRouter {
    state: WorkerState,
    sessions: SessionManager,
    seq: u64,
}

impl CommandRouter {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            state: WorkerState::Uninitialized,
            sessions,
            seq: 0,
        }
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Handle one command. Never fails; errors become error replies.
    pub async fn handle(&mut self, command: Command) -> Reply {
        self.seq += 1;
        let logger = CommandLogger::new(self.seq, command.tag());
        let span = logger.create_span();
        let start = Instant::now();

        async {
            logger.log_start();
            let tag = command.tag();
            let reply = match self.dispatch(command).await {
                Ok(reply) => reply,
                Err(e) => {
                    let kind = e.kind();
                    logger.log_rejected(kind.as_str(), &e.to_string());
                    metrics::record_error(tag, kind);
                    Reply::error(kind, e.to_string())
                }
            };

            let elapsed = start.elapsed().as_secs_f64();
            logger.log_reply(reply.tag(), elapsed * 1000.0);
            metrics::record_command(tag, reply.tag(), elapsed);
            reply
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&mut self, command: Command) -> WorkerResult<Reply> {
        match command {
            Command::Init { surface } => self.init(surface).await,
            Command::RejectedInit { error, .. } => {
                self.check_can_init()?;
                Err(self.fail_init(WorkerError::from(error)))
            }
            Command::Analyze { image } => self.analyze(image).await,
            Command::Undecodable { source, reason } => {
                self.require_ready()?;
                Err(WorkerError::image_decode(format!("{}: {}", source, reason)))
            }
            Command::Unrecognized { raw, reason } => {
                Err(WorkerError::unknown_command(format!("{} ({})", raw, reason)))
            }
        }
    }

    /// Only an uninitialized worker accepts `init`.
    fn check_can_init(&self) -> WorkerResult<()> {
        match &self.state {
            WorkerState::Uninitialized => Ok(()),
            WorkerState::Failed(reason) => Err(WorkerError::Unusable(reason.clone())),
            other => Err(WorkerError::AlreadyInitialized(other.name())),
        }
    }

    /// Move to `Failed` and hand the error back for the reply.
    fn fail_init(&mut self, err: WorkerError) -> WorkerError {
        self.state = WorkerState::Failed(err.to_string());
        metrics::set_ready(false);
        err
    }

    async fn init(&mut self, surface: Surface) -> WorkerResult<Reply> {
        self.check_can_init()?;

        // Nothing is brought up for a surface that can never be analyzed.
        if let Err(e) = surface.validate() {
            return Err(self.fail_init(WorkerError::from(e)));
        }

        self.state = WorkerState::Initializing;
        match self.sessions.bring_up(surface).await {
            Ok(pipeline) => {
                self.state = WorkerState::Ready(pipeline);
                metrics::set_ready(true);
                Ok(Reply::Ready)
            }
            Err(e) => {
                let err = if e.is_fatal() {
                    e
                } else {
                    WorkerError::init_failed(e.to_string())
                };
                Err(self.fail_init(err))
            }
        }
    }

    async fn analyze(&mut self, image: DynamicImage) -> WorkerResult<Reply> {
        let pipeline = self.require_ready()?;
        let faces = pipeline.analyze(image).await?;
        debug!(faces = faces.len(), "Faces detected");
        metrics::record_faces(faces.len());
        Ok(Reply::faces(faces.into_iter().map(FaceRecord::from).collect()))
    }

    fn require_ready(&mut self) -> WorkerResult<&mut FacePipeline> {
        let name = self.state.name();
        self.state
            .pipeline_mut()
            .ok_or(WorkerError::NotReady(name))
    }

    /// Consume `commands` until the channel closes or the reply side is dropped.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>, replies: mpsc::Sender<Reply>) {
        while let Some(command) = commands.recv().await {
            let reply = self.handle(command).await;
            if replies.send(reply).await.is_err() {
                debug!("Reply channel closed, stopping router");
                break;
            }
        }
        debug!(state = self.state.name(), handled = self.seq, "Router stopped");
    }
}

/// Host-side handle to a running router task.
#[derive(Debug)]
pub struct WorkerHandle {
    commands: mpsc::Sender<Command>,
    replies: mpsc::Receiver<Reply>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Queue a command. Ownership of its payload moves to the worker.
    pub async fn send(&self, command: Command) -> WorkerResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| WorkerError::channel_closed("worker command channel"))
    }

    /// Next reply, in command order.
    pub async fn recv(&mut self) -> Option<Reply> {
        self.replies.recv().await
    }

    /// Send one command and wait for its reply.
    pub async fn request(&mut self, command: Command) -> WorkerResult<Reply> {
        self.send(command).await?;
        self.recv()
            .await
            .ok_or_else(|| WorkerError::channel_closed("worker reply channel"))
    }

    /// A sender for producers running on other tasks.
    pub fn sender(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Split into the sender, the reply stream and the router task.
    pub fn into_parts(self) -> (mpsc::Sender<Command>, mpsc::Receiver<Reply>, JoinHandle<()>) {
        (self.commands, self.replies, self.task)
    }

    /// Close the command channel and wait for the router to drain.
    pub async fn shutdown(self) -> WorkerResult<()> {
        drop(self.commands);
        self.task
            .await
            .map_err(|e| WorkerError::channel_closed(format!("router task: {e}")))
    }
}

/// Spawn `router` on its own task with channels of `capacity`.
pub fn spawn(router: CommandRouter, capacity: usize) -> WorkerHandle {
    let (command_tx, command_rx) = mpsc::channel(capacity.max(1));
    let (reply_tx, reply_rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(router.run(command_rx, reply_tx));
    WorkerHandle {
        commands: command_tx,
        replies: reply_rx,
        task,
    }
}
