//! Face detection worker binary.
//!
//! Reads one JSON command per stdin line and writes one JSON reply per stdout
//! line, in the same order.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

use anaface_vision::OrtRuntime;
use anaface_worker::host::command_from_line;
use anaface_worker::logging::init_tracing;
use anaface_worker::metrics::init_metrics;
use anaface_worker::{spawn, CommandRouter, SessionManager, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    info!("Starting anaface-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        init_metrics(addr)?;
        info!(%addr, "Prometheus exporter listening");
    }

    let runtime = Arc::new(OrtRuntime::new(config.model_config()));
    let router = CommandRouter::new(SessionManager::new(runtime, config.thresholds()));
    let (commands, mut replies, router_task) = spawn(router, config.queue_capacity).into_parts();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(reply) = replies.recv().await {
            let line = reply.to_line().context("Failed to encode reply")?;
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        anyhow::Ok(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let Some(command) = command_from_line(&line, config.surface_size).await else {
            continue;
        };
        if commands.send(command).await.is_err() {
            error!("Router stopped, dropping remaining input");
            break;
        }
    }

    info!("Input closed, draining worker");
    drop(commands);
    router_task.await.context("Router task failed")?;
    writer.await.context("Writer task failed")??;

    info!("anaface-worker stopped");
    Ok(())
}
