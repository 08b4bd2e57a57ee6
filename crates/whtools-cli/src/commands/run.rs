//! Run command implementation.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use whtools_core::{ArtifactSink, InboundProcessor, SessionListener};
use whtools_file::{DepositRelay, DirectoryWatch, FileArtifactSink, RequestRelay};
use whtools_net::SessionChannel;

use crate::config::{DEFAULT_CONFIG_FILE, WarehouseConfig};
use crate::output;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the client configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = WarehouseConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    info!(?config, "Loaded configuration");

    let (deposit_dir, deposit_settings) = config.deposit_settings()?;
    let tls = config.tls_settings().context("Failed to load trust bundle")?;

    let session = super::authenticate(&config, &tls).await?;

    let listener = response_listener(&config)?;
    let channel = Arc::new(SessionChannel::new(config.warehouse_url.clone(), tls));

    eprintln!(
        "{}",
        format!("Opening WebSocket to {}...", config.warehouse_url).dimmed()
    );
    channel
        .connect(&session, listener)
        .await
        .context("Failed to open warehouse session")?;
    output::success("Connected to warehouse");

    let request_watch = DirectoryWatch::new(&config.request_dir)
        .with_context(|| format!("Failed to watch {}", config.request_dir.display()))?;
    let deposit_watch = DirectoryWatch::new(&deposit_dir)
        .with_context(|| format!("Failed to watch {}", deposit_dir.display()))?;

    let cancel = CancellationToken::new();
    let requests = tokio::spawn(
        RequestRelay::new(request_watch, Arc::clone(&channel)).run(cancel.clone()),
    );
    let deposits = tokio::spawn(
        DepositRelay::new(deposit_watch, Arc::clone(&channel), deposit_settings)
            .run(cancel.clone()),
    );

    eprintln!("{}", "Press Ctrl+C to stop.".dimmed());

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")
        }
        () = channel.closed() => {
            warn!("Warehouse session closed");
            Err(anyhow::anyhow!("Warehouse session closed"))
        }
    };

    // Relays finish their current send before stopping.
    cancel.cancel();
    for relay in [requests, deposits] {
        if let Err(e) = relay.await {
            warn!(error = %e, "Relay task failed");
        }
    }
    channel.close().await;

    outcome?;
    output::success("Session closed");
    Ok(())
}

/// Build the listener that records responses according to `config`.
fn response_listener(config: &WarehouseConfig) -> Result<Box<dyn SessionListener>> {
    let settings = config.processor_settings();

    if !config.write_to_disk {
        return Ok(Box::new(InboundProcessor::new(settings, DiscardSink)));
    }

    let dir = config.response_dir();
    let sink = FileArtifactSink::create(dir)
        .with_context(|| format!("Failed to create response directory {}", dir.display()))?;
    info!(dir = %dir.display(), "Writing responses");

    Ok(Box::new(InboundProcessor::new(settings, sink)))
}

/// Sink for sessions that do not write responses.
struct DiscardSink;

impl ArtifactSink for DiscardSink {
    fn append_text(&mut self, _kind: &str, _text: &str) -> io::Result<()> {
        Ok(())
    }

    fn write_binary(&mut self, _kind: &str, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }
}
