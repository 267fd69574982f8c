//! Motion Relay (motion-relay) - Main entry point
//!
//! Reads proximity-tag telemetry from a serial scanner, debounces each tag's
//! motion flag and republishes changes over SSE and UDP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use motion_common::RelayConfig;
use motion_relay::{api, ingest, logging, ChangeDispatcher, SharedState, UdpNotifier};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Command-line arguments for motion-relay
#[derive(Parser, Debug)]
#[command(name = "motion-relay")]
#[command(about = "Proximity-tag motion relay")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MOTION_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Scanner serial port
    #[arg(short, long, env = "MOTION_RELAY_SERIAL_PORT")]
    serial_port: Option<String>,

    /// Scanner baud rate
    #[arg(short, long)]
    baud_rate: Option<u32>,

    /// HTTP port to listen on
    #[arg(short, long, env = "MOTION_RELAY_PORT")]
    port: Option<u16>,

    /// UDP destination for change notifications (host:port)
    #[arg(short, long, env = "MOTION_RELAY_UDP_DESTINATION")]
    udp_destination: Option<String>,

    /// Seconds a tag stays "moving" after its motion flag clears
    #[arg(long)]
    still_threshold: Option<f64>,
}

impl Args {
    fn apply(self, config: &mut RelayConfig) {
        if let Some(port) = self.serial_port {
            config.serial.port = port;
        }
        if let Some(baud) = self.baud_rate {
            config.serial.baud_rate = baud;
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(destination) = self.udp_destination {
            config.notify.udp_destination = destination;
        }
        if let Some(secs) = self.still_threshold {
            config.debounce.still_threshold_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Before config loading so its messages are not lost
    let log_control = logging::init();

    info!(
        "Starting Motion Relay v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = RelayConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    log_control.apply_config_level(&config.logging);

    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        "Serial {} @ {} baud, still threshold {:.1}s, UDP to {}",
        config.serial.port,
        config.serial.baud_rate,
        config.debounce.still_threshold_secs,
        config.notify.udp_destination
    );

    let still_threshold = config.debounce.still_threshold().context("Invalid configuration")?;
    let state = Arc::new(SharedState::new(still_threshold));

    // Everything fallible happens before any task holds a shutdown receiver
    let udp = UdpNotifier::bind(config.notify.udp_destination.clone())
        .await
        .context("Failed to bind UDP socket")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Ingest task: blocking serial reads
    let ingest_task = {
        let state = Arc::clone(&state);
        let serial = config.serial.clone();
        let framing = config.framing.clone();
        let shutdown = shutdown_rx.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = ingest::run(&serial, &framing, state, shutdown) {
                error!("Serial ingest terminated: {}", e);
            }
        })
    };

    // Dispatch task
    let dispatcher = ChangeDispatcher::new(Arc::clone(&state), udp, config.dispatch.poll_interval());
    let dispatch_task = tokio::spawn(dispatcher.run(shutdown_rx));

    // Serving task runs on this one
    let served = api::run(&config.http.bind_addr, config.http.port, state, shutdown_signal()).await;

    // Background tasks stop whether the server exited cleanly or not
    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatch_task.await {
        warn!("Dispatch task ended abnormally: {}", e);
    }
    // Returns within one serial read timeout
    if let Err(e) = ingest_task.await {
        warn!("Ingest task ended abnormally: {}", e);
    }

    served.context("HTTP server failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
