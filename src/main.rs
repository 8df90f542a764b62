//! Transcoding image relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                    IMAGE RELAY                        │
//!                        │                                                       │
//!   Client Request       │  ┌─────────┐    ┌───────────┐    ┌──────────────┐    │
//!   ─────────────────────┼─▶│  http   │───▶│ assembler │───▶│    origin    │────┼───▶ Origin
//!                        │  │ server  │    │           │    │   fetcher    │◀───┼──── Server
//!                        │  └─────────┘    └─────┬─────┘    └──────────────┘    │
//!                        │                       │                               │
//!                        │            ┌──────────┴──────────┐                    │
//!                        │            ▼                     ▼                    │
//!                        │   ┌─────────────────┐   ┌────────────────┐            │
//!   Client Response      │   │   transcode     │   │  bypass pipe   │            │
//!   ◀────────────────────┼───│ engine + codec  │   │ (origin body)  │            │
//!                        │   └─────────────────┘   └────────────────┘            │
//!                        │                                                       │
//!                        │   any failure ──▶ 302 to the original URL             │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use image_relay::lifecycle::{signals, startup};
use image_relay::observability::{logging, metrics};
use image_relay::{RelayServer, Shutdown};

#[derive(Parser)]
#[command(name = "image-relay")]
#[command(about = "Transcoding image relay", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = startup::resolve_config(cli.config.as_deref(), cli.bind.as_deref())?;

    logging::init(&config.observability.log_level);
    tracing::info!("image-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin_timeout_secs = config.origin.timeout_secs,
        max_redirects = config.origin.max_redirects,
        animate = config.transcode.animate,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = RelayServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
