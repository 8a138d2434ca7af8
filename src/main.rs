//! HTTP ingress adapter (v1)
//!
//! Edge stage of a message-passing pipeline.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                 HTTP INGRESS                 │
//!                     │                                              │
//!   Client Request    │  ┌──────────┐   ┌────────────┐               │
//!   ──────────────────┼─▶│   net    │──▶│    http    │──request port─┼──▶ Downstream
//!                     │  │ listener │   │ connection │               │     stage(s)
//!                     │  └──────────┘   └────────────┘               │
//!                     │        │              ▲                      │
//!                     │        ▼              │                      │
//!                     │  ┌──────────────┐  ┌──┴─────────┐            │
//!                     │  │ connection   │◀─│   server   │◀─response──┼─── Downstream
//!   Client Response   │  │    table     │  │  routing   │    port    │
//!   ◀─────────────────┼──┴──────────────┘  └────────────┘            │
//!                     └──────────────────────────────────────────────┘
//! ```
//!
//! The binary wires the echo stage in as the downstream so the adapter can be
//! exercised standalone.

use std::path::PathBuf;

use clap::Parser;

use http_ingress::config::{self, IngressConfig};
use http_ingress::lifecycle::Shutdown;
use http_ingress::observability::{logging, metrics};
use http_ingress::pipeline::{self, EchoStage};
use http_ingress::IngressServer;

#[derive(Parser)]
#[command(name = "http-ingress")]
#[command(about = "HTTP ingress adapter for a message pipeline", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.listen`.
    #[arg(short, long)]
    listen: Option<String>,

    /// Override `listener.port`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => IngressConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listener.listen = listen;
    }
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    config::validation::validate_config(&config).map_err(config::ConfigError::Validation)?;

    logging::init(&config.observability)?;
    tracing::info!("http-ingress v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        listen = %config.listener.listen,
        port = config.listener.port,
        max_connections = config.listener.max_connections,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let (request_port, requests) = pipeline::channel();
    let (response_port, responses) = pipeline::channel();
    tokio::spawn(EchoStage::new(requests, response_port).run());

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    let server = IngressServer::configure(config, request_port);
    server.run(responses, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
