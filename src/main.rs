//! edge-pass: origin-hiding pass token services.
//!
//! One binary, two deployable roles connected only by the `x-cf-pass`
//! header contract and a pre-shared secret.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────┐          ┌──────────────────────┐
//!  Client          │   EDGE SERVICE    │          │     ORIGIN GATE      │
//!  ───────────────▶│ assign request id │─────────▶│ extract → freshness  │
//!                  │ mint pass token   │ x-cf-pass│ → replay → signature │
//!                  │ stamp + forward   │          │ → commit nonce       │
//!                  └──────────────────┘          └──────────┬───────────┘
//!                                                 allow     │    deny
//!                                                           ▼      │
//!                                                ┌──────────────┐  │ 403
//!                                                │ application  │  ▼
//!                                                │   upstream   │ (fixed
//!                                                └──────────────┘  body)
//! ```
//!
//! Cross-cutting concerns: TOML config with semantic validation, tracing,
//! Prometheus metrics, graceful shutdown, a TTL-swept in-memory nonce store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edge_pass::config::{load_config, ServiceConfig};
use edge_pass::http::{EdgeServer, OriginServer};
use edge_pass::lifecycle::Shutdown;
use edge_pass::noncestore::InMemoryNonceStore;
use edge_pass::observability::metrics;

#[derive(Parser)]
#[command(name = "edge-pass")]
#[command(about = "Origin-hiding pass token services", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "edge-pass.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the edge service (mints pass tokens, forwards toward origin)
    Edge,
    /// Run the origin gate (verifies pass tokens in front of the application)
    Origin,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    init_tracing(&config);
    tracing::info!("edge-pass v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        pass_enabled = config.pass.enabled,
        freshness_window_secs = config.pass.freshness_window_secs,
        nonce_ttl_secs = config.pass.nonce_ttl_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Arc::new(Shutdown::new());
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            trigger.trigger();
        }
    });

    match cli.command {
        Commands::Edge => {
            let server = EdgeServer::new(config)?;
            server.run(listener, shutdown.subscribe()).await?;
        }
        Commands::Origin => {
            let store = Arc::new(InMemoryNonceStore::new());
            let sweep_interval = Duration::from_secs(config.pass.sweep_interval_secs);
            tokio::spawn(
                store
                    .clone()
                    .run_sweeper(sweep_interval, shutdown.subscribe()),
            );

            let server = OriginServer::new(config, store)?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &ServiceConfig) {
    let default_filter = format!(
        "edge_pass={},tower_http=info",
        config.observability.log_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
