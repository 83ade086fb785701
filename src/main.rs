//! Transparent API proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                    PROXY                      │
//!     Client Request   │  ┌────────┐   ┌─────────┐   ┌─────────────┐   │
//!     ─────────────────┼─▶│  http  │──▶│ headers │──▶│   rewrite   │   │
//!                      │  │ server │   │ filter  │   │ system[0]   │   │
//!                      │  └────────┘   └─────────┘   └──────┬──────┘   │
//!                      │                                    ▼          │
//!     Client Response  │  ┌────────┐   ┌─────────┐   ┌─────────────┐   │
//!     ◀────────────────┼──│ stream │◀──│ headers │◀──│  upstream   │◀──┼──── Upstream
//!                      │  │ relay  │   │ filter  │   │   client    │   │     API
//!                      │  └────────┘   └─────────┘   └─────────────┘   │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use transparent_proxy::config::loader::resolve_config;
use transparent_proxy::config::validation::config_warnings;
use transparent_proxy::http::HttpServer;
use transparent_proxy::lifecycle::signals::wait_for_signal;
use transparent_proxy::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "transparent-proxy")]
#[command(about = "Transparent forwarding proxy for an HTTP API", long_about = None)]
struct Args {
    /// TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides config and environment
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);

    tracing::info!("transparent-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    for warning in config_warnings(&config) {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        rewrite_enabled = config.rewrite.replacement().is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
