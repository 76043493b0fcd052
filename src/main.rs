//! Invoicing API Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                    API GATEWAY                       │
//!                         │                                                      │
//!     Client Request      │  ┌─────────┐    ┌──────────┐    ┌────────────────┐   │
//!     ────────────────────┼─▶│  http   │───▶│ identity │───▶│ proxy forwarder│───┼──▶ customer
//!                         │  │ server  │    │  check   │    │  / aggregation │───┼──▶ invoice
//!                         │  └─────────┘    └──────────┘    └───────┬────────┘───┼──▶ audit
//!                         │                                         │            │
//!                         │                          ┌──────────────▼─────────┐  │
//!                         │                          │ resilient client       │  │
//!                         │                          │ retry → breaker →      │  │
//!                         │                          │ deadline → hyper       │  │
//!                         │                          └────────────────────────┘  │
//!                         │                                                      │
//!                         │  config · registry · health · observability ·        │
//!                         │  lifecycle                                           │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use invoicing_gateway::config::{load_or_default, validation::validate_config, ConfigError};
use invoicing_gateway::lifecycle::{shutdown_signal, Shutdown};
use invoicing_gateway::observability::{logging, metrics};
use invoicing_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "invoicing-gateway")]
#[command(about = "Resilient API gateway for the invoicing services", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_tracing(&config.observability);
    tracing::info!("invoicing-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = ?config.services.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.trigger();
    });

    server.run(listener, receiver).await?;

    if shutdown.is_triggered() {
        tracing::info!("Shutdown complete");
    } else {
        tracing::warn!("Server stopped without a shutdown signal");
    }
    Ok(())
}
