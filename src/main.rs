//! vhost-gateway
//!
//! Serves many static sites from one process, proxies configured hosts and
//! path prefixes (HTTP and WebSocket) to upstreams, and keeps a pull-through
//! file cache fresh in the background.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌────────┐   ┌──────────────┐   ┌────────────────────┐
//!     ───────────────────▶│  net   │──▶│ http server  │──▶│ proxy dispatcher   │──▶ Upstream
//!                         │listener│   │ (axum/hyper) │   │ (HTTP / WebSocket) │    (ws/http)
//!                         └────────┘   └──────┬───────┘   └────────────────────┘
//!                                             │ no route
//!                                             ▼
//!                                      ┌──────────────┐   ┌────────────────────┐
//!                                      │ redirect or  │──▶│ vhost resolver +   │
//!                                      │ static files │   │ existence cache    │
//!                                      └──────┬───────┘   └────────────────────┘
//!                                             │ /cache/
//!                                             ▼
//!                                      ┌──────────────┐
//!                                      │ cache/ dir   │◀── refresh worker (background)
//!                                      └──────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use vhost_gateway::config::load_config;
use vhost_gateway::lifecycle::{self, signals, update_check, Shutdown};
use vhost_gateway::net::client_config;
use vhost_gateway::observability::{logging, metrics};
use vhost_gateway::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "vhost-gateway", version, about = "Multi-site static server and reverse proxy")]
struct Args {
    /// Configuration file.
    #[arg(short, long, default_value = "conf.toml")]
    config: PathBuf,

    /// Server root, overriding `server.root` from the configuration.
    #[arg(short, long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(root) = args.root {
        config.server.root = root.display().to_string();
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = %args.config.display(), "vhost-gateway starting");

    let lifecycle::Prepared { config, tls } = lifecycle::prepare(config)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    if config.update_check.enabled {
        let check = config.update_check.clone();
        let client_tls = client_config()?;
        tokio::spawn(async move {
            update_check::check(check, client_tls).await;
        });
    }

    let server = HttpServer::new(&config)?;
    let listeners = lifecycle::bind_listeners(&config, tls).await?;

    let shutdown = Shutdown::new();
    let mut stopped = shutdown.subscribe();
    let serving = tokio::spawn(server.run(listeners.plain, listeners.secure, shutdown.clone()));

    tokio::select! {
        _ = signals::wait_for_shutdown_signal() => shutdown.trigger(),
        _ = stopped.recv() => {}
    }

    serving.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}

