//! cdnroute traffic router
//!
//! Loads the configuration and coverage zones, starts the topology and health
//! pollers, and serves redirects until interrupted.

#![deny(missing_docs)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cdnroute_core::{HealthDocument, RoutingTable, TopologyDocument};
use cdnroute_server::config::Config;
use cdnroute_server::coverage_zone::CoverageZones;
use cdnroute_server::fetcher;
use cdnroute_server::poller::Poller;
use cdnroute_server::router::RequestRouter;
use cdnroute_server::server;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "cdnroute")]
#[command(about = "Redirect HTTP clients to the nearest available cache", long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long)]
    config: PathBuf,

    /// Listen address, overriding the configuration file
    #[arg(long)]
    listen: Option<SocketAddr>,
}

/// The primary entrypoint for the cdnroute traffic router.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    info!(config = %args.config.display(), "Starting cdnroute");

    let zones = CoverageZones::load(&config.coverage_zone_path).await?;
    let table = Arc::new(RoutingTable::new());
    let shutdown = CancellationToken::new();

    let topology_fetcher =
        fetcher::from_sources(&config.topology_sources, config.fetch_timeout(), &config.user_agent)?;
    let health_fetcher =
        fetcher::from_sources(&config.health_sources, config.fetch_timeout(), &config.user_agent)?;

    let topology_poller: Poller<TopologyDocument> =
        Poller::new(topology_fetcher, table.clone(), config.topology_poll_interval());
    let health_poller: Poller<HealthDocument> =
        Poller::new(health_fetcher, table.clone(), config.health_poll_interval());
    let pollers = [
        topology_poller.spawn(shutdown.clone()),
        health_poller.spawn(shutdown.clone()),
    ];

    let router = Arc::new(RequestRouter::new(table, Arc::new(zones), config.default_position));
    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            return;
        }
        info!("Received ctrl-c");
        signal.cancel();
    });

    server::serve(listener, router, shutdown).await;

    for poller in pollers {
        if let Err(e) = poller.await {
            error!(error = %e, "Poller task failed");
        }
    }

    info!("Shut down gracefully");
    Ok(())
}
