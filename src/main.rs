mod config;
mod error;
mod metrics;
mod routes;
mod services;

use crate::config::Config;
use crate::metrics::CollectionEngine;
use crate::routes::{health_check_route, metrics_route};
use crate::services::helpers::docker_helper::DockerInventory;

use clap::Parser;
use log::info;
use std::sync::Arc;
use warp::Filter;

/// Entry point for the exporter.
///
/// Connects to the local Docker daemon and starts the Warp server. The server listens
/// on every interface, port `9324` unless overridden by `--port` or
/// `CONTAINER_EXPORTER_PORT`, and provides the following routes:
/// - `/metrics` (GET): Container lifecycle state in the Prometheus text format.
/// - `/health` (GET): Simple health check of the exporter itself.
///
/// # Example
///
/// ```sh
/// # Scrape
/// curl http://127.0.0.1:9324/metrics
///
/// # Health check
/// curl http://127.0.0.1:9324/health
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    let inventory = DockerInventory::connect_with_local_defaults()?;
    let engine = Arc::new(CollectionEngine::new(Arc::new(inventory)));

    let api_routes = metrics_route(engine).or(health_check_route());

    let (addr, server) = warp::serve(api_routes)
        .try_bind_with_graceful_shutdown(config.listen_addr(), async {
            tokio::signal::ctrl_c().await.ok();
        })?;

    info!("🚀 Exporter running on http://{}/metrics", addr);

    server.await;

    info!("Exporter stopped");

    Ok(())
}
