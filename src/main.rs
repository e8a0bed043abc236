//! Supermarket Health - status monitoring for the supermarket pricing API.
//!
//! Probes the public API on a schedule, stores every check, and serves
//! aggregated uptime and status data for the health dashboard.

mod config;
mod db;
mod health;
mod probe;
mod scheduler;
mod web;

use config::ServerConfig;
use db::Store;
use probe::Catalog;
use scheduler::Scheduler;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("supermarket_health=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting Supermarket Health on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);
    tracing::info!("Monitoring API at {}", cfg.api_url);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let catalog = Arc::new(Catalog::new(&cfg.api_url));
    let client = probe::build_client(cfg.probe_timeout(), &cfg.auth_token)?;

    // Create and start scheduler
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        catalog.clone(),
        client,
        cfg.probe_interval(),
        cfg.retention_days,
    ));
    scheduler.start().await;

    // Start web server
    let server = Server::new(cfg, store, catalog, scheduler);
    server.start().await?;

    Ok(())
}
