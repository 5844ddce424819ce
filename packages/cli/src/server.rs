// ABOUTME: HTTP server bootstrap and maintenance commands
// ABOUTME: Opens the database, builds the router and serves it; ledger verification

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use tracing::{info, warn};

use stockboard_api::{create_router, DbState};
use stockboard_core::LoggingSink;
use stockboard_ledger::{LedgerStorage, LedgerVerification};
use stockboard_storage::connect;

use crate::config::Config;

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let pool = connect(&config.db_options())
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;

    let state = DbState::new(
        pool,
        Arc::new(LoggingSink),
        Duration::days(config.confirmation_ttl_days),
    );
    let app = create_router(state, &config.cors_origin);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!("Server listening on {}", addr);
    info!("CORS origin: {}", config.cors_origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Apply pending migrations and exit
pub async fn migrate(config: &Config) -> anyhow::Result<()> {
    let pool = connect(&config.db_options())
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    pool.close().await;

    info!("Database at {} is up to date", config.database_path.display());
    Ok(())
}

/// Replay every product's ledger against its recorded stock
pub async fn verify_ledger(config: &Config) -> anyhow::Result<Vec<LedgerVerification>> {
    let pool = connect(&config.db_options())
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;

    let results = LedgerStorage::new(pool.clone()).verify_all().await?;
    pool.close().await;

    let drifted = results.iter().filter(|r| !r.consistent).count();
    if drifted > 0 {
        warn!("{} of {} products disagree with their ledger", drifted, results.len());
    } else {
        info!("All {} products match their ledger", results.len());
    }

    Ok(results)
}
