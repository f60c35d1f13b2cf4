use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod config;
mod dashboard;
mod lines;

use config::Config;
use dashboard::AppState;
use lines::{AffiliationTable, LinesCache, LinesSource, PredictionTracker};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let affiliations = AffiliationTable::load(&config.affiliation_path)?;
    if affiliations.is_empty() {
        anyhow::bail!("affiliation table {} has no rows", config.affiliation_path);
    }

    let source: Arc<dyn LinesSource> = Arc::new(PredictionTracker::new(
        &config.lines_url,
        &config.updated_url,
        config.http_timeout(),
    )?);
    info!(
        "Lines source: {} ({}), cache TTL {:?}",
        source.name(),
        config.lines_url,
        config.cache_ttl()
    );

    let cache = LinesCache::new(
        source,
        affiliations,
        config.cache_ttl(),
        config.fetch_last_updated,
    );

    let app = dashboard::router(AppState { cache });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard on {}", addr))?;
    info!("Dashboard listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
