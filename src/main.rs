//! Sweet Forge Engine Process
//!
//! Headless engine service: loads the catalog and the last snapshot, runs
//! the accrual ticker and the autosave loop, and writes one final snapshot
//! on shutdown. The interaction layer (slash commands, clicks) connects to
//! the [`Engine`] entry points; this binary just keeps the simulation alive.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use sweet_forge::{Catalog, Engine, EngineConfig, StoredHandleResolver, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Sweet Forge v{}", VERSION);

    let config = EngineConfig::from_env();
    info!(
        save_path = %config.save_path.display(),
        tick_secs = config.tick_interval.as_secs(),
        autosave_secs = config.autosave_interval.as_secs(),
        "configuration loaded"
    );

    // The only fatal startup condition: the engine never runs with a
    // partial catalog.
    let catalog = Catalog::load().context("failed to load item catalog")?;

    let engine = Arc::new(Engine::new(catalog, config));

    let restored = engine.load(&StoredHandleResolver, Utc::now()).await;
    info!(games = restored, "registry loaded");

    let (ticker, autosaver) = Arc::clone(&engine).spawn_background_tasks();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    ticker.abort();
    autosaver.abort();
    engine.shutdown().await;

    Ok(())
}
