//! engaged - engagement write-back daemon.
//!
//! Owns the flush workers and the presence sweeper, and drains buffered
//! toggles on shutdown.

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engage_engine::{Engine, EngineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,engage=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting engaged");

    let config = EngineConfig::from_env();
    config.validate()?;

    tracing::info!(
        data_dir = %config.data_dir,
        redis_configured = %config.redis_url.is_some(),
        quiet_window_ms = config.quiet_window.as_millis(),
        flush_workers = config.flush_workers,
        sweep_interval = ?config.sweep_interval,
        "Engine configuration loaded"
    );

    let engine = Engine::connect(config.clone()).await?;
    engine.recover().await?;

    if let Some(period) = config.sweep_interval {
        let presence = engine.presence.clone();
        let threshold = config.presence_threshold;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = presence.sweep(threshold, Utc::now()).await {
                    tracing::warn!(error = %e, "Presence sweep failed");
                }
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    match tokio::time::timeout(config.drain_timeout, engine.shutdown()).await {
        Ok(result) => result?,
        Err(_) => tracing::error!(
            timeout_secs = config.drain_timeout.as_secs(),
            "Drain timed out; unflushed toggles remain in the fast store"
        ),
    }

    Ok(())
}
