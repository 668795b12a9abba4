//! uptrail - HTTP availability monitor.
//!
//! Probes a list of endpoints every minute and keeps the samples in a JSON
//! document in a GitHub repository, served to a static dashboard.

mod config;
mod probe;
mod scheduler;
mod store;
mod targets;
mod web;

#[cfg(test)]
mod testing;

use config::ServerConfig;
use scheduler::Scheduler;
use store::RemoteStore;
use targets::TargetRegistry;
use web::{AppState, Server};

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("uptrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load()?;
    tracing::info!(
        "Starting uptrail ({:?}) for {}/{} on branch {}",
        cfg.mode,
        cfg.store.repo,
        cfg.store.path,
        cfg.store.branch
    );
    if cfg.store.token.is_none() {
        tracing::warn!("GITHUB_TOKEN is not set; writes will be rejected by the API");
    }

    let registry = TargetRegistry::from_config(&cfg);
    match registry.load() {
        Ok(targets) => tracing::info!("Monitoring {} targets", targets.len()),
        Err(e) => tracing::warn!("Target list is not usable yet: {}", e),
    }

    let store = RemoteStore::new(cfg.store.clone())?;

    let scheduler = if cfg.mode.runs_monitor() {
        let scheduler = Arc::new(Scheduler::new(&cfg, registry.clone(), store.clone())?);
        let handle = scheduler.start().await;
        Some((scheduler, handle))
    } else {
        None
    };

    if cfg.mode.runs_server() {
        let fallback = cfg.fallback_store().map(RemoteStore::new).transpose()?;
        let state = AppState {
            primary: store,
            fallback,
            registry,
        };
        let server = Server::new(&cfg, state);
        tokio::select! {
            result = server.start() => result?,
            _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
        }
    } else {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");
    }

    if let Some((scheduler, handle)) = scheduler {
        let grace = cfg.probe_timeout + Duration::from_secs(30);
        scheduler.shutdown(handle, grace).await;
    }

    Ok(())
}
