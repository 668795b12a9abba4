//! Web server module: the dashboard's read API.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::store::RemoteStore;
use crate::targets::TargetRegistry;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document the scheduler writes
    pub primary: RemoteStore,
    /// Independently configured read-only document
    pub fallback: Option<RemoteStore>,
    pub registry: TargetRegistry,
}

/// Web server for the dashboard.
pub struct Server {
    port: u16,
    static_dir: PathBuf,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            port: config.http_port,
            static_dir: config.static_dir.clone(),
            state,
        }
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = routes(self.state.clone(), &self.static_dir);

        tracing::info!("Dashboard server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Build the router with all routes.
pub fn routes(state: AppState, static_dir: &std::path::Path) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route("/api/data", get(handlers::handle_get_data))
        .route("/api/sites", get(handlers::handle_get_sites))
        .route("/health", get(handlers::handle_health))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
