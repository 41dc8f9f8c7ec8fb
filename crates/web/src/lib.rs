//! branchgate web server and REST API.
//!
//! Provides an Axum-based HTTP server with:
//! - Branch info, comparison and merge endpoints
//! - A health endpoint

pub mod api;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use branchgate_core::config::AppConfig;
use branchgate_core::{LocalBackend, RemoteBackend};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub remote: RemoteBackend,
    pub local: LocalBackend,
    /// Host that repository URLs must point at, e.g. `github.com`.
    pub repo_host: String,
}

impl AppState {
    pub fn new(config: &AppConfig, remote: RemoteBackend, local: LocalBackend) -> Self {
        Self {
            remote,
            local,
            repo_host: config.github.repo_host(),
        }
    }
}

/// Build the full application router with middleware attached.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(api::status::routes())
        .merge(api::branch::routes())
        .fallback(api::status::not_found)
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024)) // 2 MB max request body
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: &AppConfig, remote: RemoteBackend, local: LocalBackend) -> Self {
        Self {
            state: Arc::new(AppState::new(config, remote, local)),
        }
    }

    /// Start the web server, listening on the given address.
    ///
    /// Returns once `shutdown` resolves and in-flight requests have finished.
    pub async fn start<F>(self, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = build_router(self.state);

        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
