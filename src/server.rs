use axum::{Json, Router, http::StatusCode, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{handlers, routes};
use crate::config::Config;
use crate::hub::{Hub, HubHandle};
use crate::state::AppState;
use crate::websocket::connection::MessageSink;
use crate::websocket::handler::ws_handler;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Owns the hub and the HTTP surface in front of it.
pub struct Server {
    config: Config,
    hub: Hub,
    state: Arc<AppState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let (hub, handle) = Hub::new();
        let state = Arc::new(AppState::new(handle, &config));
        Self { config, hub, state }
    }

    /// Like [`Server::new`], with a custom destination for application-level
    /// inbound messages.
    pub fn with_sink(config: Config, sink: Arc<dyn MessageSink>) -> Self {
        let (hub, handle) = Hub::new();
        let state = Arc::new(AppState::with_sink(handle, &config, sink));
        Self { config, hub, state }
    }

    /// Handle for registering connections, broadcasting, and shutdown.
    pub fn handle(&self) -> HubHandle {
        self.state.hub.clone()
    }

    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.config.port)).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener (lets tests bind port 0). Returns
    /// once the hub's shutdown signal has fired and both the HTTP server and
    /// the hub loop have wound down.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let Self { hub, state, .. } = self;
        let handle = state.hub.clone();
        let app = router(state);
        let hub_task = tokio::spawn(hub.run());

        info!(addr = %listener.local_addr()?, "listening");
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(handle.shutdown_token().cancelled_owned())
        .await?;

        // The hub performs its own orderly shutdown once the token fires.
        let _ = hub_task.await;
        Ok(())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .merge(routes::configure_api_routes(state.clone()))
        .fallback(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "NOT_FOUND" })),
            )
        })
        .with_state(state)
}
