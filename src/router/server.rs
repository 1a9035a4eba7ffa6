//! Server bootstrap: `AppState`, the route table, middleware stack, and graceful
//! shutdown — adapted from the teacher's `ProxyServer`/`build_router` pattern.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use reqwest::Client;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::broadcaster::StateBroadcaster;
use crate::control::RebuildCoordinator;
use crate::error::{Error, Result};
use crate::metrics;
use crate::registry::Registry;
use crate::ring::Ring;
use crate::router::handlers;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn Registry>,
    pub ring: Arc<ArcSwap<Ring>>,
    pub coordinator: Arc<RebuildCoordinator>,
    pub broadcaster: Arc<StateBroadcaster>,
    pub http: Client,
}

pub struct LbServer {
    state: AppState,
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl LbServer {
    pub fn new(state: AppState, addr: SocketAddr, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            state,
            addr,
            shutdown_tx,
        }
    }

    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics::handler))
            .route("/trigger_rebuild", post(handlers::trigger_rebuild))
            .route("/_internal/state", get(handlers::internal_state))
            .route("/ws/state", get(handlers::ws_state))
            // matchit's dynamic segment can't match a zero-length path, so the
            // empty-key case needs its own explicit route to reach InvalidKey.
            .route("/", get(|| async { Error::InvalidKey.into_response() }))
            .route("/:key", get(handlers::route_key))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive())
                    .layer(CompressionLayer::new())
                    .layer(TimeoutLayer::new(Duration::from_secs(30))),
            )
            .with_state(self.state.clone())
    }

    pub async fn run(self) -> Result<()> {
        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| crate::error::Error::Config(format!("failed to bind {}: {e}", self.addr)))?;

        info!(addr = %self.addr, "load balancer listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("graceful shutdown initiated");
            })
            .await
            .map_err(|e| crate::error::Error::Config(format!("server error: {e}")))?;

        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
