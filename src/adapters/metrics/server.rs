//! Feed Server - Snapshot, Control and Health Endpoints
//!
//! Serves, via axum 0.7:
//! - `GET  /live`     liveness probe, 200 while the process runs
//! - `GET  /ready`    readiness probe, 503 once the feed is torn down
//! - `GET  /snapshot` JSON `FeedSnapshot` for the rendering layer
//! - `POST /refresh`  manual refresh through the session task
//! - `POST /session`  wallet connection seam (`{"connected": bool}`)
//! - `GET  /metrics`  Prometheus text format

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};

use super::prometheus::FeedMetrics;
use crate::usecases::price_feed::PriceFeed;
use crate::usecases::session::RefreshTrigger;

/// Wallet connection update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub connected: bool,
}

/// Shared handler state.
#[derive(Clone)]
struct ServerState {
    feed: Arc<PriceFeed>,
    trigger: RefreshTrigger,
    connected: Arc<watch::Sender<bool>>,
    metrics: Arc<FeedMetrics>,
}

/// Axum-based feed server.
pub struct FeedServer {
    /// Handler state.
    state: ServerState,
    /// Bind address.
    bind_address: String,
}

impl FeedServer {
    pub fn new(
        feed: Arc<PriceFeed>,
        trigger: RefreshTrigger,
        connected: Arc<watch::Sender<bool>>,
        metrics: Arc<FeedMetrics>,
        bind_address: String,
    ) -> Self {
        Self {
            state: ServerState {
                feed,
                trigger,
                connected,
                metrics,
            },
            bind_address,
        }
    }

    /// Routes with state attached.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/snapshot", get(Self::snapshot))
            .route("/refresh", post(Self::refresh))
            .route("/session", post(Self::session))
            .route("/metrics", get(Self::metrics))
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        self.serve(listener, shutdown_rx).await
    }

    /// Serve on an already-bound listener until shutdown.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let app = self.router();
        info!(address = %listener.local_addr()?, "Feed server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 until the feed is torn down.
    async fn readiness(State(state): State<ServerState>) -> impl IntoResponse {
        if state.feed.is_torn_down().await {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        } else {
            (StatusCode::OK, "READY")
        }
    }

    async fn snapshot(State(state): State<ServerState>) -> impl IntoResponse {
        Json(state.feed.snapshot().await)
    }

    async fn refresh(State(state): State<ServerState>) -> Response {
        match state.trigger.refresh().await {
            Ok(report) => Json(report).into_response(),
            Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
        }
    }

    async fn session(
        State(state): State<ServerState>,
        Json(update): Json<SessionUpdate>,
    ) -> impl IntoResponse {
        state.connected.send_replace(update.connected);
        info!(connected = update.connected, "Wallet session updated");
        Json(update)
    }

    async fn metrics(State(state): State<ServerState>) -> Response {
        match state.metrics.render() {
            Ok(text) => (StatusCode::OK, text).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        }
    }
}
