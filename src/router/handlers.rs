//! Request handlers: the proxying data path plus the admin/state endpoints.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::Error;
use crate::metrics;
use crate::router::server::AppState;
use crate::types::{Status, StateUpdateEvent};

const PROXY_TIMEOUT: Duration = Duration::from_secs(5);

/// `GET /:key` — the core data path: hash `key` on the current ring, proxy to the
/// owning backend, and react to the outcome.
pub async fn route_key(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    if key.is_empty() {
        metrics::REQUESTS_TOTAL.with_label_values(&["invalid_key"]).inc();
        return Error::InvalidKey.into_response();
    }

    let ring = state.ring.load();
    let backend = match ring.get(&key) {
        Some(b) => b.clone(),
        None => {
            metrics::REQUESTS_TOTAL.with_label_values(&["no_backend"]).inc();
            return Error::NoHealthyBackends.into_response();
        }
    };
    drop(ring);

    let url = format!("http://{}:{}/{}", backend.address, backend.port, key);
    let timer = metrics::REQUEST_DURATION_SECONDS
        .with_label_values(&[&backend.name])
        .start_timer();
    let result = state.http.get(&url).timeout(PROXY_TIMEOUT).send().await;
    timer.observe_duration();

    match result {
        Ok(resp) if resp.status().is_success() => {
            let body: Value = resp.json().await.unwrap_or(json!({}));
            if let Err(e) = state.registry.inc_load(&backend.instance_id).await {
                warn!("failed to record load for {}: {e}", backend.name);
            }
            metrics::REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
            let broadcaster = state.broadcaster.clone();
            tokio::spawn(async move {
                if let Err(e) = broadcaster.publish().await {
                    warn!("state publish failed: {e}");
                }
            });
            Json(body).into_response()
        }
        other => {
            if let Err(e) = &other {
                error!("upstream call to {} failed: {e}", backend.name);
            }
            metrics::REQUESTS_TOTAL.with_label_values(&["upstream_error"]).inc();
            if let Err(e) = state.registry.set_status(&backend.instance_id, Status::Unhealthy).await {
                warn!("failed to mark {} unhealthy: {e}", backend.name);
            }
            let coordinator = state.coordinator.clone();
            tokio::spawn(async move {
                if let Err(e) = coordinator.rebuild_now().await {
                    warn!("rebuild after upstream failure failed: {e}");
                }
            });
            Error::UpstreamUnreachable.into_response()
        }
    }
}

/// `POST /trigger_rebuild` — administrative, idempotent when registry state hasn't changed.
pub async fn trigger_rebuild(State(state): State<AppState>) -> Response {
    match state.coordinator.rebuild_now().await {
        Ok(()) => (
            axum::http::StatusCode::OK,
            Json(json!({ "status": "rebuild triggered" })),
        )
            .into_response(),
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// `GET /_internal/state` — the same snapshot the broadcaster pushes over the WebSocket.
pub async fn internal_state(State(state): State<AppState>) -> impl IntoResponse {
    match state.broadcaster.publish().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /ws/state` — streams `state_update` events, one per coalesced publish.
pub async fn ws_state(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let mut rx = state.broadcaster.subscribe();

    let initial = rx.borrow().clone();
    if send_snapshot(&mut socket, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if send_snapshot(&mut socket, &snapshot).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => continue,
                }
            }
        }
    }
}

async fn send_snapshot(
    socket: &mut WebSocket,
    snapshot: &crate::types::StateSnapshot,
) -> Result<(), axum::Error> {
    let event = StateUpdateEvent::new(snapshot);
    let payload = serde_json::to_string(&event).unwrap_or_default();
    socket.send(Message::Text(payload)).await
}
