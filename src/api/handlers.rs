use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::hub::metrics::MetricsSnapshot;
use crate::models::client::ClientStats;
use crate::state::AppState;

pub async fn health_handler() -> Json<Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.hub.metrics_snapshot().await)
}

#[derive(Serialize)]
pub struct Stats {
    pub rooms: HashMap<String, usize>,
    pub clients: Vec<ClientStats>,
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<Stats> {
    let snapshot = state.hub.metrics_snapshot().await;
    let clients = state.hub.clients().await;
    Json(Stats {
        rooms: snapshot.rooms,
        clients,
    })
}

#[derive(Deserialize)]
pub struct DisconnectPayload {
    pub id: String,
}

/// Force-unregister a connection. Unregistration is idempotent, so unknown
/// ids are accepted too.
pub async fn disconnect_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DisconnectPayload>,
) -> StatusCode {
    state.hub.unregister(Arc::from(payload.id));
    StatusCode::ACCEPTED
}
