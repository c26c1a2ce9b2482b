use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct BroadcastPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Application entry point for room fan-out.
///
/// Fire and forget: the hub resolves the target set when it processes the
/// broadcast, so no delivery report can be returned truthfully.
pub async fn broadcast_handler(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Json(payload): Json<BroadcastPayload>,
) -> (StatusCode, Json<Value>) {
    state.hub.broadcast_to_room(room, payload.kind, payload.data);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    )
}
