use axum::Json;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::models::client::Connection;
use crate::state::AppState;
use crate::utils::rate_limit::check_rate_limit;
use crate::websocket::connection::{MAX_MESSAGE_SIZE, handle_socket};

#[derive(Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Upgrade an incoming request and hand the socket to the hub.
///
/// The `user_id` query parameter is taken as the connection's opaque owner
/// identity; resolving or validating it is an upstream concern.
pub async fn ws_handler(
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<Value>)> {
    check_rate_limit(&state, addr).await?;

    let owner_id = query.user_id.unwrap_or_else(|| "anonymous".to_owned());
    let (conn, outbound) = Connection::new(owner_id);
    conn.set_metadata("remote_addr", addr.to_string()).await;
    if let Some(user_agent) = headers.get("user-agent").and_then(|h| h.to_str().ok()) {
        conn.set_metadata("user_agent", user_agent).await;
    }

    info!(conn_id = %conn.id, owner_id = %conn.owner_id, %addr, "websocket upgrade");

    let hub = state.hub.clone();
    let sink = state.sink.clone();
    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, conn, outbound, hub, sink)))
}
