//! Per-connection read and write pumps. Exactly one logical reader and one
//! logical writer run per connection; both talk to the hub only through its
//! handle.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Map;
use tokio::time::{self, Instant, timeout};
use tracing::{debug, info, warn};

use crate::hub::HubHandle;
use crate::models::client::{Connection, OutboundRx};
use crate::models::message::Message;

/// Time allowed for a single write to the peer.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Rolling read deadline; a peer silent for this long is torn down.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Keepalive ping period. Must be shorter than `PONG_WAIT`.
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Maximum inbound frame size accepted from a peer.
pub const MAX_MESSAGE_SIZE: usize = 512 * 1024;

/// Destination for application-level inbound messages the hub does not
/// interpret itself (the external message origin).
pub trait MessageSink: Send + Sync {
    fn deliver(&self, conn: &Arc<Connection>, message: Message);
}

/// Default sink: log and drop.
pub struct LogSink;

impl MessageSink for LogSink {
    fn deliver(&self, conn: &Arc<Connection>, message: Message) {
        info!(
            conn_id = %conn.id,
            owner_id = %conn.owner_id,
            kind = %message.kind,
            "inbound application message"
        );
    }
}

/// Drive one upgraded socket: register with the hub, run both pumps until
/// either exits, then unregister. Cleanup runs on every exit path.
pub async fn handle_socket(
    socket: WebSocket,
    conn: Arc<Connection>,
    outbound: OutboundRx,
    hub: HubHandle,
    sink: Arc<dyn MessageSink>,
) {
    hub.register(conn.clone());

    let (ws_tx, ws_rx) = socket.split();
    let mut write = tokio::spawn(write_pump(conn.clone(), outbound, ws_tx));
    let mut read = tokio::spawn(read_pump(conn.clone(), ws_rx, hub.clone(), sink));

    tokio::select! {
        _ = &mut write => read.abort(),
        _ = &mut read => write.abort(),
    }

    hub.unregister(conn.id.clone());
}

// Undecodable frames are discarded; transport errors and silence past the
// read deadline end the pump.
async fn read_pump(
    conn: Arc<Connection>,
    mut ws_rx: SplitStream<WebSocket>,
    hub: HubHandle,
    sink: Arc<dyn MessageSink>,
) {
    loop {
        let frame = match timeout(PONG_WAIT, ws_rx.next()).await {
            Err(_) => {
                debug!(conn_id = %conn.id, "read deadline exceeded");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(error))) => {
                debug!(conn_id = %conn.id, %error, "transport read error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };
        match frame {
            WsMessage::Text(text) => {
                let message: Message = match serde_json::from_str(text.as_str()) {
                    Ok(message) => message,
                    Err(error) => {
                        warn!(conn_id = %conn.id, %error, "discarding undecodable frame");
                        continue;
                    }
                };
                hub.metrics().record_received();
                dispatch(&conn, &hub, sink.as_ref(), message).await;
            }
            WsMessage::Close(_) => break,
            // Pongs (and anything else unframed) just reset the deadline by
            // reaching the next loop iteration.
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Binary(_) => {}
        }
    }
}

/// Interpret one decoded inbound message. Room control and ping are handled
/// here; everything else goes to the sink.
pub async fn dispatch(
    conn: &Arc<Connection>,
    hub: &HubHandle,
    sink: &dyn MessageSink,
    message: Message,
) {
    match message.kind.as_str() {
        "subscribe" => match message.data_room() {
            Some(room) => {
                hub.join_room(room, conn).await;
                conn.send_message(&ack_message("subscribed", room));
            }
            None => warn!(conn_id = %conn.id, "subscribe without data.room"),
        },
        "unsubscribe" => match message.data_room() {
            Some(room) => {
                hub.leave_room(room, conn).await;
                conn.send_message(&ack_message("unsubscribed", room));
            }
            None => warn!(conn_id = %conn.id, "unsubscribe without data.room"),
        },
        "ping" => {
            let mut data = Map::new();
            let _ = data.insert("timestamp".into(), Utc::now().timestamp().into());
            conn.send_message(&Message::new("pong", data));
        }
        _ => sink.deliver(conn, message),
    }
}

fn ack_message(action: &str, room: &str) -> Message {
    let mut data = Map::new();
    let _ = data.insert("action".into(), action.into());
    let _ = data.insert("room".into(), room.into());
    Message::new("ack", data)
}

// Drains the outbound buffer to the transport and keeps the peer alive with
// periodic pings. Exits when the hub closes the connection or a write fails.
async fn write_pump(
    conn: Arc<Connection>,
    mut outbound: OutboundRx,
    mut ws_tx: SplitSink<WebSocket, WsMessage>,
) {
    let mut keepalive = time::interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    loop {
        tokio::select! {
            () = conn.closed() => {
                // Hub-initiated close; tell the peer before dropping the
                // stream.
                let _ = timeout(WRITE_WAIT, ws_tx.send(WsMessage::Close(None))).await;
                break;
            }
            next = outbound.recv() => {
                let Some(frame) = next else { break };
                if let Err(error) = write_batch(&mut ws_tx, &mut outbound, frame).await {
                    debug!(conn_id = %conn.id, %error, "transport write error");
                    break;
                }
            }
            _ = keepalive.tick() => {
                match timeout(WRITE_WAIT, ws_tx.send(WsMessage::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        debug!(conn_id = %conn.id, %error, "keepalive write error");
                        break;
                    }
                    Err(_) => {
                        debug!(conn_id = %conn.id, "keepalive write deadline exceeded");
                        break;
                    }
                }
            }
        }
    }
}

// One frame plus anything else already queued, in a single flush.
async fn write_batch(
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    outbound: &mut OutboundRx,
    first: Arc<str>,
) -> Result<(), axum::Error> {
    let write = async {
        ws_tx.feed(WsMessage::Text(first.as_ref().into())).await?;
        while let Ok(frame) = outbound.try_recv() {
            ws_tx.feed(WsMessage::Text(frame.as_ref().into())).await?;
        }
        ws_tx.flush().await
    };
    match timeout(WRITE_WAIT, write).await {
        Ok(result) => result,
        Err(_) => Err(axum::Error::new("write deadline exceeded")),
    }
}
