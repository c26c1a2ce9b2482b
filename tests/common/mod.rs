#![allow(dead_code)]

use std::time::Duration;

use serde_json::{Map, Value};
use streamhub::hub::{Hub, HubHandle};
use streamhub::models::client::OutboundRx;
use tokio::time::timeout;

/// Spawn a hub loop and return its handle.
pub fn start_hub() -> HubHandle {
    start_hub_with_task().0
}

/// Like [`start_hub`], but also hand back the loop task so a test can wait
/// for the loop to finish after a shutdown.
pub fn start_hub_with_task() -> (HubHandle, tokio::task::JoinHandle<()>) {
    let (hub, handle) = Hub::new();
    let task = tokio::spawn(hub.run());
    (handle, task)
}

/// Wait until the hub has processed everything enqueued before this call.
///
/// Two request-reply round trips: the first drains commands the test sent,
/// the second drains anything the loop re-enqueued while handling them
/// (backpressure evictions).
pub async fn settle(hub: &HubHandle) {
    let _ = hub.clients().await;
    let _ = hub.clients().await;
}

pub fn data(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect()
}

/// Receive and parse the next frame from a connection's outbound buffer.
pub async fn recv_frame(rx: &mut OutboundRx) -> Value {
    let frame = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for outbound frame")
        .expect("outbound buffer closed");
    serde_json::from_str(&frame).expect("outbound frame is not valid JSON")
}
