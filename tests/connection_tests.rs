mod common;

use std::sync::{Arc, Mutex};

use common::{data, recv_frame, settle, start_hub};
use streamhub::models::client::Connection;
use streamhub::models::message::Message;
use streamhub::websocket::connection::{MessageSink, dispatch};

/// Sink that records everything delivered to it.
#[derive(Default)]
struct CapturingSink {
    delivered: Mutex<Vec<Message>>,
}

impl CapturingSink {
    fn messages(&self) -> Vec<Message> {
        self.delivered.lock().unwrap().clone()
    }
}

impl MessageSink for CapturingSink {
    fn deliver(&self, _conn: &Arc<Connection>, message: Message) {
        self.delivered.lock().unwrap().push(message);
    }
}

#[tokio::test]
async fn subscribe_joins_room_and_acks() {
    let hub = start_hub();
    let sink = CapturingSink::default();
    let (conn, mut rx) = Connection::new("u1");
    hub.register(conn.clone());
    settle(&hub).await;

    let request = Message::new("subscribe", data(&[("room", "s1".into())]));
    dispatch(&conn, &hub, &sink, request).await;

    assert!(conn.is_in_room("s1").await);
    let ack = recv_frame(&mut rx).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["data"]["action"], "subscribed");
    assert_eq!(ack["data"]["room"], "s1");
    assert!(sink.messages().is_empty());
}

#[tokio::test]
async fn unsubscribe_leaves_room_and_acks() {
    let hub = start_hub();
    let sink = CapturingSink::default();
    let (conn, mut rx) = Connection::new("u1");
    hub.register(conn.clone());
    hub.join_room("s1", &conn).await;

    let request = Message::new("unsubscribe", data(&[("room", "s1".into())]));
    dispatch(&conn, &hub, &sink, request).await;

    assert!(!conn.is_in_room("s1").await);
    let ack = recv_frame(&mut rx).await;
    assert_eq!(ack["data"]["action"], "unsubscribed");
    assert_eq!(ack["data"]["room"], "s1");
}

#[tokio::test]
async fn subscribe_without_room_is_ignored() {
    let hub = start_hub();
    let sink = CapturingSink::default();
    let (conn, mut rx) = Connection::new("u1");
    hub.register(conn.clone());
    settle(&hub).await;

    dispatch(&conn, &hub, &sink, Message::new("subscribe", data(&[]))).await;
    settle(&hub).await;

    assert!(conn.rooms().await.is_empty());
    assert!(rx.try_recv().is_err(), "no ack for a malformed subscribe");
    assert!(sink.messages().is_empty());
}

#[tokio::test]
async fn ping_gets_a_pong_with_timestamp() {
    let hub = start_hub();
    let sink = CapturingSink::default();
    let (conn, mut rx) = Connection::new("u1");

    dispatch(&conn, &hub, &sink, Message::new("ping", data(&[]))).await;

    let pong = recv_frame(&mut rx).await;
    assert_eq!(pong["type"], "pong");
    assert!(pong["data"]["timestamp"].is_i64());
    assert!(rx.try_recv().is_err(), "exactly one pong expected");
}

#[tokio::test]
async fn unknown_kinds_go_to_the_sink() {
    let hub = start_hub();
    let sink = CapturingSink::default();
    let (conn, mut rx) = Connection::new("u1");

    let inbound = Message::new("chat", data(&[("text", "hi".into())]));
    dispatch(&conn, &hub, &sink, inbound).await;

    let delivered = sink.messages();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, "chat");
    assert_eq!(delivered[0].data["text"], "hi");
    assert!(rx.try_recv().is_err(), "sink messages are not echoed back");
}

#[tokio::test]
async fn best_effort_send_drops_on_full_buffer() {
    let (conn, mut rx) = Connection::with_buffer("u1", 1);

    conn.send_message(&Message::new("a", data(&[])));
    conn.send_message(&Message::new("b", data(&[])));

    assert_eq!(conn.dropped_messages(), 1);
    assert!(!conn.is_closed(), "direct-send overflow must not close");
    assert_eq!(recv_frame(&mut rx).await["type"], "a");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn close_is_terminal_and_idempotent() {
    let (conn, _rx) = Connection::new("u1");
    assert!(!conn.is_closed());

    conn.close();
    conn.close();
    assert!(conn.is_closed());
    assert!(!conn.enqueue(Arc::from("{}")), "closed connection rejects frames");
}

#[tokio::test]
async fn metadata_round_trips() {
    let (conn, _rx) = Connection::new("u1");
    conn.set_metadata("user_agent", "test/1.0").await;

    assert_eq!(conn.metadata("user_agent").await.as_deref(), Some("test/1.0"));
    assert_eq!(conn.metadata("missing").await, None);

    let stats = conn.stats().await;
    assert_eq!(stats.owner_id, "u1");
    assert_eq!(stats.metadata.get("user_agent").map(String::as_str), Some("test/1.0"));
}
