//! streamhub, a real-time WebSocket connection hub.
//!
//! Connections join named rooms and receive room-scoped or global
//! broadcasts. All registry and room mutations are serialized through the
//! hub's control loop; a consumer whose outbound buffer cannot keep up is
//! evicted rather than allowed to stall the fan-out.

pub mod api;
pub mod config;
pub mod hub;
pub mod models;
pub mod server;
pub mod state;
pub mod utils;
pub mod websocket;

pub use config::Config;
pub use hub::metrics::MetricsSnapshot;
pub use hub::{Hub, HubHandle};
pub use models::client::Connection;
pub use models::message::Message;
pub use server::Server;
