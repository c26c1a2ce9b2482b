use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::hub::HubHandle;
use crate::websocket::connection::{LogSink, MessageSink};

#[derive(Clone)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

pub type RateLimits = Arc<RwLock<HashMap<SocketAddr, RateLimitEntry>>>;

/// Shared state behind the HTTP surface.
pub struct AppState {
    pub hub: HubHandle,
    pub sink: Arc<dyn MessageSink>,
    pub rate_limits: RateLimits,
    pub admin_token: String,
    pub rate_limit_count: u32,
    pub rate_limit_window: Duration,
}

impl AppState {
    pub fn new(hub: HubHandle, config: &Config) -> Self {
        Self::with_sink(hub, config, Arc::new(LogSink))
    }

    pub fn with_sink(hub: HubHandle, config: &Config, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            hub,
            sink,
            rate_limits: Arc::new(RwLock::new(HashMap::new())),
            admin_token: config.admin_token.clone(),
            rate_limit_count: config.rate_limit_count,
            rate_limit_window: config.rate_limit_window,
        }
    }
}
