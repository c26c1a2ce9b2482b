use axum::Json;
use axum::http::StatusCode;
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Instant;

use crate::state::{AppState, RateLimitEntry};

// Sweep expired entries once the map grows past this, so one address per
// request cannot grow it without bound.
const PRUNE_THRESHOLD: usize = 1024;

/// Fixed-window per-IP limit on connection attempts.
pub async fn check_rate_limit(
    state: &AppState,
    addr: SocketAddr,
) -> Result<(), (StatusCode, Json<Value>)> {
    let mut limits = state.rate_limits.write().await;
    let now = Instant::now();
    if limits.len() > PRUNE_THRESHOLD {
        limits.retain(|_, entry| {
            now.duration_since(entry.window_start) <= state.rate_limit_window
        });
    }
    let entry = limits.entry(addr).or_insert(RateLimitEntry {
        count: 0,
        window_start: now,
    });

    if now.duration_since(entry.window_start) > state.rate_limit_window {
        entry.count = 0;
        entry.window_start = now;
    }

    if entry.count >= state.rate_limit_count {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "TOO_MANY_REQUESTS" })),
        ));
    }

    entry.count += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hub::Hub;
    use std::time::Duration;

    fn state(count: u32, window: Duration) -> AppState {
        let (_hub, handle) = Hub::new();
        AppState::new(
            handle,
            &Config {
                port: 0,
                admin_token: "t".into(),
                rate_limit_count: count,
                rate_limit_window: window,
            },
        )
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn requests_past_the_limit_are_rejected() {
        let state = state(2, Duration::from_secs(60));
        assert!(check_rate_limit(&state, addr(1)).await.is_ok());
        assert!(check_rate_limit(&state, addr(1)).await.is_ok());
        let (status, _) = check_rate_limit(&state, addr(1)).await.unwrap_err();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(check_rate_limit(&state, addr(2)).await.is_ok(), "limits are per address");
    }

    #[tokio::test]
    async fn an_expired_window_resets_the_count() {
        let state = state(1, Duration::from_secs(60));
        state.rate_limits.write().await.insert(
            addr(1),
            RateLimitEntry {
                count: 1,
                window_start: Instant::now() - Duration::from_secs(120),
            },
        );
        assert!(check_rate_limit(&state, addr(1)).await.is_ok());
    }

    #[tokio::test]
    async fn stale_entries_are_swept_once_the_map_grows() {
        let state = state(10, Duration::from_secs(60));
        {
            let mut limits = state.rate_limits.write().await;
            for port in 1..=(PRUNE_THRESHOLD as u16 + 1) {
                limits.insert(
                    addr(port),
                    RateLimitEntry {
                        count: 1,
                        window_start: Instant::now() - Duration::from_secs(120),
                    },
                );
            }
        }
        assert!(check_rate_limit(&state, addr(9999)).await.is_ok());
        assert_eq!(state.rate_limits.read().await.len(), 1);
    }
}
