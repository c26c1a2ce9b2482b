use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use std::sync::Arc;

use super::{handlers, middleware::admin_auth, webhook};
use crate::state::AppState;

pub fn configure_api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/admin/stats",
            get(handlers::stats_handler)
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth)),
        )
        .route(
            "/admin/disconnect",
            post(handlers::disconnect_handler)
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth)),
        )
        .route(
            "/broadcast/{room}",
            post(webhook::broadcast_handler)
                .route_layer(middleware::from_fn_with_state(state, admin_auth)),
        )
}
