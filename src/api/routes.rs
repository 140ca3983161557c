//! Route table

use super::{handlers::*, websocket::websocket_handler};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Viewer endpoints
        .route("/api/user/:username", get(account_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/recent", get(recent_handler))
        .route("/api/leaderboard", get(leaderboard_handler))
        .route("/api/odds", get(odds_handler))
        .route("/api/register", post(register_handler))
        .route("/api/bet", post(bet_handler))
        .route("/api/chat", post(chat_handler))
        // Operator endpoints
        .route("/admin/config", get(get_config_handler).post(update_config_handler))
        .route("/admin/balance", post(set_balance_handler))
        .route("/admin/user/:username", delete(delete_user_handler))
        .route("/admin/import", post(import_handler))
        // Live event stream
        .route("/ws", get(websocket_handler))
        .with_state(state)
}
