//! API Routes

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Create API v1 routes
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Conversation lifecycle
        .route(
            "/start_conversation",
            post(handlers::conversation::start_conversation),
        )
        .route(
            "/view_conversation",
            post(handlers::conversation::view_conversation),
        )
        .route("/refund", post(handlers::refund::refund))
        // Purchase gate
        .route("/buy_tokens", post(handlers::purchase::buy_tokens))
        // Read-only
        .route(
            "/accounts/:account/balances",
            get(handlers::account::get_balances),
        )
        .route(
            "/accounts/:account/entries",
            get(handlers::account::get_entries),
        )
        .route("/events", get(handlers::account::get_events))
}
