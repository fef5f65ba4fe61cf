// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod config;
pub mod engine;
pub mod llm;
pub mod observer;
pub mod protocol;
pub mod registry;
pub mod responder;
pub mod state;
pub mod types;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// WebSocket and HTTP routes, without static files or middleware
pub fn router(state: Arc<state::AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(api::health))
        .route("/api/pet/state", get(api::get_pet_state))
        .route("/api/pet/talk", post(api::talk))
        .route("/api/pet/reset", post(api::reset_pet))
        .route("/api/pet/create", post(api::create_pet))
        .route("/api/stats", get(api::stats))
        .route("/api/pet/{action}", post(api::pet_action))
        .with_state(state)
}
