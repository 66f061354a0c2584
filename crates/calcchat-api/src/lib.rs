pub mod messages;
pub mod state;
pub mod subscriptions;

use axum::{
    Json, Router,
    routing::{get, post},
};

use calcchat_types::api::StatusResponse;

use crate::state::AppState;

/// HTTP routes used by the chat UI next to the WebSocket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages", get(messages::get_messages))
        .route("/seen", post(messages::mark_seen))
        .route("/subscribe", post(subscriptions::subscribe))
        .route("/save-token", post(subscriptions::save_token))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}
