use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info, warn};

use calcchat_types::api::{SaveTokenRequest, SubscribeRequest, looks_like_url};

use crate::state::AppState;

/// POST /subscribe: register (or refresh) an FCM device token for a participant.
/// Browser web-push subscriptions are refused, nothing could deliver to them.
pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.is_web_push() {
        warn!("Web-push subscription from {} refused, only FCM tokens are accepted", req.user_id);
        return Err(StatusCode::BAD_REQUEST);
    }
    register(&state, req.user_id, req.endpoint).await?;
    Ok(StatusCode::CREATED)
}

/// POST /save-token: same registry, token-style request body.
pub async fn save_token(
    State(state): State<AppState>,
    Json(req): Json<SaveTokenRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    register(&state, req.user_id, req.token).await?;
    Ok(StatusCode::OK)
}

async fn register(state: &AppState, user_id: String, endpoint: String) -> Result<(), StatusCode> {
    if !state.hub.participants().contains(&user_id) {
        warn!("Push registration for unknown participant {}", user_id);
        return Err(StatusCode::BAD_REQUEST);
    }
    let endpoint = endpoint.trim().to_string();
    if endpoint.is_empty() || looks_like_url(&endpoint) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let db = state.hub.db();
    let uid = user_id.clone();
    tokio::task::spawn_blocking(move || db.upsert_subscription(&uid, &endpoint))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("DB upsert_subscription error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!("Push subscription registered for {}", user_id);
    Ok(())
}
