use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use calcchat_gateway::RelayError;
use calcchat_types::api::{MessagesQuery, SeenRequest};

use crate::state::AppState;

/// Hard cap on one page of history.
const MAX_LIMIT: u32 = 200;

/// GET /messages: the most recent messages, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = query.limit.unwrap_or(state.history_limit).clamp(1, MAX_LIMIT);

    let messages = state
        .hub
        .recent(limit)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(messages))
}

/// POST /seen: mark everything the other participant sent as seen.
pub async fn mark_seen(
    State(state): State<AppState>,
    Json(req): Json<SeenRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    state.hub.mark_seen(&req.user_id).await.map_err(|e| match e {
        RelayError::UnknownParticipant(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    })?;

    Ok(StatusCode::OK)
}
