use std::time::Duration;

use axum::{
    Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::rejection::WebSocketUpgradeRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::warn;

use crate::connection::{self, HEARTBEAT_INTERVAL};
use crate::hub::Hub;

/// Images travel inline as data URIs, so a single frame can be huge.
/// Browsers never fragment, so the frame cap has to match the message cap.
pub const MAX_WS_MESSAGE: usize = 100 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocketQuery {
    user_id: Option<String>,
}

#[derive(Clone)]
struct SocketState {
    hub: Hub,
    heartbeat: Duration,
}

/// `/socket` with the default heartbeat.
pub fn router(hub: Hub) -> Router {
    router_with_heartbeat(hub, HEARTBEAT_INTERVAL)
}

pub fn router_with_heartbeat(hub: Hub, heartbeat: Duration) -> Router {
    Router::new()
        .route("/socket", get(ws_upgrade))
        .with_state(SocketState { hub, heartbeat })
}

/// GET /socket?userId=<id>: the connection is bound to that participant.
/// Identity is checked before the handshake headers.
async fn ws_upgrade(
    State(state): State<SocketState>,
    Query(query): Query<SocketQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(user_id) = query.user_id else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let participant = match state.hub.participant(&user_id) {
        Ok(p) => p.clone(),
        Err(_) => {
            warn!("Socket refused for unknown participant {}", user_id);
            return StatusCode::FORBIDDEN.into_response();
        }
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let SocketState { hub, heartbeat } = state;
    ws.max_message_size(MAX_WS_MESSAGE)
        .max_frame_size(MAX_WS_MESSAGE)
        .on_upgrade(move |socket| connection::handle_connection(socket, hub, participant, heartbeat))
}
