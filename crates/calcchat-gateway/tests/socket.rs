use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tower::ServiceExt;

use calcchat_db::Database;
use calcchat_gateway::socket::{self, MAX_WS_MESSAGE};
use calcchat_gateway::{Dispatcher, Hub};
use calcchat_push::{NoopSender, Notifier};
use calcchat_types::events::RelayEvent;
use calcchat_types::participants::Participants;

fn hub() -> Hub {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let participants = Participants::parse("9492:Rahitha,9746:Guest").unwrap();
    let notifier = Notifier::new(db.clone(), Arc::new(NoopSender), participants.clone());
    Hub::new(db, Dispatcher::new(Duration::from_secs(60)), participants, notifier)
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn wait_for_connections(hub: &Hub, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while hub.dispatcher().connection_count().await != expected {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("connection count never reached {}", expected));
}

#[tokio::test]
async fn socket_without_user_id_is_bad_request() {
    let resp = socket::router(hub())
        .oneshot(Request::get("/socket").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn socket_for_unknown_user_is_forbidden() {
    let resp = socket::router(hub())
        .oneshot(Request::get("/socket?userId=1234").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn known_user_still_needs_a_websocket_handshake() {
    let resp = socket::router(hub())
        .oneshot(Request::get("/socket?userId=9492").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
    assert_ne!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn image_frame_larger_than_sixteen_megabytes_is_relayed() {
    let hub = hub();
    let addr = serve(socket::router(hub.clone())).await;

    let config = WebSocketConfig::default()
        .max_message_size(Some(MAX_WS_MESSAGE))
        .max_frame_size(Some(MAX_WS_MESSAGE));
    let url = format!("ws://{}/socket?userId=9492", addr);
    let (mut ws, _) = tokio_tungstenite::connect_async_with_config(url, Some(config), false)
        .await
        .unwrap();

    let image = format!("data:image/png;base64,{}", "A".repeat(20 * 1024 * 1024));
    let frame = serde_json::json!({
        "event": "send_message",
        "data": { "image": image, "senderId": "9492", "clientRef": "big-1" }
    });
    ws.send(Message::text(frame.to_string())).await.unwrap();

    let echoed = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(msg) = ws.next().await {
            if let Message::Text(text) = msg.unwrap() {
                if let Ok(RelayEvent::ReceiveMessage(m)) = serde_json::from_str(text.as_str()) {
                    return m;
                }
            }
        }
        panic!("socket closed before the echo");
    })
    .await
    .unwrap();

    assert_eq!(echoed.sender_id, "9492");
    assert_eq!(echoed.image.as_deref(), Some(image.as_str()));

    let stored = hub.recent(1).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, echoed.id);
}

#[tokio::test]
async fn silent_client_is_dropped_after_missed_heartbeats() {
    let hub = hub();
    let addr = serve(socket::router_with_heartbeat(hub.clone(), Duration::from_millis(100))).await;

    // Never polled, so no pong ever goes back.
    let url = format!("ws://{}/socket?userId=9746", addr);
    let (_ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    wait_for_connections(&hub, 1).await;
    wait_for_connections(&hub, 0).await;
    assert!(hub.dispatcher().online_participants().await.is_empty());
}
