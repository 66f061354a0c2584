use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, trace, warn};
use uuid::Uuid;

use calcchat_types::events::{RelayCommand, RelayEvent};
use calcchat_types::participants::Participant;

use crate::error::RelayError;
use crate::hub::Hub;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Run one WebSocket connection bound to `participant` until either side closes it.
pub async fn handle_connection(
    socket: WebSocket,
    hub: Hub,
    participant: Participant,
    heartbeat_interval: Duration,
) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut rx) = hub.dispatcher().join(&participant.id).await;
    info!("{} ({}) connected as {}", participant.name, participant.id, conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Room events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Dropping unserializable event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Client commands -> hub
    let recv_hub = hub.clone();
    let recv_participant = participant.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text(&recv_hub, conn_id, &recv_participant, text.as_str()).await;
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.dispatcher().leave(conn_id).await;
    info!("{} ({}) disconnected ({})", participant.name, participant.id, conn_id);
}

/// Parse and apply one text frame. Anything rejected is answered with a
/// `relay_error` to this connection only.
pub async fn handle_text(hub: &Hub, conn_id: Uuid, participant: &Participant, text: &str) {
    let cmd = match serde_json::from_str::<RelayCommand>(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!(
                "{} ({}) bad event: {} -- raw: {}",
                participant.name,
                participant.id,
                e,
                preview(text)
            );
            let err = RelayError::Malformed(e.to_string());
            reply_error(hub, conn_id, "unknown", &err, None).await;
            return;
        }
    };

    let event_name = cmd.name();
    let client_ref = match &cmd {
        RelayCommand::SendMessage(draft) => draft.client_ref.clone(),
        _ => None,
    };

    if let Err(e) = handle_command(hub, conn_id, participant, cmd).await {
        warn!("{} ({}) {} rejected: {}", participant.name, participant.id, event_name, e);
        reply_error(hub, conn_id, event_name, &e, client_ref).await;
    }
}

async fn handle_command(
    hub: &Hub,
    conn_id: Uuid,
    participant: &Participant,
    cmd: RelayCommand,
) -> Result<(), RelayError> {
    match cmd {
        RelayCommand::SendMessage(draft) => {
            ensure_identity(participant, &draft.sender_id)?;
            hub.send_message(draft).await?;
        }

        RelayCommand::Seen { user_id } => {
            ensure_identity(participant, &user_id)?;
            hub.mark_seen(&user_id).await?;
        }

        RelayCommand::DeleteMessage { id } => {
            hub.delete_message(id).await?;
        }

        RelayCommand::Typing { user_id, typing } => {
            ensure_identity(participant, &user_id)?;
            trace!("{} typing={}", user_id, typing);
            hub.typing(conn_id, &user_id, typing).await?;
        }
    }
    Ok(())
}

/// Events carry a user id; it has to be the one this connection was opened as.
fn ensure_identity(participant: &Participant, claimed: &str) -> Result<(), RelayError> {
    if claimed == participant.id {
        Ok(())
    } else {
        Err(RelayError::IdentityMismatch {
            claimed: claimed.to_string(),
            bound: participant.id.clone(),
        })
    }
}

/// First 200 characters, for logging raw frames.
fn preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

async fn reply_error(
    hub: &Hub,
    conn_id: Uuid,
    event: &str,
    err: &RelayError,
    client_ref: Option<String>,
) {
    hub.dispatcher()
        .send_to(
            conn_id,
            RelayEvent::RelayError {
                event: event.to_string(),
                reason: err.client_reason(),
                client_ref,
            },
        )
        .await;
}
