use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use calcchat_types::events::RelayEvent;

/// One live WebSocket connection in the room.
struct Member {
    participant_id: String,
    tx: mpsc::UnboundedSender<RelayEvent>,
}

/// The room shared by the two participants: every identified connection,
/// plus the transient presence and typing state derived from them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// conn_id -> member
    members: RwLock<HashMap<Uuid, Member>>,

    /// participant_id -> last typing renewal
    typing: RwLock<HashMap<String, Instant>>,

    typing_ttl: Duration,
}

impl Dispatcher {
    pub fn new(typing_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                members: RwLock::new(HashMap::new()),
                typing: RwLock::new(HashMap::new()),
                typing_ttl,
            }),
        }
    }

    /// Add a connection for `participant_id`. Returns (conn_id, receiver).
    ///
    /// The new connection is first sent who is online and who is typing, so a
    /// client that (re)connects mid-conversation starts from the current state.
    pub async fn join(&self, participant_id: &str) -> (Uuid, mpsc::UnboundedReceiver<RelayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut members = self.inner.members.write().await;
        let was_online = members.values().any(|m| m.participant_id == participant_id);

        let mut online: BTreeSet<&str> =
            members.values().map(|m| m.participant_id.as_str()).collect();
        online.insert(participant_id);
        for uid in online {
            let _ = tx.send(RelayEvent::Presence {
                user_id: uid.to_string(),
                online: true,
            });
        }

        for uid in self.inner.typing.read().await.keys() {
            if uid != participant_id {
                let _ = tx.send(RelayEvent::DisplayTyping {
                    user_id: uid.clone(),
                    typing: true,
                });
            }
        }

        if !was_online {
            let event = RelayEvent::Presence {
                user_id: participant_id.to_string(),
                online: true,
            };
            for member in members.values() {
                let _ = member.tx.send(event.clone());
            }
        }

        members.insert(
            conn_id,
            Member {
                participant_id: participant_id.to_string(),
                tx,
            },
        );
        debug!("{} joined as connection {} ({} open)", participant_id, conn_id, members.len());

        (conn_id, rx)
    }

    /// Drop a connection. When it was the participant's last one, peers are
    /// told they went offline and any typing indicator of theirs is cleared.
    pub async fn leave(&self, conn_id: Uuid) {
        let mut members = self.inner.members.write().await;
        let Some(gone) = members.remove(&conn_id) else {
            return;
        };

        let still_online = members.values().any(|m| m.participant_id == gone.participant_id);
        if still_online {
            return;
        }

        if self.inner.typing.write().await.remove(&gone.participant_id).is_some() {
            let event = RelayEvent::DisplayTyping {
                user_id: gone.participant_id.clone(),
                typing: false,
            };
            for member in members.values() {
                let _ = member.tx.send(event.clone());
            }
        }

        let event = RelayEvent::Presence {
            user_id: gone.participant_id,
            online: false,
        };
        for member in members.values() {
            let _ = member.tx.send(event.clone());
        }
    }

    /// Deliver to every connection in the room.
    pub async fn broadcast(&self, event: RelayEvent) {
        for member in self.inner.members.read().await.values() {
            let _ = member.tx.send(event.clone());
        }
    }

    /// Deliver to every connection except `conn_id`.
    pub async fn broadcast_except(&self, conn_id: Uuid, event: RelayEvent) {
        for (id, member) in self.inner.members.read().await.iter() {
            if *id != conn_id {
                let _ = member.tx.send(event.clone());
            }
        }
    }

    /// Deliver to a single connection.
    pub async fn send_to(&self, conn_id: Uuid, event: RelayEvent) {
        if let Some(member) = self.inner.members.read().await.get(&conn_id) {
            let _ = member.tx.send(event);
        }
    }

    /// Record a typing signal from `origin` and relay it to everyone else.
    pub async fn set_typing(&self, origin: Uuid, user_id: &str, typing: bool) {
        {
            let mut state = self.inner.typing.write().await;
            if typing {
                state.insert(user_id.to_string(), Instant::now());
            } else {
                state.remove(user_id);
            }
        }

        self.broadcast_except(
            origin,
            RelayEvent::DisplayTyping {
                user_id: user_id.to_string(),
                typing,
            },
        )
        .await;
    }

    /// Clear typing indicators not renewed within the TTL. Peers of each
    /// expired participant receive `typing: false`. Returns who expired.
    pub async fn expire_typing(&self) -> Vec<String> {
        let expired: Vec<String> = {
            let mut state = self.inner.typing.write().await;
            let ttl = self.inner.typing_ttl;
            let stale: Vec<String> = state
                .iter()
                .filter(|(_, since)| since.elapsed() >= ttl)
                .map(|(uid, _)| uid.clone())
                .collect();
            for uid in &stale {
                state.remove(uid);
            }
            stale
        };

        if expired.is_empty() {
            return expired;
        }

        let members = self.inner.members.read().await;
        for uid in &expired {
            let event = RelayEvent::DisplayTyping {
                user_id: uid.clone(),
                typing: false,
            };
            for member in members.values().filter(|m| &m.participant_id != uid) {
                let _ = member.tx.send(event.clone());
            }
        }

        expired
    }

    pub async fn online_participants(&self) -> Vec<String> {
        let members = self.inner.members.read().await;
        let online: BTreeSet<String> = members.values().map(|m| m.participant_id.clone()).collect();
        online.into_iter().collect()
    }

    pub async fn typing_participants(&self) -> Vec<String> {
        let mut typing: Vec<String> = self.inner.typing.read().await.keys().cloned().collect();
        typing.sort();
        typing
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.members.read().await.len()
    }
}
