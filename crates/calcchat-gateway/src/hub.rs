use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use calcchat_db::Database;
use calcchat_db::models::NewMessage;
use calcchat_push::Notifier;
use calcchat_types::events::RelayEvent;
use calcchat_types::models::{Message, MessageDraft};
use calcchat_types::participants::{Participant, Participants};

use crate::dispatcher::Dispatcher;
use crate::error::RelayError;

/// Mediates every state change: validates, persists, then rebroadcasts to the room.
/// Holds no state of its own beyond handles to the store, the room and the notifier.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    participants: Participants,
    notifier: Notifier,
    /// Held from append to broadcast so live order matches store order.
    send_order: Mutex<()>,
}

impl Hub {
    pub fn new(
        db: Arc<Database>,
        dispatcher: Dispatcher,
        participants: Participants,
        notifier: Notifier,
    ) -> Self {
        Self {
            inner: Arc::new(HubInner {
                db,
                dispatcher,
                participants,
                notifier,
                send_order: Mutex::new(()),
            }),
        }
    }

    pub fn db(&self) -> Arc<Database> {
        self.inner.db.clone()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn participants(&self) -> &Participants {
        &self.inner.participants
    }

    pub fn participant(&self, id: &str) -> Result<&Participant, RelayError> {
        self.inner
            .participants
            .get(id)
            .ok_or_else(|| RelayError::UnknownParticipant(id.to_string()))
    }

    /// Persist a message and echo it to every connection, the sender's included.
    /// The counterpart's devices are notified in the background.
    pub async fn send_message(&self, draft: MessageDraft) -> Result<Message, RelayError> {
        let sender = self.participant(&draft.sender_id)?;
        if !draft.has_content() {
            return Err(RelayError::EmptyMessage);
        }

        let new = NewMessage {
            text: draft.text.filter(|t| !t.trim().is_empty()),
            image: draft.image.filter(|i| !i.is_empty()),
            sender_id: sender.id.clone(),
            sender_name: sender.name.clone(),
            reply_to: draft.reply_to,
        };

        let ordered = self.inner.send_order.lock().await;
        let message = self
            .blocking(move |db| db.append_message(new))
            .await
            .inspect_err(|e| error!("Save failed, message from {} dropped: {}", sender.id, e))?;

        info!("Message {} from {}", message.id, message.sender_id);
        self.inner
            .dispatcher
            .broadcast(RelayEvent::ReceiveMessage(message.clone()))
            .await;
        drop(ordered);

        let notifier = self.inner.notifier.clone();
        let pushed = message.clone();
        tokio::spawn(async move {
            notifier.notify_new_message(&pushed).await;
        });

        Ok(message)
    }

    /// Mark the counterpart's messages as seen by `user_id`. Broadcasts
    /// `messages_seen` only when something changed. Returns the change count.
    pub async fn mark_seen(&self, user_id: &str) -> Result<usize, RelayError> {
        let reader = self.participant(user_id)?.id.clone();

        let changed = self
            .blocking(move |db| db.mark_seen_except(&reader))
            .await
            .inspect_err(|e| error!("Mark seen for {} failed: {}", user_id, e))?;

        if changed > 0 {
            debug!("{} saw {} messages", user_id, changed);
            self.inner.dispatcher.broadcast(RelayEvent::MessagesSeen).await;
        }
        Ok(changed)
    }

    /// Unsend. `message_deleted` goes out even if the id was already gone.
    /// Returns whether a record was actually removed.
    pub async fn delete_message(&self, id: Uuid) -> Result<bool, RelayError> {
        let removed = self
            .blocking(move |db| db.delete_message(id))
            .await
            .inspect_err(|e| error!("Delete of {} failed: {}", id, e))?;

        if !removed {
            debug!("Delete of unknown message {}", id);
        }
        self.inner
            .dispatcher
            .broadcast(RelayEvent::MessageDeleted { id })
            .await;
        Ok(removed)
    }

    /// Relay a typing signal to every connection except `origin`.
    pub async fn typing(&self, origin: Uuid, user_id: &str, typing: bool) -> Result<(), RelayError> {
        let participant = self.participant(user_id)?;
        self.inner
            .dispatcher
            .set_typing(origin, &participant.id, typing)
            .await;
        Ok(())
    }

    /// The most recent `limit` messages, oldest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<Message>, RelayError> {
        self.blocking(move |db| db.recent_messages(limit))
            .await
            .inspect_err(|e| error!("Loading history failed: {}", e))
    }

    /// Run a store call off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T, RelayError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.inner.db.clone();
        tokio::task::spawn_blocking(move || f(db.as_ref()))
            .await
            .map_err(|e| RelayError::Persistence(format!("spawn_blocking join error: {}", e)))?
            .map_err(|e| RelayError::Persistence(e.to_string()))
    }
}
