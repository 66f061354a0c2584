use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, MessageDraft};

/// Events sent FROM server TO clients over the WebSocket.
///
/// Wire form: `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum RelayEvent {
    /// A message was persisted. Echoed to the sender too.
    ReceiveMessage(Message),

    /// Seen flags changed; clients re-fetch or flip their local copies.
    MessagesSeen,

    /// A message was unsent.
    MessageDeleted { id: Uuid },

    /// A participant started or stopped typing.
    DisplayTyping { user_id: String, typing: bool },

    /// A participant came online or went offline.
    Presence { user_id: String, online: bool },

    /// An event from this connection was rejected or could not be applied.
    RelayError {
        event: String,
        reason: String,
        client_ref: Option<String>,
    },
}

/// Commands sent FROM a client TO the server over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum RelayCommand {
    SendMessage(MessageDraft),

    /// Mark everything the other participant sent as seen.
    Seen { user_id: String },

    DeleteMessage { id: Uuid },

    Typing { user_id: String, typing: bool },
}

impl RelayCommand {
    /// Wire name, used in `RelayError::event`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "send_message",
            Self::Seen { .. } => "seen",
            Self::DeleteMessage { .. } => "delete_message",
            Self::Typing { .. } => "typing",
        }
    }
}
