use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted chat message, exactly as broadcast and served over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub text: Option<String>,
    /// Data-URI encoded image.
    pub image: Option<String>,
    pub sender_id: String,
    pub sender_name: String,
    pub seen: bool,
    pub reply_to: Option<ReplySnapshot>,
    pub timestamp: DateTime<Utc>,
}

/// Copy of the message being replied to, taken when the reply was sent.
///
/// This is not a reference: deleting the original leaves the snapshot as-is,
/// and nothing checks it against the original's current content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySnapshot {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
}

/// An unsent message as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub sender_id: String,
    /// Ignored by the server, which uses the configured participant name.
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub reply_to: Option<ReplySnapshot>,
    /// Opaque client token echoed back in `relay_error` so an optimistic
    /// local copy can be marked as failed.
    #[serde(default)]
    pub client_ref: Option<String>,
}

impl MessageDraft {
    /// Non-blank text or a non-empty image.
    pub fn has_content(&self) -> bool {
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_image = self.image.as_deref().is_some_and(|i| !i.is_empty());
        has_text || has_image
    }
}
