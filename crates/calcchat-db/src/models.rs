//! Database row types. These map directly to SQLite rows and are converted
//! into `calcchat-types` models at the edge of this crate.

use calcchat_types::models::{Message, ReplySnapshot};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

/// Fields the caller supplies when appending; id, timestamp and seen are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub text: Option<String>,
    pub image: Option<String>,
    pub sender_id: String,
    pub sender_name: String,
    pub reply_to: Option<ReplySnapshot>,
}

pub struct MessageRow {
    pub id: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub sender_id: String,
    pub sender_name: String,
    pub seen: bool,
    pub reply_to: Option<String>,
    pub created_at: String,
}

pub struct SubscriptionRow {
    pub endpoint: String,
    pub participant_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        let id = self.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", self.id, e);
            Uuid::default()
        });

        let reply_to = self.reply_to.as_deref().and_then(|raw| {
            serde_json::from_str::<ReplySnapshot>(raw)
                .map_err(|e| warn!("Corrupt reply_to on message '{}': {}", self.id, e))
                .ok()
        });

        let timestamp = parse_timestamp(&self.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on message '{}'", self.created_at, self.id);
            DateTime::default()
        });

        Message {
            id,
            text: self.text,
            image: self.image,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            seen: self.seen,
            reply_to,
            timestamp,
        }
    }
}

/// RFC 3339 as written by the store, or SQLite's `datetime('now')` format.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc()))
        .ok()
}
