use crate::Database;
use crate::models::{MessageRow, NewMessage, SubscriptionRow};
use anyhow::Result;
use calcchat_types::models::Message;
use chrono::{SecondsFormat, SubsecRound, Utc};
use rusqlite::Connection;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str =
    "id, text, image, sender_id, sender_name, seen, reply_to, created_at";

impl Database {
    // -- Messages --

    /// Persist a new message. The store assigns `id`, `timestamp` and `seen = false`.
    /// Content is not validated here.
    pub fn append_message(&self, new: NewMessage) -> Result<Message> {
        let id = Uuid::new_v4();
        let timestamp = Utc::now().trunc_subsecs(3);
        let reply_to = new
            .reply_to
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, text, image, sender_id, sender_name, seen, reply_to, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    new.text,
                    new.image,
                    new.sender_id,
                    new.sender_name,
                    reply_to,
                    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                ],
            )?;
            Ok(())
        })?;

        Ok(Message {
            id,
            text: new.text,
            image: new.image,
            sender_id: new.sender_id,
            sender_name: new.sender_name,
            seen: false,
            reply_to: new.reply_to,
            timestamp,
        })
    }

    /// The most recent `limit` messages, oldest first.
    pub fn recent_messages(&self, limit: u32) -> Result<Vec<Message>> {
        let mut rows = self.with_conn(|conn| query_recent(conn, limit))?;
        rows.reverse();
        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        let row = self.with_conn(|conn| query_message(conn, &id.to_string()))?;
        Ok(row.map(MessageRow::into_message))
    }

    /// Flag every unseen message not sent by `participant_id` as seen.
    /// Returns how many rows changed; a repeated call returns 0.
    pub fn mark_seen_except(&self, participant_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET seen = 1 WHERE sender_id != ?1 AND seen = 0",
                [participant_id],
            )?;
            Ok(changed)
        })
    }

    /// Hard delete. Returns false when no such message existed.
    pub fn delete_message(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM messages WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    // -- Subscriptions --

    /// Register a push endpoint for a participant. An endpoint already on file
    /// is re-assigned to `participant_id` and refreshed rather than duplicated.
    pub fn upsert_subscription(&self, participant_id: &str, endpoint: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO subscriptions (endpoint, participant_id) VALUES (?1, ?2)
                 ON CONFLICT(endpoint) DO UPDATE SET
                    participant_id = excluded.participant_id,
                    updated_at = datetime('now')",
                (endpoint, participant_id),
            )?;
            Ok(())
        })
    }

    pub fn subscriptions_for(&self, participant_id: &str) -> Result<Vec<SubscriptionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT endpoint, participant_id, created_at, updated_at
                 FROM subscriptions
                 WHERE participant_id = ?1
                 ORDER BY updated_at DESC",
            )?;

            let rows = stmt
                .query_map([participant_id], |row| {
                    Ok(SubscriptionRow {
                        endpoint: row.get(0)?,
                        participant_id: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn remove_subscription(&self, endpoint: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM subscriptions WHERE endpoint = ?1", [endpoint])?;
            Ok(removed > 0)
        })
    }
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        image: row.get(2)?,
        sender_id: row.get(3)?,
        sender_name: row.get(4)?,
        seen: row.get(5)?,
        reply_to: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_recent(conn: &Connection, limit: u32) -> Result<Vec<MessageRow>> {
    // seq is the insertion order, so same-millisecond messages still sort the same way for every reader
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM messages ORDER BY seq DESC LIMIT ?1",
        MESSAGE_COLUMNS
    ))?;

    let rows = stmt
        .query_map([limit], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM messages WHERE id = ?1",
        MESSAGE_COLUMNS
    ))?;

    let row = stmt.query_row([id], map_message_row).optional()?;
    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcchat_types::models::ReplySnapshot;

    const A: &str = "9492";
    const B: &str = "9746";

    fn text_from(sender: &str, text: &str) -> NewMessage {
        NewMessage {
            text: Some(text.into()),
            sender_id: sender.into(),
            sender_name: if sender == A { "Rahitha" } else { "Guest" }.into(),
            ..Default::default()
        }
    }

    #[test]
    fn append_assigns_identity_and_defaults() {
        let db = Database::open_in_memory().unwrap();
        let msg = db.append_message(text_from(A, "hello")).unwrap();

        assert!(!msg.seen);
        assert_eq!(msg.sender_id, A);

        let stored = db.get_message(msg.id).unwrap().unwrap();
        assert_eq!(stored, msg);
    }

    #[test]
    fn recent_is_chronological_and_windowed() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.append_message(text_from(A, &format!("m{}", i))).unwrap();
        }

        let all = db.recent_messages(20).unwrap();
        let texts: Vec<_> = all.iter().map(|m| m.text.clone().unwrap()).collect();
        assert_eq!(texts, vec!["m0", "m1", "m2", "m3", "m4"]);

        let last_two = db.recent_messages(2).unwrap();
        let texts: Vec<_> = last_two.iter().map(|m| m.text.clone().unwrap()).collect();
        assert_eq!(texts, vec!["m3", "m4"]);
    }

    #[test]
    fn mark_seen_is_idempotent_and_skips_own_messages() {
        let db = Database::open_in_memory().unwrap();
        db.append_message(text_from(A, "from a 1")).unwrap();
        db.append_message(text_from(A, "from a 2")).unwrap();
        db.append_message(text_from(B, "from b")).unwrap();

        assert_eq!(db.mark_seen_except(B).unwrap(), 2);
        assert_eq!(db.mark_seen_except(B).unwrap(), 0);

        for msg in db.recent_messages(20).unwrap() {
            if msg.sender_id == B {
                assert!(!msg.seen, "own message must not be marked seen");
            } else {
                assert!(msg.seen);
            }
        }
    }

    #[test]
    fn delete_is_destructive_and_repeatable() {
        let db = Database::open_in_memory().unwrap();
        let keep = db.append_message(text_from(A, "keep")).unwrap();
        let gone = db.append_message(text_from(A, "gone")).unwrap();

        assert!(db.delete_message(gone.id).unwrap());
        assert!(!db.delete_message(gone.id).unwrap());

        let ids: Vec<_> = db.recent_messages(20).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![keep.id]);
    }

    #[test]
    fn reply_snapshot_survives_deleting_original() {
        let db = Database::open_in_memory().unwrap();
        let original = db.append_message(text_from(B, "hi")).unwrap();

        let snapshot = ReplySnapshot {
            text: Some("hi".into()),
            image: None,
            sender_name: Some("Rahitha".into()),
        };
        let reply = db
            .append_message(NewMessage {
                reply_to: Some(snapshot.clone()),
                ..text_from(A, "hey back")
            })
            .unwrap();

        db.delete_message(original.id).unwrap();

        let stored = db.get_message(reply.id).unwrap().unwrap();
        assert_eq!(stored.reply_to, Some(snapshot));
    }

    #[test]
    fn subscriptions_dedupe_by_endpoint() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_subscription(A, "tok-1").unwrap();
        db.upsert_subscription(A, "tok-1").unwrap();
        db.upsert_subscription(A, "tok-2").unwrap();
        assert_eq!(db.subscriptions_for(A).unwrap().len(), 2);

        // Same device re-registered by the other participant moves over.
        db.upsert_subscription(B, "tok-1").unwrap();
        let a: Vec<_> = db.subscriptions_for(A).unwrap().into_iter().map(|s| s.endpoint).collect();
        assert_eq!(a, vec!["tok-2"]);
        assert_eq!(db.subscriptions_for(B).unwrap().len(), 1);

        assert!(db.remove_subscription("tok-2").unwrap());
        assert!(!db.remove_subscription("tok-2").unwrap());
        assert!(db.subscriptions_for(A).unwrap().is_empty());
    }
}
