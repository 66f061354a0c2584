use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("DB: running migration v1 (messages, subscriptions)");
        conn.execute_batch(
            "
            CREATE TABLE messages (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT NOT NULL UNIQUE,
                text            TEXT,
                image           TEXT,
                sender_id       TEXT NOT NULL,
                sender_name     TEXT NOT NULL,
                seen            INTEGER NOT NULL DEFAULT 0,
                reply_to        TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_unseen
                ON messages(seen, sender_id);

            CREATE TABLE subscriptions (
                endpoint        TEXT PRIMARY KEY,
                participant_id  TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_subscriptions_participant
                ON subscriptions(participant_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
