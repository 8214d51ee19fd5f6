use rusqlite::Connection;

use crate::error::Result;

/// Create the messages table and its sender index.
///
/// Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            channel     TEXT NOT NULL,
            channel_id  TEXT NOT NULL,
            name        TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(channel, channel_id, created_at DESC);",
    )?;
    Ok(())
}
