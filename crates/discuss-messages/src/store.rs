use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use discuss_core::Channel;
use rusqlite::Connection;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{MessageStoreError, Result};
use crate::types::MessageRecord;

/// Thread-safe handle to the message log.
///
/// A single SQLite connection behind a `Mutex`; every call is short and
/// synchronous.
pub struct MessageStore {
    db: Mutex<Connection>,
}

impl MessageStore {
    /// Wrap an already-open, [`init_db`](crate::db::init_db)-initialised connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| MessageStoreError::Poisoned)
    }

    /// Persist one inbound prompt and return the stored record.
    #[instrument(skip(self, name), fields(channel = %channel))]
    pub fn record(
        &self,
        channel: Channel,
        channel_id: &str,
        name: Option<&str>,
    ) -> Result<MessageRecord> {
        // fixed-width timestamps so text ordering matches time ordering
        let now = Utc::now();
        let record = MessageRecord {
            id: Uuid::now_v7().to_string(),
            channel,
            channel_id: channel_id.to_string(),
            name: name.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        self.conn()?.execute(
            "INSERT INTO messages (id, channel, channel_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![
                record.id,
                channel.as_str(),
                record.channel_id,
                record.name,
                now.to_rfc3339_opts(SecondsFormat::Nanos, true)
            ],
        )?;

        debug!(id = %record.id, "message recorded");
        Ok(record)
    }

    /// How many prompts `channel_id` has sent on `channel`.
    #[instrument(skip(self), fields(channel = %channel))]
    pub fn count_for_sender(&self, channel: Channel, channel_id: &str) -> Result<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM messages WHERE channel = ?1 AND channel_id = ?2",
            rusqlite::params![channel.as_str(), channel_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// The most recent prompts across all senders, newest first.
    #[instrument(skip(self))]
    pub fn recent(&self, limit: usize) -> Result<Vec<MessageRecord>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT id, channel, channel_id, name, created_at, updated_at
             FROM messages
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
            Ok(RawRow {
                id: row.get(0)?,
                channel: row.get(1)?,
                channel_id: row.get(2)?,
                name: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }
}

/// Column values as stored, before parsing.
struct RawRow {
    id: String,
    channel: String,
    channel_id: String,
    name: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn into_record(self) -> Result<MessageRecord> {
        let corrupt = |reason: String| MessageStoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };
        let channel = self.channel.parse::<Channel>().map_err(corrupt)?;
        let created_at = parse_time(&self.created_at).map_err(corrupt)?;
        let updated_at = parse_time(&self.updated_at).map_err(corrupt)?;
        Ok(MessageRecord {
            id: self.id,
            channel,
            channel_id: self.channel_id,
            name: self.name,
            created_at,
            updated_at,
        })
    }
}

fn parse_time(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn store() -> MessageStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        MessageStore::new(conn)
    }

    #[test]
    fn record_returns_persisted_row() {
        let store = store();
        let rec = store
            .record(Channel::Whatsapp, "237670000000", Some("Alice"))
            .unwrap();
        assert_eq!(rec.channel, Channel::Whatsapp);
        assert_eq!(rec.created_at, rec.updated_at);

        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, rec.id);
        assert_eq!(recent[0].name.as_deref(), Some("Alice"));
    }

    #[test]
    fn count_is_per_channel_and_sender() {
        let store = store();
        store.record(Channel::Sms, "+1555", None).unwrap();
        store.record(Channel::Sms, "+1555", None).unwrap();
        store.record(Channel::Sms, "+1999", None).unwrap();
        store.record(Channel::Whatsapp, "+1555", None).unwrap();

        assert_eq!(store.count_for_sender(Channel::Sms, "+1555").unwrap(), 2);
        assert_eq!(store.count_for_sender(Channel::Whatsapp, "+1555").unwrap(), 1);
        assert_eq!(store.count_for_sender(Channel::Email, "+1555").unwrap(), 0);
    }

    #[test]
    fn recent_is_newest_first_and_limited() {
        let store = store();
        let first = store.record(Channel::Sms, "+1", None).unwrap();
        let second = store.record(Channel::Sms, "+2", None).unwrap();
        let third = store.record(Channel::Sms, "+3", None).unwrap();

        let recent = store.recent(2).unwrap();
        let ids: Vec<_> = recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, [third.id.as_str(), second.id.as_str()]);
        assert!(!ids.contains(&first.id.as_str()));
    }

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }

    #[test]
    fn corrupt_channel_is_reported() {
        let store = store();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO messages VALUES ('x', 'fax', '+1', NULL, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        let err = store.recent(1).unwrap_err();
        assert!(matches!(err, MessageStoreError::Corrupt { ref id, .. } if id == "x"));
    }
}
