//! SQLite chat store implementation.

use crate::{ChatId, ChatRecord, ChatSummary, Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::debug;

/// SQLite-backed chat store.
pub struct ChatStore {
    conn: Connection,
}

impl ChatStore {
    /// Open or create a chat store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory chat store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                path TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                messages TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chats_user
                ON chats(user_id, created_at);
            "#,
        )?;
        Ok(())
    }

    /// Insert a chat, replacing any earlier version with the same id.
    pub fn save(&self, record: &ChatRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO chats (id, user_id, title, path, created_at, messages)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                title = excluded.title,
                path = excluded.path,
                created_at = excluded.created_at,
                messages = excluded.messages",
            params![
                record.id.to_string(),
                record.user_id,
                record.title,
                record.path,
                record.created_at.timestamp_millis(),
                serde_json::to_string(&record.messages)?,
            ],
        )?;
        debug!(chat = %record.id, messages = record.messages.len(), "saved chat");
        Ok(())
    }

    /// Load a chat by id.
    pub fn load(&self, id: ChatId) -> Result<ChatRecord> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, title, path, created_at, messages FROM chats WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let (user_id, title, path, created_at, messages) =
            row.ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(ChatRecord {
            id,
            title,
            user_id,
            created_at: timestamp(created_at)?,
            path,
            messages: serde_json::from_str(&messages)?,
        })
    }

    /// List a user's chats, newest first.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<ChatSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, path, created_at, json_array_length(messages) FROM chats
             WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;

        let rows = stmt
            .query_map([user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, title, path, created_at, count)| {
                Ok(ChatSummary {
                    id: parse_id(&id)?,
                    title,
                    path,
                    created_at: timestamp(created_at)?,
                    message_count: usize::try_from(count).unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Resolve an id prefix to a single chat id among a user's chats.
    pub fn resolve_prefix(&self, user_id: &str, prefix: &str) -> Result<ChatId> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM chats WHERE user_id = ?1 AND substr(id, 1, ?2) = ?3")?;
        let ids = stmt
            .query_map(params![user_id, prefix.len() as i64, prefix], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match ids.as_slice() {
            [] => Err(Error::NotFound(prefix.to_string())),
            [id] => parse_id(id),
            _ => Err(Error::Ambiguous {
                prefix: prefix.to_string(),
                matches: ids.len(),
            }),
        }
    }
}

fn parse_id(id: &str) -> Result<ChatId> {
    id.parse()
        .map_err(|e| Error::Corrupt(format!("chat id {id}: {e}")))
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::Corrupt(format!("timestamp {millis}")))
}
