//! Transcript persistence.
//!
//! The full conversation is stored as one JSON array under the
//! `chat_history` key: read once at startup, rewritten after every accepted
//! append and after clear.

use std::sync::Arc;

use rusqlite::OptionalExtension;

use cradle_core::error::CradleError;
use cradle_core::types::Message;

use crate::db::Database;

/// Key under which the serialized conversation is stored.
pub const HISTORY_KEY: &str = "chat_history";

/// Repository for the persisted conversation transcript.
pub struct TranscriptRepository {
    db: Arc<Database>,
}

impl TranscriptRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Read the stored transcript. Returns `Ok(None)` when nothing has been
    /// written yet; parse failures surface as errors for the caller to handle.
    pub fn load(&self) -> Result<Option<Vec<Message>>, CradleError> {
        let raw = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                rusqlite::params![HISTORY_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| CradleError::Storage(format!("Failed to read transcript: {}", e)))
        })?;

        match raw {
            Some(json) => {
                let messages: Vec<Message> = serde_json::from_str(&json)?;
                Ok(Some(messages))
            }
            None => Ok(None),
        }
    }

    /// Write the full transcript, replacing any previous value.
    pub fn save(&self, messages: &[Message]) -> Result<(), CradleError> {
        let json = serde_json::to_string(messages)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                rusqlite::params![HISTORY_KEY, json],
            )
            .map_err(|e| CradleError::Storage(format!("Failed to save transcript: {}", e)))?;
            Ok(())
        })
    }
}
