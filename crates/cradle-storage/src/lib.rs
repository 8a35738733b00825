//! Cradle storage crate - SQLite persistence for the conversation transcript.
//!
//! Provides a WAL-mode SQLite database with migrations and a repository
//! that reads and writes the serialized transcript under a single key.

pub mod db;
pub mod migrations;
pub mod transcript;

pub use db::Database;
pub use transcript::{TranscriptRepository, HISTORY_KEY};
