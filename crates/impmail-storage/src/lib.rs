//! impmail Storage - Preference backends and database access
//!
//! This crate provides the preference backend abstraction used by the
//! preference stores, with an in-memory backend and a PostgreSQL backend.

pub mod db;
pub mod mailboxes;
pub mod models;
pub mod prefs;

pub use db::DatabasePool;
pub use mailboxes::MailboxDirectory;
pub use models::MailboxRow;
pub use prefs::{create_prefs, DbPrefs, MemoryPrefs, PrefsBackend};
