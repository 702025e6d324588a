//! Database models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Folder or saved search owned by a user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MailboxRow {
    pub owner_uid: String,
    pub name: String,
    pub is_query: bool,
}
