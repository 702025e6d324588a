//! Folder directory repository

use crate::db::DatabasePool;
use crate::models::MailboxRow;
use impmail_common::{Error, Result};

/// Database-backed folder and saved-search directory
pub struct MailboxDirectory {
    pool: DatabasePool,
}

impl MailboxDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// All folders and saved searches owned by `uid`
    pub async fn list(&self, uid: &str) -> Result<Vec<MailboxRow>> {
        sqlx::query_as::<_, MailboxRow>(
            "SELECT owner_uid, name, is_query FROM impmail_mailboxes WHERE owner_uid = $1 ORDER BY name ASC",
        )
        .bind(uid)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
