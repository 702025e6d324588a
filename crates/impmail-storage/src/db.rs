//! PostgreSQL pool behind the preference and mailbox tables

use impmail_common::config::DatabaseConfig;
use impmail_common::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Shared connection pool. Clones hand out the same connections.
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open the pool described by `[database]`
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = connection_url(config)?;

        info!(
            backend = %config.backend,
            max_connections = config.max_connections,
            "Opening preference database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect(url)
            .await
            .map_err(|e| Error::Database(format!("cannot open {}: {}", config.backend, e)))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create or update the `impmail_prefs` and `impmail_mailboxes` tables
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("schema migration failed: {}", e)))?;

        debug!("Preference schema is current");
        Ok(())
    }

    /// Round-trip one query. Maintenance passes call this before touching
    /// any user.
    pub async fn ping(&self) -> Result<()> {
        let one: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("database unreachable: {}", e)))?;
        debug!(reply = one, "Database answered");
        Ok(())
    }
}

/// URL for the configured backend. Only PostgreSQL is wired up.
fn connection_url(config: &DatabaseConfig) -> Result<&str> {
    match (config.backend.as_str(), config.url.as_deref()) {
        ("postgres", Some(url)) if !url.trim().is_empty() => Ok(url),
        ("postgres", _) => Err(Error::Config(
            "[database] url is required for postgres".to_string(),
        )),
        (other, _) => Err(Error::Config(format!(
            "unsupported database backend '{}'",
            other
        ))),
    }
}
