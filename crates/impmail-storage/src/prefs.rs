//! Preference backends
//!
//! A backend holds one user's preferences within an application scope. Each
//! preference has a factory default; a value is "default" until the user
//! stores their own. Locked preferences cannot be changed by the user.

use crate::db::DatabasePool;
use async_trait::async_trait;
use impmail_common::config::PrefsConfig;
use impmail_common::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Preference backend trait
#[async_trait]
pub trait PrefsBackend: Send + Sync {
    /// Current value: the user's own, else the factory default. `None` for
    /// unknown preferences.
    async fn get_value(&self, name: &str) -> Result<Option<String>>;

    /// Store a value. Returns false, without writing, when the preference is
    /// locked.
    async fn set_value(&self, name: &str, value: &str) -> Result<bool>;

    /// True while the user has never stored their own value
    async fn is_default(&self, name: &str) -> Result<bool>;

    /// True when users may not change the preference
    fn is_locked(&self, name: &str) -> bool;
}

/// In-memory backend
pub struct MemoryPrefs {
    defaults: BTreeMap<String, String>,
    locked: HashSet<String>,
    values: RwLock<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryPrefs {
    /// Create a backend with the given defaults and locked names
    pub fn new(defaults: BTreeMap<String, String>, locked: impl IntoIterator<Item = String>) -> Self {
        Self {
            defaults,
            locked: locked.into_iter().collect(),
            values: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Create a backend from configuration
    pub fn from_config(config: &PrefsConfig) -> Self {
        Self::new(config.default_values(), config.locked.iter().cloned())
    }

    /// Preload a user value (not counted as a write)
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.get_mut().insert(name.into(), value.into());
        self
    }

    /// Number of successful `set_value` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The stored user value, ignoring defaults
    pub async fn stored_value(&self, name: &str) -> Option<String> {
        self.values.read().await.get(name).cloned()
    }
}

impl Default for MemoryPrefs {
    fn default() -> Self {
        Self::from_config(&PrefsConfig::default())
    }
}

#[async_trait]
impl PrefsBackend for MemoryPrefs {
    async fn get_value(&self, name: &str) -> Result<Option<String>> {
        if let Some(value) = self.values.read().await.get(name) {
            return Ok(Some(value.clone()));
        }
        Ok(self.defaults.get(name).cloned())
    }

    async fn set_value(&self, name: &str, value: &str) -> Result<bool> {
        if self.is_locked(name) {
            debug!(pref = %name, "Ignoring write to locked preference");
            return Ok(false);
        }

        self.values
            .write()
            .await
            .insert(name.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(true)
    }

    async fn is_default(&self, name: &str) -> Result<bool> {
        Ok(!self.values.read().await.contains_key(name))
    }

    fn is_locked(&self, name: &str) -> bool {
        self.locked.contains(name)
    }
}

/// PostgreSQL backend for one user
pub struct DbPrefs {
    pool: DatabasePool,
    uid: String,
    scope: String,
    defaults: BTreeMap<String, String>,
    locked: HashSet<String>,
}

impl DbPrefs {
    /// Create a backend for `uid`
    pub fn new(pool: DatabasePool, uid: impl Into<String>, config: &PrefsConfig) -> Self {
        Self {
            pool,
            uid: uid.into(),
            scope: config.scope.clone(),
            defaults: config.default_values(),
            locked: config.locked.iter().cloned().collect(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Users that have stored their own value for `name`
    pub async fn users_with(pool: &DatabasePool, scope: &str, name: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT pref_uid FROM impmail_prefs WHERE pref_scope = $1 AND pref_name = $2 ORDER BY pref_uid",
        )
        .bind(scope)
        .bind(name)
        .fetch_all(pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(uid,)| uid).collect())
    }

    async fn stored(&self, name: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT pref_value FROM impmail_prefs
            WHERE pref_uid = $1 AND pref_scope = $2 AND pref_name = $3
            "#,
        )
        .bind(&self.uid)
        .bind(&self.scope)
        .bind(name)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.map(|(value,)| value))
    }
}

#[async_trait]
impl PrefsBackend for DbPrefs {
    async fn get_value(&self, name: &str) -> Result<Option<String>> {
        match self.stored(name).await? {
            Some(value) => Ok(Some(value)),
            None => Ok(self.defaults.get(name).cloned()),
        }
    }

    async fn set_value(&self, name: &str, value: &str) -> Result<bool> {
        if self.is_locked(name) {
            debug!(pref = %name, uid = %self.uid, "Ignoring write to locked preference");
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO impmail_prefs (pref_uid, pref_scope, pref_name, pref_value, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (pref_uid, pref_scope, pref_name)
            DO UPDATE SET pref_value = EXCLUDED.pref_value, updated_at = NOW()
            "#,
        )
        .bind(&self.uid)
        .bind(&self.scope)
        .bind(name)
        .bind(value)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!(pref = %name, uid = %self.uid, size = value.len(), "Stored preference");

        Ok(true)
    }

    async fn is_default(&self, name: &str) -> Result<bool> {
        Ok(self.stored(name).await?.is_none())
    }

    fn is_locked(&self, name: &str) -> bool {
        self.locked.contains(name)
    }
}

/// Create the configured backend for `uid`
pub fn create_prefs(
    config: &PrefsConfig,
    pool: Option<&DatabasePool>,
    uid: &str,
) -> Result<Arc<dyn PrefsBackend>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryPrefs::from_config(config))),
        "postgres" => {
            let pool = pool.ok_or_else(|| {
                Error::Config("The postgres preference backend needs a database".to_string())
            })?;
            Ok(Arc::new(DbPrefs::new(pool.clone(), uid, config)))
        }
        other => Err(Error::Config(format!(
            "Unsupported preference backend: {}",
            other
        ))),
    }
}
