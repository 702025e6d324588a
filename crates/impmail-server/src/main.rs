//! impmail - preference maintenance entry point

use anyhow::{bail, Context, Result};
use impmail_common::config::{Config, LoggingConfig};
use impmail_core::prefs::SORTPREF;
use impmail_core::{Hooks, MailboxList, RequestContext};
use impmail_storage::{DatabasePool, DbPrefs, MailboxDirectory};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "usage: impmail <upgrade|gc>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Rewrite legacy sort codes in stored sort preferences
    Upgrade,
    /// Drop sort preferences of deleted folders and saved searches
    Gc,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg {
            Some("upgrade") => Ok(Command::Upgrade),
            Some("gc") => Ok(Command::Gc),
            Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
            None => bail!(USAGE),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let arg = std::env::args().nth(1);
    let command = Command::parse(arg.as_deref())?;

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!(command = ?command, "Starting impmail maintenance");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database)
        .await
        .context("failed to connect to the database")?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // Check connectivity before the per-user loop
    db_pool
        .ping()
        .await
        .context("database health check failed")?;

    let users = DbPrefs::users_with(&db_pool, &config.prefs.scope, SORTPREF).await?;
    info!(users = users.len(), "Users with stored sort preferences");

    let mut failures = 0usize;
    for uid in &users {
        let result = match command {
            Command::Upgrade => upgrade_user(&config, &db_pool, uid).await,
            Command::Gc => gc_user(&config, &db_pool, uid).await,
        };
        if let Err(e) = result {
            error!(uid = %uid, error = %e, "Maintenance failed");
            failures += 1;
        }
    }

    if failures > 0 {
        warn!(failures, "Maintenance finished with errors");
        bail!("{} of {} users failed", failures, users.len());
    }

    info!("impmail maintenance complete");

    Ok(())
}

fn user_context(
    config: &Config,
    db_pool: &DatabasePool,
    uid: &str,
    mailboxes: MailboxList,
) -> RequestContext {
    RequestContext::new(
        Arc::new(DbPrefs::new(db_pool.clone(), uid, &config.prefs)),
        Hooks::none(),
        Arc::new(mailboxes),
        config.server.hostname.clone(),
    )
}

async fn upgrade_user(config: &Config, db_pool: &DatabasePool, uid: &str) -> Result<()> {
    let ctx = user_context(config, db_pool, uid, MailboxList::new());
    let mut sort = ctx.sort_prefs().await?;
    if sort.upgrade().await? {
        info!(uid = %uid, entries = sort.len(), "Upgraded sort preferences");
    }
    Ok(())
}

async fn gc_user(config: &Config, db_pool: &DatabasePool, uid: &str) -> Result<()> {
    let rows = MailboxDirectory::new(db_pool.clone()).list(uid).await?;
    let ctx = user_context(config, db_pool, uid, MailboxList::from_rows(rows));
    let removed = ctx.gc_sort_prefs().await?;
    if removed > 0 {
        info!(uid = %uid, removed, "Purged stale sort preferences");
    }
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},impmail=debug", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
