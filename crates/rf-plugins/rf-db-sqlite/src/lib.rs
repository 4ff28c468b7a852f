//! # rf-db-sqlite Implementation
//!
//! This crate implements the data mapping between the SQLite relational model
//! and the `rf-core` domain models. One `SqliteForumRepo` implements every
//! repository port; each port lives in its own module.
//!
//! # Developer Note
//! Every multi-statement mutation opens its transaction with a write. SQLite
//! then takes the writer lock before anything is read, so two conflicting
//! requests serialise instead of acting on a stale snapshot.

mod content;
mod identities;
mod notifications;
mod reports;
mod sessions;
mod votes;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use rf_core::error::AppError;
use rf_core::models::Target;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{error, info};
use uuid::Uuid;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteForumRepo {
    pool: SqlitePool,
}

impl SqliteForumRepo {
    /// Opens (creating if needed) the database at `url` and applies migrations.
    pub async fn new(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid sqlite url '{url}'"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .context("failed to open sqlite pool")?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database. A single connection that never recycles,
    /// since each SQLite connection would otherwise see its own empty database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("invalid in-memory url")?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("failed to open in-memory sqlite")?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to apply migrations")?;
        info!("sqlite schema is up to date");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Logs the driver error with context and returns the opaque storage error.
pub(crate) fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| {
        error!(error = %err, operation, "database operation failed");
        AppError::storage(operation)
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}

/// Wraps a domain parse failure so row mappers can stay in `sqlx::Result`.
pub(crate) fn decode_error(err: AppError) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

/// Rebuilds a `Target` from the nullable column pair.
pub(crate) fn target_from_columns(
    post_id: Option<Uuid>,
    comment_id: Option<Uuid>,
) -> sqlx::Result<Target> {
    Target::from_refs(post_id, comment_id)
        .map_err(decode_error)?
        .ok_or_else(|| decode_error(AppError::ValidationError("row has no target".into())))
}
