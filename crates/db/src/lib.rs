//! Access to the app's per-account SQLite databases.
//!
//! The app owns the schema; this crate only reads and repairs the rows
//! the campaign orchestrator depends on. [`Database`] wraps a small
//! [`sqlx::SqlitePool`] for one account file, [`locator`] finds that
//! file, and [`store`] exposes the repositories behind the traits the
//! orchestrator consumes.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub mod locator;
pub mod models;
pub mod repositories;
pub mod store;

pub type DbPool = sqlx::SqlitePool;

/// Options applied when opening an account database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Open without write access (reads only; repairs will fail).
    pub read_only: bool,
}

/// An open handle on one account database.
///
/// Cloning is cheap and shares the underlying pool; [`close`](Self::close)
/// closes it for every clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
    path: Option<PathBuf>,
}

impl Database {
    /// Open an existing database file. Never creates one: the app owns it.
    pub async fn open(path: &Path, options: OpenOptions) -> Result<Self, sqlx::Error> {
        let connect = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .read_only(options.read_only)
            .busy_timeout(std::time::Duration::from_secs(5));

        // The app holds its own connections; keep ours minimal.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect)
            .await?;

        tracing::debug!(path = %path.display(), read_only = options.read_only, "Opened database");

        Ok(Self {
            pool,
            path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an already-configured pool (in-memory databases in tests).
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool, path: None }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// File backing this handle, if it was opened from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
        if let Some(path) = &self.path {
            tracing::debug!(path = %path.display(), "Closed database");
        }
    }
}
