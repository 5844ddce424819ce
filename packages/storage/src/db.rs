// ABOUTME: Database connection management and schema migrations
// ABOUTME: Opens the SQLite pool with the pragmas every service relies on

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Pool settings
#[derive(Debug, Clone)]
pub struct DbOptions {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl DbOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 10,
            busy_timeout: Duration::from_secs(30),
        }
    }

    pub fn default_path() -> PathBuf {
        stockboard_core::stockboard_dir().join("stockboard.db")
    }
}

/// Open (creating if needed) the database and bring the schema up to date
pub async fn connect(options: &DbOptions) -> StorageResult<SqlitePool> {
    if let Some(parent) = options.path.parent() {
        std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
    }

    let database_url = format!("sqlite:{}", options.path.display());
    debug!("Connecting to database: {}", database_url);

    let connect_options = SqliteConnectOptions::from_str(&database_url)
        .map_err(StorageError::Sqlx)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(options.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(options.busy_timeout)
        .connect_with(connect_options)
        .await
        .map_err(StorageError::Sqlx)?;

    info!("Database connection established");

    MIGRATOR.run(&pool).await.map_err(StorageError::Migration)?;

    debug!("Database migrations completed");

    Ok(pool)
}

/// In-memory database with migrations applied.
///
/// Single connection: code under test must route every statement of an open
/// transaction through that transaction.
#[cfg(any(test, feature = "test-utils"))]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid in-memory url")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("in-memory pool");

    MIGRATOR.run(&pool).await.expect("migrations");

    pool
}
