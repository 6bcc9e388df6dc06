//! Pools over the shared record store.
//!
//! The owner and both producers run as separate short-lived processes
//! against one SQLite file, so every pool opens it in WAL mode and waits on
//! a busy database instead of failing the invocation.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::DatabaseConfig;

/// How long a writer waits for another actor's transaction to finish.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to open record store at {url}: {source}")]
    OpenFailed {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
    #[error("Failed to create database directory {path}: {source}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Record store did not answer: {0}")]
    Unreachable(#[source] sqlx::Error),
}

/// Open (creating if needed) the record store described by `config`.
pub async fn open_store(config: &DatabaseConfig) -> Result<SqlitePool, ConnectionError> {
    let url = config.url();
    if let Some(parent) = Path::new(&config.path).parent() {
        ensure_dir(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&url)
        .map_err(|_| ConnectionError::InvalidDatabaseUrl(url.clone()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|source| ConnectionError::OpenFailed { url, source })
}

/// Private in-memory store on a single pinned connection.
///
/// Every connection to `:memory:` is a separate database, so the pool never
/// grows past one and never recycles it.
pub async fn memory_store() -> Result<SqlitePool, ConnectionError> {
    let url = "sqlite::memory:";
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|_| ConnectionError::InvalidDatabaseUrl(url.to_string()))?
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|source| ConnectionError::OpenFailed { url: url.to_string(), source })
}

fn ensure_dir(dir: &Path) -> Result<(), ConnectionError> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| ConnectionError::DirectoryCreationFailed {
        path: dir.display().to_string(),
        source,
    })
}

pub async fn ping(pool: &SqlitePool) -> Result<(), ConnectionError> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(ConnectionError::Unreachable)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_store_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("triad.db");
        let config = DatabaseConfig {
            path: db_path.display().to_string(),
            max_connections: 2,
        };

        let pool = open_store(&config).await.unwrap();
        ping(&pool).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_memory_store_is_usable() {
        let pool = memory_store().await.unwrap();
        ping(&pool).await.unwrap();
    }
}
