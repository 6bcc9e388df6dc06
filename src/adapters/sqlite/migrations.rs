//! Schema versioning for the shared record store.
//!
//! The applied version lives in SQLite's `user_version` header field. All
//! three actors call [`migrate`] on startup, so the check and the upgrade run
//! inside one `BEGIN IMMEDIATE` transaction: the first process to take the
//! write lock upgrades the file and the others find it already current.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};

/// One forward-only schema step.
#[derive(Debug, Clone, Copy)]
pub struct SchemaStep {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Every step this build knows, in version order.
pub const SCHEMA: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "record store: requirements, queues, findings, trace matrix, ledger, coordination",
    sql: include_str!("../../../migrations/001_initial_schema.sql"),
}];

/// Version a fully migrated store reports.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Could not take the schema write lock: {0}")]
    Lock(#[source] sqlx::Error),
    #[error("Could not read the store's schema version: {0}")]
    Version(#[source] sqlx::Error),
    #[error("Schema step {version} ({name}) failed: {source}")]
    Step {
        version: u32,
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("Record store is at schema version {found}; this build only knows up to {known}")]
    StoreTooNew { found: u32, known: u32 },
}

/// What a [`migrate`] call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
    pub applied: Vec<u32>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Bring the store up to [`SCHEMA_VERSION`].
pub async fn migrate(pool: &SqlitePool) -> Result<MigrationReport, MigrationError> {
    let mut conn = pool.acquire().await.map_err(MigrationError::Lock)?;
    sqlx::raw_sql("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .map_err(MigrationError::Lock)?;

    match upgrade(&mut conn).await {
        Ok(report) => {
            sqlx::raw_sql("COMMIT")
                .execute(&mut *conn)
                .await
                .map_err(MigrationError::Lock)?;
            if report.is_noop() {
                debug!(version = report.to, "schema current");
            } else {
                info!(from = report.from, to = report.to, "schema upgraded");
            }
            Ok(report)
        }
        Err(err) => {
            if let Err(rollback) = sqlx::raw_sql("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %rollback, "schema rollback failed");
            }
            Err(err)
        }
    }
}

/// Read the version recorded in the store header.
pub async fn stored_version(conn: &mut SqliteConnection) -> Result<u32, MigrationError> {
    let raw: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await
        .map_err(MigrationError::Version)?;
    Ok(u32::try_from(raw).unwrap_or(0))
}

async fn upgrade(conn: &mut SqliteConnection) -> Result<MigrationReport, MigrationError> {
    let from = stored_version(conn).await?;
    if from > SCHEMA_VERSION {
        return Err(MigrationError::StoreTooNew { found: from, known: SCHEMA_VERSION });
    }

    let mut applied = Vec::new();
    for step in SCHEMA.iter().filter(|s| s.version > from) {
        let fail = |source| MigrationError::Step { version: step.version, name: step.name, source };
        sqlx::raw_sql(step.sql).execute(&mut *conn).await.map_err(fail)?;
        // PRAGMA takes no bind parameters; the version is a trusted constant.
        sqlx::raw_sql(&format!("PRAGMA user_version = {}", step.version))
            .execute(&mut *conn)
            .await
            .map_err(fail)?;
        debug!(version = step.version, name = step.name, "schema step applied");
        applied.push(step.version);
    }

    let to = applied.last().copied().unwrap_or(from);
    Ok(MigrationReport { from, to, applied })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::memory_store;

    #[test]
    fn test_schema_steps_are_ordered() {
        assert!(SCHEMA.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(SCHEMA.last().map(|s| s.version), Some(SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn test_fresh_store_starts_in_bootstrap() {
        let pool = memory_store().await.unwrap();

        let first = migrate(&pool).await.unwrap();
        assert_eq!(first, MigrationReport { from: 0, to: SCHEMA_VERSION, applied: vec![1] });
        assert!(migrate(&pool).await.unwrap().is_noop());

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(stored_version(&mut conn).await.unwrap(), SCHEMA_VERSION);
        let (phase,): (String,) = sqlx::query_as("SELECT phase FROM phase_state WHERE id = 1")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(phase, "BOOTSTRAP");
    }

    #[tokio::test]
    async fn test_store_from_a_newer_build_is_refused() {
        let pool = memory_store().await.unwrap();
        sqlx::raw_sql("PRAGMA user_version = 42").execute(&pool).await.unwrap();

        let err = migrate(&pool).await.unwrap_err();
        assert!(matches!(err, MigrationError::StoreTooNew { found: 42, known: SCHEMA_VERSION }));

        let (tables,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE name = 'requirements'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(tables, 0);
    }
}
