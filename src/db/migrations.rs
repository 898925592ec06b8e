//! Opening the database and applying schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use super::Database;

/// Latest schema version
const SCHEMA_VERSION: i64 = 2;

fn connection_failed(context: &str, e: impl Display) -> Error {
    Error::Database(DatabaseError::ConnectionFailed(format!("{context}: {e}")))
}

fn migration_failed(context: &str, e: impl Display) -> Error {
    Error::Database(DatabaseError::MigrationFailed(format!("{context}: {e}")))
}

/// Statements of each migration, applied in one transaction per version
fn statements(version: i64) -> &'static [&'static str] {
    match version {
        1 => &[
            r#"CREATE TABLE jobs (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                kind INTEGER NOT NULL,
                origin TEXT NOT NULL,
                resolved_link TEXT,
                provider_job_id TEXT,
                save_path TEXT NOT NULL,
                category TEXT,
                priority INTEGER NOT NULL DEFAULT 0,
                total_size INTEGER NOT NULL DEFAULT 0,
                downloaded_size INTEGER NOT NULL DEFAULT 0,
                state INTEGER NOT NULL DEFAULT 0,
                status_message TEXT,
                error_message TEXT,
                output_path TEXT,
                added_at INTEGER NOT NULL,
                started_at INTEGER,
                completed_at INTEGER
            )"#,
            "CREATE INDEX idx_jobs_state ON jobs(state)",
            "CREATE INDEX idx_jobs_queue ON jobs(state, priority DESC, added_at ASC)",
        ],
        // runtime flags; a fresh database counts as uncleanly shut down until started once
        2 => &[
            r#"CREATE TABLE IF NOT EXISTS runtime_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
            r#"INSERT INTO runtime_state (key, value, updated_at)
               VALUES ('clean_shutdown', 'false', strftime('%s', 'now'))"#,
        ],
        _ => &[],
    }
}

impl Database {
    /// Open (or create) the database in WAL mode and bring the schema up to date
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| connection_failed("Failed to create database directory", e))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| connection_failed("Failed to parse database path", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| connection_failed("Failed to connect to database", e))?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| connection_failed("Failed to acquire connection", e))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("Failed to create schema_version table", e))?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| migration_failed("Failed to query schema version", e))?;

        for version in current.unwrap_or(0) + 1..=SCHEMA_VERSION {
            tracing::info!(version, "Applying database migration");
            Self::apply(&mut conn, version).await?;
        }

        Ok(())
    }

    /// Run one migration and record it, rolling back on any failure
    async fn apply(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| migration_failed("Failed to begin transaction", e))?;

        let result = async {
            for statement in statements(version) {
                sqlx::query(statement)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| migration_failed(&format!("Migration v{version} failed"), e))?;
            }
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *conn)
                .await
                .map_err(|e| migration_failed("Failed to record migration", e))?;
            Ok::<(), Error>(())
        }
        .await;

        if let Err(e) = result {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(e);
        }

        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(|e| migration_failed(&format!("Failed to commit migration v{version}"), e))?;
        tracing::info!(version, "Database migration complete");
        Ok(())
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
