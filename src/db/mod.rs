//! Database layer for debrid-dl
//!
//! SQLite persistence for job records and runtime state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`jobs`]: Job record CRUD, compare-and-set state transitions, queue queries
//! - [`state`]: Runtime state (shutdown tracking)

use crate::types::{JobId, JobKind, Priority, State};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod jobs;
mod migrations;
mod state;

/// New job to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Content-derived id
    pub id: JobId,
    /// Display name
    pub name: String,
    /// Direct link or real torrent
    pub kind: JobKind,
    /// URL for direct links, info-hash for torrents
    pub origin: String,
    /// Destination directory
    pub save_path: String,
    /// Category label
    pub category: Option<String>,
    /// Job priority
    pub priority: Priority,
    /// Known total size in bytes (0 if unknown)
    pub total_size: i64,
    /// Initial state (Queued or Paused)
    pub state: State,
}

/// Job record from database
#[derive(Debug, Clone, FromRow)]
pub struct JobRecord {
    /// Content-derived id
    pub id: JobId,
    /// Display name
    pub name: String,
    /// Job kind code (see [`JobKind::to_i32`])
    pub kind: i32,
    /// URL for direct links, info-hash for torrents
    pub origin: String,
    /// Playable URL once a provider has unlocked the link
    pub resolved_link: Option<String>,
    /// Provider-side id of a submitted torrent
    pub provider_job_id: Option<String>,
    /// Destination directory
    pub save_path: String,
    /// Category label
    pub category: Option<String>,
    /// Job priority (higher values start first)
    pub priority: i32,
    /// Total size in bytes (0 if unknown)
    pub total_size: i64,
    /// Bytes downloaded so far
    pub downloaded_size: i64,
    /// State code (see [`State::to_i32`])
    pub state: i32,
    /// Last status line
    pub status_message: Option<String>,
    /// Error message if the job failed
    pub error_message: Option<String>,
    /// Final file or extraction folder
    pub output_path: Option<String>,
    /// Unix timestamp when the job was added
    pub added_at: i64,
    /// Unix timestamp when the job was first picked up
    pub started_at: Option<i64>,
    /// Unix timestamp when the job reached a terminal state
    pub completed_at: Option<i64>,
}

impl JobRecord {
    /// Decoded state
    pub fn state(&self) -> State {
        State::from_i32(self.state)
    }

    /// Decoded kind
    pub fn kind(&self) -> JobKind {
        JobKind::from_i32(self.kind)
    }

    /// Decoded priority
    pub fn priority(&self) -> Priority {
        Priority::from_i32(self.priority)
    }

    /// Destination directory as a path
    pub fn save_path(&self) -> PathBuf {
        PathBuf::from(&self.save_path)
    }

    /// Total size if known
    pub fn known_total(&self) -> Option<u64> {
        (self.total_size > 0).then_some(self.total_size as u64)
    }
}

pub(crate) fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

/// Database handle for debrid-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
