//! Job record CRUD, state transitions and queue queries.

use crate::error::DatabaseError;
use crate::types::{JobId, State};
use crate::{Error, Result};

use super::{Database, JobRecord, NewJob};

const JOB_COLUMNS: &str = r#"
    id, name, kind, origin, resolved_link, provider_job_id, save_path,
    category, priority, total_size, downloaded_size, state, status_message,
    error_message, output_path, added_at, started_at, completed_at
"#;

fn query_failed(context: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!("{}: {}", context, e)))
}

impl Database {
    /// Insert a new job record
    ///
    /// Returns `false` without touching the existing row when a job with the same id is
    /// already stored.
    pub async fn insert_job(&self, job: &NewJob) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO jobs (
                id, name, kind, origin, save_path, category, priority,
                total_size, downloaded_size, state, added_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.name)
        .bind(job.kind.to_i32())
        .bind(&job.origin)
        .bind(&job.save_path)
        .bind(&job.category)
        .bind(job.priority as i32)
        .bind(job.total_size)
        .bind(job.state.to_i32())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to insert job", e))?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: &JobId) -> Result<Option<JobRecord>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?");
        sqlx::query_as::<_, JobRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to get job", e))
    }

    /// List all jobs, queue order (priority first, then oldest)
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY priority DESC, added_at ASC, rowid ASC"
        );
        sqlx::query_as::<_, JobRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to list jobs", e))
    }

    /// List jobs in a given state, queue order
    pub async fn list_jobs_by_state(&self, state: State) -> Result<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE state = ? \
             ORDER BY priority DESC, added_at ASC, rowid ASC"
        );
        sqlx::query_as::<_, JobRecord>(&sql)
            .bind(state.to_i32())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to list jobs by state", e))
    }

    /// Next `limit` queued jobs to promote
    pub async fn next_queued(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE state = ? \
             ORDER BY priority DESC, added_at ASC, rowid ASC LIMIT ?"
        );
        sqlx::query_as::<_, JobRecord>(&sql)
            .bind(State::Queued.to_i32())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to fetch queued jobs", e))
    }

    /// Number of jobs occupying an execution slot (Checking + Downloading)
    pub async fn count_active(&self) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE state IN (?, ?)")
                .bind(State::Checking.to_i32())
                .bind(State::Downloading.to_i32())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| query_failed("Failed to count active jobs", e))?;

        Ok(count as usize)
    }

    /// Unconditionally set the state
    #[cfg(test)]
    pub(crate) async fn update_state(&self, id: &JobId, state: State) -> Result<()> {
        sqlx::query("UPDATE jobs SET state = ? WHERE id = ?")
            .bind(state.to_i32())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to update state", e))?;

        Ok(())
    }

    /// Move a job from `from` to `to` only if it is still in `from`
    ///
    /// Returns whether the row changed. A stale task (one that lost a race against a user
    /// pause or delete) gets `false` and must stop.
    pub async fn transition_state(&self, id: &JobId, from: State, to: State) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET state = ? WHERE id = ? AND state = ?")
            .bind(to.to_i32())
            .bind(id)
            .bind(from.to_i32())
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to transition state", e))?;

        Ok(result.rows_affected() == 1)
    }

    /// Record progress; the downloaded counter never moves backwards here
    pub async fn update_progress(
        &self,
        id: &JobId,
        downloaded_size: u64,
        total_size: Option<u64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET downloaded_size = MAX(downloaded_size, ?),
                total_size = COALESCE(?, total_size)
            WHERE id = ?
            "#,
        )
        .bind(downloaded_size as i64)
        .bind(total_size.map(|t| t as i64))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to update progress", e))?;

        Ok(())
    }

    /// Zero the downloaded counter (server refused to resume)
    pub async fn reset_progress(&self, id: &JobId) -> Result<()> {
        sqlx::query("UPDATE jobs SET downloaded_size = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to reset progress", e))?;

        Ok(())
    }

    /// Set the known total size
    pub async fn set_total_size(&self, id: &JobId, total_size: u64) -> Result<()> {
        sqlx::query("UPDATE jobs SET total_size = ? WHERE id = ?")
            .bind(total_size as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to set total size", e))?;

        Ok(())
    }

    /// Store the unlocked, playable URL
    pub async fn set_resolved_link(&self, id: &JobId, link: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET resolved_link = ? WHERE id = ?")
            .bind(link)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to set resolved link", e))?;

        Ok(())
    }

    /// Rename the job (file name recovered from the server)
    pub async fn set_name(&self, id: &JobId, name: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to set name", e))?;

        Ok(())
    }

    /// Set or clear the status line
    pub async fn set_status_message(&self, id: &JobId, message: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE jobs SET status_message = ? WHERE id = ?")
            .bind(message)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to set status message", e))?;

        Ok(())
    }

    /// Store the provider-side id of a submitted torrent
    pub async fn set_provider_job_id(&self, id: &JobId, provider_job_id: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET provider_job_id = ? WHERE id = ?")
            .bind(provider_job_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to set provider job id", e))?;

        Ok(())
    }

    /// Record the first pick-up time (kept across pause/resume)
    pub async fn set_started(&self, id: &JobId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE jobs SET started_at = COALESCE(started_at, ?) WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to set started time", e))?;

        Ok(())
    }

    /// Mark a Checking or Downloading job as failed
    ///
    /// Returns `false` when the job has meanwhile been paused or removed.
    pub async fn fail_job(&self, id: &JobId, error: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, error_message = ?, completed_at = ?
            WHERE id = ? AND state IN (?, ?)
            "#,
        )
        .bind(State::Error.to_i32())
        .bind(error)
        .bind(now)
        .bind(id)
        .bind(State::Checking.to_i32())
        .bind(State::Downloading.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to mark job failed", e))?;

        Ok(result.rows_affected() == 1)
    }

    /// Mark a Downloading job as completed
    ///
    /// A job paused after its transfer already moved into place is completed as well.
    /// `downloaded_size` is raised to the final size so a finished job always reports
    /// `downloaded == total`.
    pub async fn complete_job(&self, id: &JobId, output_path: &str, final_size: u64) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, output_path = ?, completed_at = ?,
                total_size = MAX(total_size, ?),
                downloaded_size = MAX(total_size, ?),
                status_message = NULL, error_message = NULL
            WHERE id = ? AND state IN (?, ?)
            "#,
        )
        .bind(State::Completed.to_i32())
        .bind(output_path)
        .bind(now)
        .bind(final_size as i64)
        .bind(final_size as i64)
        .bind(id)
        .bind(State::Downloading.to_i32())
        .bind(State::Paused.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to mark job completed", e))?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a job record
    pub async fn delete_job(&self, id: &JobId) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to delete job", e))?;

        Ok(())
    }

    /// Put jobs interrupted mid-flight (Checking, Downloading) back in the queue
    ///
    /// Returns the number of jobs reset.
    pub async fn reset_interrupted(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE jobs SET state = ? WHERE state IN (?, ?)")
            .bind(State::Queued.to_i32())
            .bind(State::Checking.to_i32())
            .bind(State::Downloading.to_i32())
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to reset interrupted jobs", e))?;

        Ok(result.rows_affected())
    }
}
