//! Job listing with live transfer progress merged in.

use crate::db::{JobRecord, timestamp_to_datetime};
use crate::error::{JobError, Result};
use crate::transfer::TransferSnapshot;
use crate::types::{JobId, JobInfo, QueueStats, State};
use std::path::PathBuf;

use super::DebridDownloader;

fn job_info(record: JobRecord, live: Option<TransferSnapshot>) -> JobInfo {
    let state = record.state();
    let stored_total = record.known_total();
    let stored_downloaded = record.downloaded_size.max(0) as u64;

    let (downloaded, total, speed) = match live {
        Some(snapshot) if state != State::Completed => (
            snapshot.downloaded_bytes,
            snapshot.total_bytes.or(stored_total),
            snapshot.speed_bps,
        ),
        _ => (stored_downloaded, stored_total, 0),
    };

    let progress = match (state, total) {
        (State::Completed, _) => 100.0,
        (_, Some(total)) if total > 0 => (downloaded as f64 / total as f64 * 100.0).min(100.0) as f32,
        _ => live.map(|s| s.percent).unwrap_or(0.0),
    };

    let eta_seconds = match total {
        Some(total) if speed > 0 && total > downloaded => Some((total - downloaded) / speed),
        _ => None,
    };

    JobInfo {
        id: record.id.clone(),
        kind: record.kind(),
        priority: record.priority(),
        save_path: record.save_path(),
        name: record.name,
        category: record.category,
        state,
        progress,
        speed_bps: speed,
        total_bytes: total.unwrap_or(0),
        downloaded_bytes: downloaded,
        eta_seconds,
        output_path: record.output_path.map(PathBuf::from),
        status_message: record.status_message,
        error_message: record.error_message,
        added_at: timestamp_to_datetime(record.added_at),
        started_at: record.started_at.map(timestamp_to_datetime),
        completed_at: record.completed_at.map(timestamp_to_datetime),
    }
}

impl DebridDownloader {
    async fn with_progress(&self, record: JobRecord) -> JobInfo {
        let live = self.engine.snapshot(&record.id).await;
        job_info(record, live)
    }

    /// List jobs in queue order, optionally only those in `state`
    pub async fn list(&self, state: Option<State>) -> Result<Vec<JobInfo>> {
        let records = match state {
            Some(state) => self.db.list_jobs_by_state(state).await?,
            None => self.db.list_jobs().await?,
        };

        let mut jobs = Vec::with_capacity(records.len());
        for record in records {
            jobs.push(self.with_progress(record).await);
        }
        Ok(jobs)
    }

    /// Get one job
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`] if the job doesn't exist.
    pub async fn get(&self, id: &JobId) -> Result<JobInfo> {
        let record = self
            .db
            .get_job(id)
            .await?
            .ok_or_else(|| JobError::NotFound { id: id.to_string() })?;
        Ok(self.with_progress(record).await)
    }

    /// Counts per state and the combined speed of running transfers
    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let jobs = self.list(None).await?;
        let count = |state: State| jobs.iter().filter(|job| job.state == state).count();

        Ok(QueueStats {
            total: jobs.len(),
            queued: count(State::Queued),
            checking: count(State::Checking),
            downloading: count(State::Downloading),
            paused: count(State::Paused),
            completed: count(State::Completed),
            failed: count(State::Error),
            total_speed_bps: jobs.iter().map(|job| job.speed_bps).sum(),
            accepting_new: self.is_accepting(),
        })
    }
}
