//! Job control: pause, resume, delete.

use crate::error::{Error, JobError, Result};
use crate::types::{Event, JobId, State};
use std::path::Path;

use super::DebridDownloader;

/// Re-reads allowed when a job changes state under a control operation
const MAX_TRANSITION_ATTEMPTS: usize = 5;

fn invalid_state(id: &JobId, operation: &str, state: State) -> Error {
    Error::Job(JobError::InvalidState {
        id: id.to_string(),
        operation: operation.to_string(),
        current_state: state.as_str().to_string(),
    })
}

fn not_found(id: &JobId) -> Error {
    Error::Job(JobError::NotFound { id: id.to_string() })
}

/// Apply `op` to every id, returning the first error after trying them all
async fn for_each<'a, F, Fut>(ids: &'a [JobId], operation: &str, mut op: F) -> Result<()>
where
    F: FnMut(&'a JobId) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let mut first_error = None;
    for id in ids {
        if let Err(e) = op(id).await {
            tracing::warn!(job_id = %id, operation, error = %e, "Job control failed");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

impl DebridDownloader {
    /// Pause jobs
    ///
    /// Every id is attempted; the first error is returned afterwards.
    pub async fn pause(&self, ids: &[JobId]) -> Result<()> {
        for_each(ids, "pause", |id| self.pause_job(id)).await
    }

    /// Resume paused jobs
    pub async fn resume(&self, ids: &[JobId]) -> Result<()> {
        for_each(ids, "resume", |id| self.resume_job(id)).await
    }

    /// Delete jobs, optionally with their downloaded files
    pub async fn delete(&self, ids: &[JobId], delete_files: bool) -> Result<()> {
        for_each(ids, "delete", |id| self.delete_job(id, delete_files)).await
    }

    /// Pause a job
    ///
    /// A running transfer is killed and its partial file kept, so resuming continues
    /// with a range request. A job being resolved is paused right away and resolution
    /// abandoned. Pausing a paused job is a no-op.
    ///
    /// # Errors
    ///
    /// - [`JobError::NotFound`] if the job doesn't exist
    /// - [`JobError::InvalidState`] if the job is finished, or its file is already
    ///   being moved or extracted
    pub async fn pause_job(&self, id: &JobId) -> Result<()> {
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let job = self.db.get_job(id).await?.ok_or_else(|| not_found(id))?;
            let state = job.state();

            match state {
                State::Paused => return Ok(()),
                State::Downloading if self.engine.is_post_processing(id).await => {
                    return Err(Error::Job(JobError::InvalidState {
                        id: id.to_string(),
                        operation: "pause".to_string(),
                        current_state: "moving".to_string(),
                    }));
                }
                state if !state.can_transition_to(State::Paused) => {
                    return Err(invalid_state(id, "pause", state));
                }
                _ => {}
            }

            if !self.db.transition_state(id, state, State::Paused).await? {
                continue;
            }

            if let Some(cancel) = self.queue_state.processing.lock().await.remove(id) {
                cancel.cancel();
            }
            if let Some(snapshot) = self.engine.snapshot(id).await {
                self.db
                    .update_progress(id, snapshot.downloaded_bytes, snapshot.total_bytes)
                    .await?;
            }
            self.engine.pause(id).await;

            tracing::info!(job_id = %id, from = state.as_str(), "Job paused");
            self.emit_event(Event::Paused { id: id.clone() });

            if state.is_active() {
                self.kick_queue().await;
            }
            return Ok(());
        }

        Err(Error::Other(format!(
            "job {id} kept changing state, pause not applied"
        )))
    }

    /// Resume a paused job
    ///
    /// The job goes back to the queue; the scheduler restarts it when a slot is free.
    /// Resuming a job that is queued or running is a no-op.
    ///
    /// # Errors
    ///
    /// - [`JobError::NotFound`] if the job doesn't exist
    /// - [`JobError::InvalidState`] if the job is finished
    pub async fn resume_job(&self, id: &JobId) -> Result<()> {
        let job = self.db.get_job(id).await?.ok_or_else(|| not_found(id))?;

        match job.state() {
            State::Paused => {}
            State::Queued | State::Checking | State::Downloading => return Ok(()),
            state @ (State::Completed | State::Error) => {
                return Err(invalid_state(id, "resume", state));
            }
        }

        if !self
            .db
            .transition_state(id, State::Paused, State::Queued)
            .await?
        {
            // resumed concurrently
            return Ok(());
        }

        tracing::info!(job_id = %id, "Job resumed");
        self.emit_event(Event::Resumed { id: id.clone() });
        self.kick_queue().await;
        Ok(())
    }

    /// Delete a job
    ///
    /// A running transfer is stopped, including a move or extraction in progress whose
    /// partial destination is removed. With `delete_files`, the finished output is
    /// removed too. Finished jobs can be deleted.
    ///
    /// # Errors
    ///
    /// - [`JobError::NotFound`] if the job doesn't exist
    pub async fn delete_job(&self, id: &JobId, delete_files: bool) -> Result<()> {
        let job = self.db.get_job(id).await?.ok_or_else(|| not_found(id))?;

        if let Some(cancel) = self.queue_state.processing.lock().await.remove(id) {
            cancel.cancel();
        }
        self.engine.stop(id).await;

        if delete_files && let Some(output) = &job.output_path {
            remove_output(Path::new(output)).await;
        }
        if let Err(e) = tokio::fs::remove_file(self.container_path(id)).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(job_id = %id, error = %e, "Could not remove stored torrent");
        }

        self.db.delete_job(id).await?;

        tracing::info!(job_id = %id, state = job.state().as_str(), delete_files, "Job deleted");
        self.emit_event(Event::Removed { id: id.clone() });

        if job.state().is_active() {
            self.kick_queue().await;
        }
        Ok(())
    }
}

async fn remove_output(path: &Path) {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => tracing::info!(path = ?path, "Removed downloaded files"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = ?path, error = %e, "Could not remove downloaded files"),
    }
}
