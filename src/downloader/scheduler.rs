//! Scheduler: promotes queued jobs into free execution slots.

use crate::db::JobRecord;
use crate::error::Result;
use crate::types::{Event, State};
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::DebridDownloader;

impl DebridDownloader {
    /// Run a scheduling pass
    ///
    /// Passes never overlap. A request that arrives while a pass is running is folded
    /// into one follow-up pass, so a slot freed mid-pass is filled right away.
    pub(crate) async fn process_queue(&self) -> Result<()> {
        let state = &self.queue_state;
        state.pass_requested.store(true, Ordering::SeqCst);

        loop {
            let Ok(guard) = state.pass_lock.try_lock() else {
                // the running pass picks up the request
                return Ok(());
            };
            while state.pass_requested.swap(false, Ordering::SeqCst) {
                self.schedule_pass().await?;
            }
            drop(guard);

            if !state.pass_requested.load(Ordering::SeqCst) {
                return Ok(());
            }
        }
    }

    /// [`process_queue`](Self::process_queue), logging instead of failing
    pub(crate) async fn kick_queue(&self) {
        if let Err(e) = self.process_queue().await {
            tracing::error!(error = %e, "Scheduling pass failed");
        }
    }

    async fn schedule_pass(&self) -> Result<()> {
        if !self.is_accepting() {
            return Ok(());
        }

        let max = self.config.download.max_concurrent;
        let active = self.db.count_active().await?;
        if active >= max {
            tracing::debug!(active, max, "No free slot");
            return Ok(());
        }

        for job in self.db.next_queued(max - active).await? {
            // lost against a pause or delete since the query
            if !self
                .db
                .transition_state(&job.id, State::Queued, State::Checking)
                .await?
            {
                continue;
            }
            self.db.set_started(&job.id).await?;
            self.db.set_status_message(&job.id, None).await?;

            tracing::info!(job_id = %job.id, name = %job.name, "Job picked up");
            self.emit_event(Event::Checking { id: job.id.clone() });

            let cancel = CancellationToken::new();
            self.queue_state
                .processing
                .lock()
                .await
                .insert(job.id.clone(), cancel.clone());
            self.spawn_processing(job, cancel);
        }

        Ok(())
    }

    fn spawn_processing(&self, job: JobRecord, cancel: CancellationToken) {
        let downloader = self.clone();
        tokio::spawn(async move {
            downloader.start_processing(job, cancel).await;
        });
    }
}
