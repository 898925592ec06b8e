//! Applying transfer engine events to job records.

use crate::error::Result;
use crate::transfer::TransferEvent;
use crate::types::{Event, JobId};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::DebridDownloader;

/// Minimum spacing of progress writes to the store, per job
const PROGRESS_PERSIST_INTERVAL: Duration = Duration::from_secs(1);

impl DebridDownloader {
    /// Consume engine events in order, one job's events never reordered
    pub(crate) async fn consume_transfer_events(
        self,
        mut events: mpsc::UnboundedReceiver<(JobId, TransferEvent)>,
    ) {
        let mut last_persisted: HashMap<JobId, Instant> = HashMap::new();

        while let Some((id, event)) = events.recv().await {
            if let Err(e) = self
                .handle_transfer_event(&id, event, &mut last_persisted)
                .await
            {
                tracing::error!(job_id = %id, error = %e, "Failed to apply transfer event");
            }
        }
        tracing::debug!("Transfer event channel closed");
    }

    async fn handle_transfer_event(
        &self,
        id: &JobId,
        event: TransferEvent,
        last_persisted: &mut HashMap<JobId, Instant>,
    ) -> Result<()> {
        match event {
            TransferEvent::Progress(snapshot) => {
                let due = last_persisted
                    .get(id)
                    .is_none_or(|at| at.elapsed() >= PROGRESS_PERSIST_INTERVAL);
                if due || snapshot.percent >= 100.0 {
                    self.db
                        .update_progress(id, snapshot.downloaded_bytes, snapshot.total_bytes)
                        .await?;
                    last_persisted.insert(id.clone(), Instant::now());
                }
                self.emit_event(Event::Downloading {
                    id: id.clone(),
                    percent: snapshot.percent,
                    speed_bps: snapshot.speed_bps,
                    downloaded_bytes: snapshot.downloaded_bytes,
                    total_bytes: snapshot.total_bytes,
                });
            }
            TransferEvent::Restarted => {
                tracing::warn!(job_id = %id, "Server cannot resume, downloading from scratch");
                self.db.reset_progress(id).await?;
                self.emit_event(Event::Restarted { id: id.clone() });
            }
            TransferEvent::Moving {
                destination,
                copied_bytes,
            } => {
                if copied_bytes == 0 {
                    self.db
                        .set_status_message(id, Some(&format!("Moving to {}", destination.display())))
                        .await?;
                }
                self.emit_event(Event::Moving {
                    id: id.clone(),
                    destination,
                    copied_bytes,
                });
            }
            TransferEvent::Extracting { archive } => {
                let archive = archive
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| archive.display().to_string());
                self.db
                    .set_status_message(id, Some(&format!("Extracting {archive}")))
                    .await?;
                self.emit_event(Event::Extracting {
                    id: id.clone(),
                    archive,
                });
            }
            TransferEvent::Paused { downloaded_bytes } => {
                last_persisted.remove(id);
                self.db.update_progress(id, downloaded_bytes, None).await?;
            }
            TransferEvent::Completed { path, total_bytes } => {
                last_persisted.remove(id);
                if self
                    .db
                    .complete_job(id, &path.to_string_lossy(), total_bytes)
                    .await?
                {
                    tracing::info!(job_id = %id, path = ?path, total_bytes, "Job completed");
                    self.emit_event(Event::Completed {
                        id: id.clone(),
                        path,
                    });
                }
                self.kick_queue().await;
            }
            TransferEvent::Failed { error } => {
                last_persisted.remove(id);
                self.fail(id, &error).await;
            }
            TransferEvent::Stopped => {
                last_persisted.remove(id);
            }
        }
        Ok(())
    }
}
