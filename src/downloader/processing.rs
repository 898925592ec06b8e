//! Resolving a picked-up job into a running transfer.

use crate::db::JobRecord;
use crate::error::{Error, Result};
use crate::providers::ContainerUpdate;
use crate::transfer::TransferRequest;
use crate::types::{Event, JobId, JobKind, State};
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::DebridDownloader;

/// `name` unless `candidate` looks like a real file name (has an extension)
fn pick_filename(candidate: Option<String>, name: &str) -> String {
    match candidate {
        Some(candidate) if Path::new(&candidate).extension().is_some() => candidate,
        _ => name.to_string(),
    }
}

impl DebridDownloader {
    /// Take a Checking job to Downloading
    ///
    /// `cancel` fires when the user pauses or deletes the job while it is being
    /// resolved. Resolution errors fail the job.
    pub(crate) async fn start_processing(&self, job: JobRecord, cancel: CancellationToken) {
        let id = job.id.clone();

        let prepared = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(job_id = %id, "Resolution cancelled");
                Ok(None)
            }
            result = self.prepare_transfer(&job) => result.map(Some),
        };

        match prepared {
            Ok(Some(request)) => {
                if let Err(e) = self.begin_transfer(&job, request, &cancel).await {
                    self.fail(&id, &e.to_string()).await;
                }
            }
            Ok(None) => {}
            Err(e) => self.fail(&id, &e.to_string()).await,
        }

        self.queue_state.processing.lock().await.remove(&id);
    }

    async fn begin_transfer(
        &self,
        job: &JobRecord,
        request: TransferRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let id = &job.id;
        if !self
            .db
            .transition_state(id, State::Checking, State::Downloading)
            .await?
        {
            tracing::debug!(job_id = %id, "Job left Checking during resolution, not starting");
            return Ok(());
        }
        self.db.set_resolved_link(id, &request.url).await?;
        self.db.set_status_message(id, None).await?;

        // the stored link replaces the torrent from here on
        if job.kind() == JobKind::RealContainer
            && let Err(e) = tokio::fs::remove_file(self.container_path(id)).await
        {
            tracing::debug!(job_id = %id, error = %e, "Could not remove stored torrent");
        }

        self.engine.start(id.clone(), request).await?;

        // a pause or delete that raced with the start found no running transfer
        if cancel.is_cancelled() {
            match self.db.get_job(id).await? {
                Some(record) if record.state() == State::Paused => {
                    self.engine.pause(id).await;
                }
                Some(_) => {}
                None => self.engine.stop(id).await,
            }
        }
        Ok(())
    }

    /// Mark a job failed, notify subscribers and free its slot
    pub(crate) async fn fail(&self, id: &JobId, message: &str) {
        match self.db.fail_job(id, message).await {
            Ok(true) => {
                tracing::error!(job_id = %id, error = %message, "Job failed");
                self.emit_event(Event::Failed {
                    id: id.clone(),
                    error: message.to_string(),
                });
                self.kick_queue().await;
            }
            Ok(false) => {
                tracing::debug!(job_id = %id, error = %message, "Ignoring failure of a job no longer active");
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Failed to record job failure");
            }
        }
    }

    /// Transfer request for a job, reusing its stored link when it can be resumed
    ///
    /// A torrent's stored link is always reused since its bytes are gone once the link
    /// is known. A direct link is resolved again unless some progress was made.
    async fn prepare_transfer(&self, job: &JobRecord) -> Result<TransferRequest> {
        let reuse = match job.kind() {
            JobKind::RealContainer => true,
            JobKind::DirectLink => {
                job.downloaded_size > 0 || self.engine.paused_info(&job.id).await.is_some()
            }
        };
        if let Some(link) = &job.resolved_link
            && reuse
        {
            tracing::info!(job_id = %job.id, downloaded = job.downloaded_size, "Resuming with the stored link");
            return Ok(TransferRequest {
                url: link.clone(),
                filename: job.name.clone(),
                known_total: job.known_total(),
                save_path: job.save_path(),
            });
        }

        match job.kind() {
            JobKind::DirectLink => self.resolve_direct_link(job).await,
            JobKind::RealContainer => self.resolve_real_container(job).await,
        }
    }

    async fn resolve_direct_link(&self, job: &JobRecord) -> Result<TransferRequest> {
        let id = &job.id;
        let mut url = job.origin.clone();

        if self.link_checker.is_redirector(&url) {
            self.db
                .set_status_message(id, Some("Following redirector"))
                .await?;
            url = self.link_checker.follow_redirector(&url).await?;
        }

        self.db
            .set_status_message(id, Some("Checking availability"))
            .await?;
        self.link_checker.ensure_available(&url).await?;

        self.db.set_status_message(id, Some("Unlocking link")).await?;
        let direct = self.providers.resolve_link(&url).await;

        let details = self.link_checker.file_details(&direct).await?;
        let filename = pick_filename(details.filename, &job.name);
        if filename != job.name {
            tracing::debug!(job_id = %id, %filename, "Using file name reported by the server");
            self.db.set_name(id, &filename).await?;
        }

        let known_total = job.known_total().or(details.size);
        if let Some(size) = details.size
            && job.known_total().is_none()
        {
            self.db.set_total_size(id, size).await?;
        }

        Ok(TransferRequest {
            url: direct,
            filename,
            known_total,
            save_path: job.save_path(),
        })
    }

    async fn resolve_real_container(&self, job: &JobRecord) -> Result<TransferRequest> {
        let id = &job.id;
        if !self.providers.has_container_provider() {
            return Err(Error::Config {
                message: "no enabled provider accepts torrents".to_string(),
                key: Some("providers".to_string()),
            });
        }

        let container_path = self.container_path(id);
        let bytes = tokio::fs::read(&container_path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read stored torrent '{}': {}", container_path.display(), e),
            ))
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let timeout = self.config.providers.container_timeout;
        let resolve = async move {
            let result = self
                .providers
                .resolve_container(&bytes, &job.name, &tx, timeout)
                .await;
            drop(tx);
            result
        };
        let drain = async {
            while let Some(update) = rx.recv().await {
                self.apply_container_update(id, update).await;
            }
        };
        let (resolved, ()) = tokio::join!(resolve, drain);
        let resolved = resolved?;

        // multi-file torrents: only the first file is fetched
        let link = resolved.links.first().cloned().ok_or_else(|| {
            Error::LinkResolution(format!("{} returned no links", resolved.provider))
        })?;
        if resolved.links.len() > 1 {
            tracing::warn!(job_id = %id, links = resolved.links.len(), "Torrent has several files, fetching the first");
        }

        self.db.set_status_message(id, Some("Unlocking link")).await?;
        let direct = self.providers.resolve_link(&link).await;

        let filename = pick_filename(resolved.filename, &job.name);
        if filename != job.name {
            self.db.set_name(id, &filename).await?;
        }

        Ok(TransferRequest {
            url: direct,
            filename,
            known_total: job.known_total(),
            save_path: job.save_path(),
        })
    }

    async fn apply_container_update(&self, id: &JobId, update: ContainerUpdate) {
        let result = match update {
            ContainerUpdate::Submitted {
                provider,
                provider_job_id,
            } => {
                tracing::info!(job_id = %id, provider, %provider_job_id, "Torrent submitted");
                match self.db.set_provider_job_id(id, &provider_job_id).await {
                    Ok(()) => {
                        self.db
                            .set_status_message(id, Some(&format!("Submitted to {provider}")))
                            .await
                    }
                    Err(e) => Err(e),
                }
            }
            ContainerUpdate::Status { provider, status } => {
                let summary = status.summary();
                tracing::debug!(job_id = %id, provider, status = %summary, "Provider status");
                self.emit_event(Event::ProviderStatus {
                    id: id.clone(),
                    provider: provider.to_string(),
                    status: summary.clone(),
                });
                self.db.set_status_message(id, Some(&summary)).await
            }
        };

        if let Err(e) = result {
            tracing::warn!(job_id = %id, error = %e, "Failed to record provider status");
        }
    }
}
