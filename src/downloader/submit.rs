//! Adding direct links and torrent containers.

use crate::container::{ContainerKind, analyze};
use crate::db::NewJob;
use crate::error::{Error, Result};
use crate::types::{AddOptions, Event, JobId, JobKind, State};
use crate::utils::{filename_from_url, sanitize_filename};
use std::path::PathBuf;

use super::DebridDownloader;

fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url)
        .map_err(|e| Error::InvalidInput(format!("invalid URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::InvalidInput(format!(
            "unsupported URL scheme '{scheme}', expected http or https"
        ))),
    }
}

impl DebridDownloader {
    /// Queue a hoster link
    ///
    /// The job id is the SHA-1 of the URL, so adding the same link twice returns the
    /// existing job. The name defaults to the last path segment of the URL.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `url` is not an absolute http(s) URL
    /// - [`Error::ShuttingDown`] once shutdown has started
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use debrid_dl::{AddOptions, DebridDownloader};
    /// # async fn example(downloader: DebridDownloader) -> debrid_dl::Result<()> {
    /// let options = AddOptions {
    ///     category: Some("movies".to_string()),
    ///     ..Default::default()
    /// };
    /// let id = downloader
    ///     .add_direct_link("https://hoster.example/f/abc123", options)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add_direct_link(&self, url: &str, options: AddOptions) -> Result<JobId> {
        self.ensure_accepting()?;
        self.submit_direct_link(url, None, 0, options).await
    }

    /// Queue a torrent
    ///
    /// A synthetic direct-link torrent is queued like [`add_direct_link`](Self::add_direct_link)
    /// with the torrent's name and length. A real torrent is keyed by its info-hash and its
    /// bytes are kept in the containers directory until a provider has processed it.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedContainer`] if the bytes are not a usable torrent
    /// - [`Error::ShuttingDown`] once shutdown has started
    pub async fn add_container(&self, bytes: &[u8], options: AddOptions) -> Result<JobId> {
        self.ensure_accepting()?;
        let info = analyze(bytes)?;

        match info.kind {
            ContainerKind::DirectLink { url } => {
                tracing::debug!(%url, "Torrent wraps a direct link");
                self.submit_direct_link(&url, Some(info.name), info.length, options)
                    .await
            }
            ContainerKind::RealContainer { info_hash } => {
                let id = JobId::new(info_hash.clone());
                if self.db.get_job(&id).await?.is_some() {
                    tracing::info!(job_id = %id, "Torrent already known");
                    return Ok(id);
                }

                let name = options
                    .name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or(info.name);
                let job = NewJob {
                    id,
                    name,
                    kind: JobKind::RealContainer,
                    origin: info_hash,
                    save_path: String::new(),
                    category: None,
                    priority: options.priority,
                    total_size: info.length as i64,
                    state: State::Queued,
                };
                self.enqueue(job, &options, Some(bytes)).await
            }
        }
    }

    async fn submit_direct_link(
        &self,
        url: &str,
        name: Option<String>,
        known_size: u64,
        options: AddOptions,
    ) -> Result<JobId> {
        validate_url(url)?;

        let id = JobId::for_url(url);
        let name = options
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or(name)
            .or_else(|| filename_from_url(url))
            .unwrap_or_else(|| id.to_string());

        let job = NewJob {
            id,
            name,
            kind: JobKind::DirectLink,
            origin: url.to_string(),
            save_path: String::new(),
            category: None,
            priority: options.priority,
            total_size: known_size as i64,
            state: State::Queued,
        };
        self.enqueue(job, &options, None).await
    }

    /// Persist a new job and trigger a scheduling pass; duplicates return the existing id
    ///
    /// Torrent bytes are stored only for a newly inserted job. If they cannot be written
    /// the record is removed again.
    async fn enqueue(
        &self,
        mut job: NewJob,
        options: &AddOptions,
        container: Option<&[u8]>,
    ) -> Result<JobId> {
        job.save_path = self.save_path_for(options).to_string_lossy().into_owned();
        job.category = options.category.clone();
        job.state = if options.paused {
            State::Paused
        } else {
            State::Queued
        };

        if !self.db.insert_job(&job).await? {
            tracing::info!(job_id = %job.id, "Job already exists, not adding it again");
            return Ok(job.id);
        }

        if let Some(bytes) = container
            && let Err(e) = tokio::fs::write(self.container_path(&job.id), bytes).await
        {
            tracing::error!(job_id = %job.id, error = %e, "Failed to store torrent");
            self.db.delete_job(&job.id).await?;
            return Err(e.into());
        }

        tracing::info!(
            job_id = %job.id,
            name = %job.name,
            kind = ?job.kind,
            paused = options.paused,
            "Job added"
        );
        self.emit_event(Event::Queued {
            id: job.id.clone(),
            name: job.name.clone(),
        });

        if !options.paused {
            self.kick_queue().await;
        }
        Ok(job.id)
    }

    /// Explicit save path, else the save directory (plus a category subfolder)
    fn save_path_for(&self, options: &AddOptions) -> PathBuf {
        if let Some(path) = &options.save_path {
            return path.clone();
        }

        let download = &self.config.download;
        match &options.category {
            Some(category) if download.category_subfolders && !category.trim().is_empty() => {
                download.save_dir.join(sanitize_filename(category))
            }
            _ => download.save_dir.clone(),
        }
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.is_accepting() {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }
}
