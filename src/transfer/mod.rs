//! External transfer process supervision
//!
//! The [`TransferEngine`] runs one external transfer process per job, parses its
//! progress output, and moves or extracts the finished file. Everything it learns is
//! reported as `(JobId, TransferEvent)` messages on a channel owned by the caller.
//!
//! ## Lifecycle
//!
//! - A partial file at `temp_dir/<id>_<filename>` means the transfer resumes with a
//!   range request.
//! - Exit code 33 (range requests unsupported) discards the partial file and restarts
//!   once from scratch.
//! - [`TransferEngine::pause`] kills the process and keeps the partial file;
//!   [`TransferEngine::stop`] also removes it and aborts a running move or extraction.

mod mover;
mod process;
mod progress;


pub use process::{EXIT_RANGE_UNSUPPORTED, TransferExit};

use crate::config::Config;
use crate::error::{Error, JobError, PostProcessError, Result};
use crate::extraction::{ArchiveExtractor, archive_base_name, is_archive};
use crate::types::JobId;
use crate::utils::{sanitize_filename, unique_path};
use mover::CopyOptions;
use progress::{ProgressLine, SegmentSplitter};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long `stop` and `shutdown` wait for supervising tasks
const STOP_TIMEOUT: Duration = Duration::from_secs(15);

/// Non-progress stderr lines kept for error messages
const STDERR_TAIL_LINES: usize = 10;

/// Lifecycle notification for one job
#[derive(Clone, Debug, PartialEq)]
pub enum TransferEvent {
    /// Counters changed
    Progress(TransferSnapshot),
    /// The partial file was discarded and the transfer starts over
    Restarted,
    /// A cross-filesystem copy is running
    Moving {
        /// Final path being written
        destination: PathBuf,
        /// Bytes copied so far
        copied_bytes: u64,
    },
    /// The archive is being extracted
    Extracting {
        /// Archive being extracted
        archive: PathBuf,
    },
    /// The process was killed on request; the partial file is kept
    Paused {
        /// Size of the partial file
        downloaded_bytes: u64,
    },
    /// The file (or extraction folder) is in place
    Completed {
        /// Final file or extraction folder
        path: PathBuf,
        /// Size of the downloaded file
        total_bytes: u64,
    },
    /// The transfer or its post-processing failed
    Failed {
        /// Human-readable reason
        error: String,
    },
    /// The transfer was stopped and its files removed
    Stopped,
}

/// Live counters of a transfer
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TransferSnapshot {
    /// Bytes on disk, including the resume offset
    pub downloaded_bytes: u64,
    /// Full size, when known
    pub total_bytes: Option<u64>,
    /// Current throughput
    pub speed_bps: u64,
    /// Overall progress (0.0 to 100.0)
    pub percent: f32,
}

/// What to download and where to put it
#[derive(Clone, Debug)]
pub struct TransferRequest {
    /// Direct URL
    pub url: String,
    /// Output file name
    pub filename: String,
    /// Size known before the transfer starts
    pub known_total: Option<u64>,
    /// Directory receiving the finished file
    pub save_path: PathBuf,
}

/// A transfer that was paused and can continue from its partial file
#[derive(Clone, Debug, PartialEq)]
pub struct PausedTransferInfo {
    /// Partial file
    pub temp_path: PathBuf,
    /// Size of the partial file
    pub downloaded_bytes: u64,
    /// Full size, when known
    pub total_bytes: Option<u64>,
}

/// Engine settings derived from [`Config`]
#[derive(Clone, Debug)]
pub struct TransferSettings {
    /// Transfer program
    pub binary: PathBuf,
    /// Extra arguments passed before the URL
    pub extra_args: Vec<String>,
    /// Directory for partial files
    pub temp_dir: PathBuf,
    /// Extract recognized archives after download
    pub extract_archives: bool,
    pub(crate) copy: CopyOptions,
}

impl TransferSettings {
    /// Settings from the download and tools sections
    pub fn from_config(config: &Config) -> Self {
        Self {
            binary: config.tools.transfer_binary.clone(),
            extra_args: config.tools.transfer_args.clone(),
            temp_dir: config.download.temp_dir.clone(),
            extract_archives: config.download.extract_archives,
            copy: CopyOptions::default(),
        }
    }

    /// Always copy instead of renaming, sleeping `chunk_delay` between chunks
    #[cfg(test)]
    pub(crate) fn with_forced_copy(mut self, chunk_delay: Duration) -> Self {
        self.copy = CopyOptions {
            always_copy: true,
            chunk_delay: Some(chunk_delay),
        };
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    resume_offset: AtomicU64,
    downloaded: AtomicU64,
    /// 0 when unknown
    total: AtomicU64,
    speed: AtomicU64,
    percent_bits: AtomicU32,
}

impl Counters {
    fn begin(&self, resume_offset: u64, known_total: Option<u64>) {
        self.resume_offset.store(resume_offset, Ordering::Relaxed);
        let percent = match known_total {
            Some(total) if total > 0 => resume_offset as f32 / total as f32 * 100.0,
            _ => 0.0,
        };
        self.store(&TransferSnapshot {
            downloaded_bytes: resume_offset,
            total_bytes: known_total,
            speed_bps: 0,
            percent,
        });
    }

    fn store(&self, snapshot: &TransferSnapshot) {
        self.downloaded
            .store(snapshot.downloaded_bytes, Ordering::Relaxed);
        self.total
            .store(snapshot.total_bytes.unwrap_or(0), Ordering::Relaxed);
        self.speed.store(snapshot.speed_bps, Ordering::Relaxed);
        self.percent_bits
            .store(snapshot.percent.to_bits(), Ordering::Relaxed);
    }

    fn snapshot(&self) -> TransferSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        TransferSnapshot {
            downloaded_bytes: self.downloaded.load(Ordering::Relaxed),
            total_bytes: (total > 0).then_some(total),
            speed_bps: self.speed.load(Ordering::Relaxed),
            percent: f32::from_bits(self.percent_bits.load(Ordering::Relaxed)),
        }
    }
}

/// Turns parsed stderr lines into snapshots
struct ProgressTracker {
    resume_offset: u64,
    known_total: Option<u64>,
    last_bytes: u64,
    last_at: Instant,
}

impl ProgressTracker {
    fn new(resume_offset: u64, known_total: Option<u64>) -> Self {
        Self {
            resume_offset,
            known_total,
            last_bytes: resume_offset,
            last_at: Instant::now(),
        }
    }

    /// `on_disk` is consulted only for bar output without a known size
    fn apply(&mut self, line: ProgressLine, on_disk: Option<u64>) -> TransferSnapshot {
        let (downloaded, total, reported_speed, reported_percent) = match line {
            ProgressLine::Meter {
                percent,
                total,
                received,
                speed,
            } => {
                let total = if total > 0 {
                    Some(self.resume_offset + total)
                } else {
                    self.known_total
                };
                (self.resume_offset + received, total, speed, percent)
            }
            ProgressLine::Percent(percent) => match self.known_total {
                Some(total) => {
                    let remaining = total.saturating_sub(self.resume_offset);
                    let done = (remaining as f64 * f64::from(percent) / 100.0) as u64;
                    (self.resume_offset + done, Some(total), 0, percent)
                }
                None => (on_disk.unwrap_or(self.last_bytes), None, 0, percent),
            },
        };

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_at).as_secs_f64();
        let speed_bps = if reported_speed > 0 {
            reported_speed
        } else if elapsed > 0.0 {
            (downloaded.saturating_sub(self.last_bytes) as f64 / elapsed) as u64
        } else {
            0
        };
        self.last_bytes = downloaded;
        self.last_at = now;

        let percent = match total {
            Some(total) if total > 0 => (downloaded as f64 / total as f64 * 100.0).min(100.0) as f32,
            _ => reported_percent,
        };

        TransferSnapshot {
            downloaded_bytes: downloaded,
            total_bytes: total,
            speed_bps,
            percent,
        }
    }
}

/// Bookkeeping for one running transfer
#[derive(Clone)]
struct ActiveTransfer {
    /// Fires on pause or stop; kills the process
    cancel: CancellationToken,
    /// Fires on stop only; also aborts move and extraction
    stop: CancellationToken,
    /// Fires once the supervising task is done
    finished: CancellationToken,
    /// Set once the process exited successfully
    post_processing: Arc<AtomicBool>,
    counters: Arc<Counters>,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl ActiveTransfer {
    fn stopped_intentionally(&self) -> bool {
        self.stop.is_cancelled()
    }
}

enum ProcessOutcome {
    Exited {
        exit: TransferExit,
        resume_offset: u64,
    },
    Interrupted,
    SpawnFailed(std::io::Error),
}

enum Outcome {
    Completed { path: PathBuf, total_bytes: u64 },
    Paused(PausedTransferInfo),
    Stopped,
    Failed(String),
}

/// Supervises external transfer processes, at most one per job
#[derive(Clone)]
pub struct TransferEngine {
    settings: Arc<TransferSettings>,
    extractor: ArchiveExtractor,
    events: mpsc::UnboundedSender<(JobId, TransferEvent)>,
    active: Arc<Mutex<HashMap<JobId, ActiveTransfer>>>,
    paused: Arc<Mutex<HashMap<JobId, PausedTransferInfo>>>,
}

impl TransferEngine {
    /// Create an engine reporting to `events`
    pub fn new(
        settings: TransferSettings,
        extractor: ArchiveExtractor,
        events: mpsc::UnboundedSender<(JobId, TransferEvent)>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            extractor,
            events,
            active: Arc::new(Mutex::new(HashMap::new())),
            paused: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn temp_path(&self, id: &JobId, filename: &str) -> PathBuf {
        self.settings
            .temp_dir
            .join(format!("{}_{}", id, sanitize_filename(filename)))
    }

    fn emit(&self, id: &JobId, event: TransferEvent) {
        self.events.send((id.clone(), event)).ok();
    }

    /// Start (or resume) the transfer of `id`
    ///
    /// Fails if a transfer for `id` is already running.
    pub async fn start(&self, id: JobId, request: TransferRequest) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.contains_key(&id) {
            return Err(JobError::InvalidState {
                id: id.to_string(),
                operation: "start transfer".to_string(),
                current_state: "transferring".to_string(),
            }
            .into());
        }

        tokio::fs::create_dir_all(&self.settings.temp_dir).await?;
        let temp_path = match self.paused.lock().await.remove(&id) {
            Some(info) => info.temp_path,
            None => self.temp_path(&id, &request.filename),
        };

        let transfer = ActiveTransfer {
            cancel: CancellationToken::new(),
            stop: CancellationToken::new(),
            finished: CancellationToken::new(),
            post_processing: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            temp_path,
            final_path: request
                .save_path
                .join(sanitize_filename(&request.filename)),
        };
        active.insert(id.clone(), transfer.clone());
        drop(active);

        info!(job_id = %id, temp_path = ?transfer.temp_path, "Transfer started");
        tokio::spawn(self.clone().supervise(id, request, transfer));
        Ok(())
    }

    /// Kill the process of `id`, keeping the partial file
    ///
    /// Returns `false` when no process is running for `id` (not started, or already
    /// moving or extracting the finished file).
    pub async fn pause(&self, id: &JobId) -> bool {
        let active = self.active.lock().await;
        match active.get(id) {
            Some(transfer) if !transfer.post_processing.load(Ordering::SeqCst) => {
                debug!(job_id = %id, "Pausing transfer");
                transfer.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Stop `id` and remove its files, waiting for the supervising task to finish
    ///
    /// A running move or extraction is aborted and its partial destination removed.
    /// Paused state and stray partial files are discarded too.
    pub async fn stop(&self, id: &JobId) {
        let finished = {
            let active = self.active.lock().await;
            active.get(id).map(|transfer| {
                transfer.stop.cancel();
                transfer.cancel.cancel();
                transfer.finished.clone()
            })
        };

        if let Some(finished) = finished
            && tokio::time::timeout(STOP_TIMEOUT, finished.cancelled())
                .await
                .is_err()
        {
            warn!(job_id = %id, "Transfer did not stop in time");
        }

        self.discard(id).await;
    }

    /// Drop the paused state of `id` and delete its partial files
    pub async fn discard(&self, id: &JobId) {
        if self.active.lock().await.contains_key(id) {
            return;
        }

        if let Some(info) = self.paused.lock().await.remove(id) {
            remove_quietly(&info.temp_path).await;
        }

        let prefix = format!("{id}_");
        let Ok(mut entries) = tokio::fs::read_dir(&self.settings.temp_dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                remove_quietly(&entry.path()).await;
            }
        }
    }

    /// Live counters of a running or paused transfer
    pub async fn snapshot(&self, id: &JobId) -> Option<TransferSnapshot> {
        if let Some(transfer) = self.active.lock().await.get(id) {
            return Some(transfer.counters.snapshot());
        }
        self.paused
            .lock()
            .await
            .get(id)
            .map(|info| TransferSnapshot {
                downloaded_bytes: info.downloaded_bytes,
                total_bytes: info.total_bytes,
                speed_bps: 0,
                percent: match info.total_bytes {
                    Some(total) if total > 0 => {
                        info.downloaded_bytes as f32 / total as f32 * 100.0
                    }
                    _ => 0.0,
                },
            })
    }

    /// Whether a transfer for `id` is running
    #[cfg(test)]
    pub(crate) async fn is_active(&self, id: &JobId) -> bool {
        self.active.lock().await.contains_key(id)
    }

    /// Whether `id` finished transferring and is being moved or extracted
    pub async fn is_post_processing(&self, id: &JobId) -> bool {
        self.active
            .lock()
            .await
            .get(id)
            .is_some_and(|transfer| transfer.post_processing.load(Ordering::SeqCst))
    }

    /// Paused state of `id`, if any
    pub async fn paused_info(&self, id: &JobId) -> Option<PausedTransferInfo> {
        self.paused.lock().await.get(id).cloned()
    }

    /// Number of running transfers
    #[cfg(test)]
    pub(crate) async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Pause every running transfer and wait for them to settle
    pub async fn shutdown(&self) {
        let finished: Vec<CancellationToken> = {
            let active = self.active.lock().await;
            active
                .values()
                .map(|transfer| {
                    transfer.cancel.cancel();
                    transfer.finished.clone()
                })
                .collect()
        };
        if finished.is_empty() {
            return;
        }

        info!(count = finished.len(), "Pausing running transfers");
        let all = futures::future::join_all(finished.iter().map(|f| f.cancelled()));
        if tokio::time::timeout(STOP_TIMEOUT, all).await.is_err() {
            warn!("Timed out waiting for transfers to pause");
        }
    }

    async fn supervise(self, id: JobId, request: TransferRequest, transfer: ActiveTransfer) {
        let _finished = transfer.finished.clone().drop_guard();
        let outcome = self.run(&id, &request, &transfer).await;

        let event = {
            let mut active = self.active.lock().await;
            active.remove(&id);
            match outcome {
                Outcome::Completed { path, total_bytes } => {
                    info!(job_id = %id, ?path, total_bytes, "Transfer completed");
                    TransferEvent::Completed { path, total_bytes }
                }
                Outcome::Paused(info) => {
                    info!(job_id = %id, downloaded = info.downloaded_bytes, "Transfer paused");
                    let downloaded_bytes = info.downloaded_bytes;
                    self.paused.lock().await.insert(id.clone(), info);
                    TransferEvent::Paused { downloaded_bytes }
                }
                Outcome::Stopped => {
                    info!(job_id = %id, "Transfer stopped");
                    TransferEvent::Stopped
                }
                Outcome::Failed(error) => {
                    warn!(job_id = %id, %error, "Transfer failed");
                    TransferEvent::Failed { error }
                }
            }
        };
        self.emit(&id, event);
    }

    async fn run(
        &self,
        id: &JobId,
        request: &TransferRequest,
        transfer: &ActiveTransfer,
    ) -> Outcome {
        loop {
            match self.run_process(id, request, transfer).await {
                ProcessOutcome::Exited {
                    exit: TransferExit::Success,
                    ..
                } => break,
                ProcessOutcome::Exited {
                    exit: TransferExit::ResumeUnsupported,
                    resume_offset,
                } if resume_offset > 0 => {
                    warn!(job_id = %id, resume_offset, "Server refused to resume, restarting");
                    remove_quietly(&transfer.temp_path).await;
                    self.emit(id, TransferEvent::Restarted);
                }
                ProcessOutcome::Exited { exit, .. } => {
                    remove_quietly(&transfer.temp_path).await;
                    return Outcome::Failed(Error::TransferProcess(exit.describe()).to_string());
                }
                ProcessOutcome::Interrupted => return self.interrupted(request, transfer).await,
                ProcessOutcome::SpawnFailed(e) => {
                    let reason = format!("failed to start {}: {}", self.settings.binary.display(), e);
                    return Outcome::Failed(Error::TransferProcess(reason).to_string());
                }
            }
        }

        {
            // A pause that slipped in after the process exited still wins
            let guard = self.active.lock().await;
            if transfer.cancel.is_cancelled() {
                drop(guard);
                return self.interrupted(request, transfer).await;
            }
            transfer.post_processing.store(true, Ordering::SeqCst);
        }

        self.finish(id, request, transfer).await
    }

    async fn interrupted(&self, request: &TransferRequest, transfer: &ActiveTransfer) -> Outcome {
        if transfer.stopped_intentionally() {
            remove_quietly(&transfer.temp_path).await;
            return Outcome::Stopped;
        }

        let downloaded_bytes = file_size(&transfer.temp_path).await.unwrap_or(0);
        Outcome::Paused(PausedTransferInfo {
            temp_path: transfer.temp_path.clone(),
            downloaded_bytes,
            total_bytes: transfer
                .counters
                .snapshot()
                .total_bytes
                .or(request.known_total),
        })
    }

    async fn run_process(
        &self,
        id: &JobId,
        request: &TransferRequest,
        transfer: &ActiveTransfer,
    ) -> ProcessOutcome {
        if transfer.cancel.is_cancelled() {
            return ProcessOutcome::Interrupted;
        }

        let resume_offset = file_size(&transfer.temp_path).await.unwrap_or(0);
        transfer.counters.begin(resume_offset, request.known_total);

        // A partial file that is already complete needs no request
        if let Some(total) = request.known_total
            && total > 0
            && resume_offset >= total
        {
            debug!(job_id = %id, "Partial file already complete");
            return ProcessOutcome::Exited {
                exit: TransferExit::Success,
                resume_offset,
            };
        }

        let args = process::transfer_args(
            &request.url,
            &transfer.temp_path,
            resume_offset > 0,
            &self.settings.extra_args,
        );
        info!(job_id = %id, resume_offset, "Spawning transfer process");
        let mut child = match process::spawn(&self.settings.binary, args) {
            Ok(child) => child,
            Err(e) => return ProcessOutcome::SpawnFailed(e),
        };
        let Some(mut stderr) = child.stderr.take() else {
            return ProcessOutcome::SpawnFailed(std::io::Error::other("stderr not captured"));
        };

        let mut splitter = SegmentSplitter::default();
        let mut tracker = ProgressTracker::new(resume_offset, request.known_total);
        let mut tail: VecDeque<String> = VecDeque::new();
        let mut buffer = [0u8; 4096];

        loop {
            let read = tokio::select! {
                _ = transfer.cancel.cancelled() => {
                    child.kill().await.ok();
                    return ProcessOutcome::Interrupted;
                }
                read = stderr.read(&mut buffer) => read,
            };
            match read {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    for segment in splitter.push(&buffer[..n]) {
                        self.handle_segment(id, transfer, &mut tracker, &mut tail, segment)
                            .await;
                    }
                }
            }
        }
        if let Some(segment) = splitter.finish() {
            self.handle_segment(id, transfer, &mut tracker, &mut tail, segment)
                .await;
        }

        let status = tokio::select! {
            _ = transfer.cancel.cancelled() => {
                child.kill().await.ok();
                return ProcessOutcome::Interrupted;
            }
            status = child.wait() => status,
        };

        let stderr_text = Vec::from(tail).join("\n");
        let exit = match status {
            Ok(status) => TransferExit::classify(status, stderr_text),
            Err(e) => TransferExit::Failed {
                code: None,
                stderr: e.to_string(),
            },
        };
        debug!(job_id = %id, ?exit, "Transfer process exited");
        ProcessOutcome::Exited {
            exit,
            resume_offset,
        }
    }

    async fn handle_segment(
        &self,
        id: &JobId,
        transfer: &ActiveTransfer,
        tracker: &mut ProgressTracker,
        tail: &mut VecDeque<String>,
        segment: String,
    ) {
        let Some(line) = progress::parse_line(&segment) else {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(segment.trim().to_string());
            return;
        };

        let on_disk = if matches!(line, ProgressLine::Percent(_)) && tracker.known_total.is_none() {
            file_size(&transfer.temp_path).await
        } else {
            None
        };
        let snapshot = tracker.apply(line, on_disk);
        transfer.counters.store(&snapshot);
        self.emit(id, TransferEvent::Progress(snapshot));
    }

    async fn finish(&self, id: &JobId, request: &TransferRequest, transfer: &ActiveTransfer) -> Outcome {
        let total_bytes = file_size(&transfer.temp_path).await.unwrap_or(0);
        let mut snapshot = transfer.counters.snapshot();
        snapshot.downloaded_bytes = total_bytes;
        snapshot.total_bytes = Some(total_bytes);
        snapshot.percent = 100.0;
        snapshot.speed_bps = 0;
        transfer.counters.store(&snapshot);

        if self.settings.extract_archives && is_archive(&request.filename) {
            match self.extract(id, request, transfer, total_bytes).await {
                Some(outcome) => return outcome,
                None => debug!(job_id = %id, "Moving archive without extraction"),
            }
        }

        let final_path = match unique_path(&transfer.final_path) {
            Ok(path) => path,
            Err(e) => return Outcome::Failed(e.to_string()),
        };
        let moved = mover::move_file(
            &transfer.temp_path,
            &final_path,
            &transfer.stop,
            self.settings.copy,
            |copied_bytes| {
                self.emit(
                    id,
                    TransferEvent::Moving {
                        destination: final_path.clone(),
                        copied_bytes,
                    },
                )
            },
        )
        .await;

        match moved {
            Ok(()) => Outcome::Completed {
                path: final_path,
                total_bytes,
            },
            Err(Error::PostProcess(PostProcessError::MoveAborted { .. })) => {
                remove_quietly(&transfer.temp_path).await;
                Outcome::Stopped
            }
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    /// `None` when no extraction tool is available and the archive should be moved as-is
    async fn extract(
        &self,
        id: &JobId,
        request: &TransferRequest,
        transfer: &ActiveTransfer,
        total_bytes: u64,
    ) -> Option<Outcome> {
        let dest = request
            .save_path
            .join(archive_base_name(&sanitize_filename(&request.filename)));
        let dest = match unique_path(&dest) {
            Ok(dest) => dest,
            Err(e) => return Some(Outcome::Failed(e.to_string())),
        };

        self.emit(
            id,
            TransferEvent::Extracting {
                archive: transfer.temp_path.clone(),
            },
        );
        match self
            .extractor
            .extract(&transfer.temp_path, &dest, &transfer.stop)
            .await
        {
            Ok(entries) => {
                debug!(job_id = %id, entries = entries.len(), "Archive extracted");
                remove_quietly(&transfer.temp_path).await;
                Some(Outcome::Completed {
                    path: dest,
                    total_bytes,
                })
            }
            Err(Error::ExternalTool(reason)) => {
                warn!(job_id = %id, %reason, "Extraction tool unavailable");
                if let Err(e) = tokio::fs::remove_dir(&dest).await {
                    debug!(?dest, error = %e, "Could not remove empty extraction folder");
                }
                None
            }
            Err(Error::PostProcess(PostProcessError::MoveAborted { .. })) => {
                remove_quietly(&transfer.temp_path).await;
                Some(Outcome::Stopped)
            }
            Err(e) => {
                if let Err(err) = tokio::fs::remove_dir_all(&dest).await {
                    debug!(?dest, error = %err, "Could not remove failed extraction");
                }
                remove_quietly(&transfer.temp_path).await;
                Some(Outcome::Failed(e.to_string()))
            }
        }
    }
}

async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(?path, "Removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?path, error = %e, "Could not remove partial file"),
    }
}
