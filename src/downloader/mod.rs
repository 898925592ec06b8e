//! Job manager split into focused submodules.
//!
//! The `DebridDownloader` struct and its methods are organized by concern:
//! - [`submit`] - Adding direct links and containers
//! - [`control`] - Pause, resume and delete
//! - [`scheduler`] - Promoting queued jobs into free slots
//! - [`processing`] - Resolving a job into a transfer
//! - [`events`] - Applying transfer events to job records
//! - [`query`] - Listing jobs with live progress
//! - [`lifecycle`] - Shutdown coordination
//! - [`link_check`] - Availability probing for direct links

mod control;
mod events;
mod lifecycle;
mod link_check;
mod processing;
mod query;
mod scheduler;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::extraction::ArchiveExtractor;
use crate::providers::ProviderChain;
use crate::transfer::{TransferEngine, TransferSettings};
use crate::types::{Event, JobId};
use link_check::LinkChecker;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Queue and in-flight job bookkeeping
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Cancellation tokens of jobs being resolved (Checking), used by pause and delete
    pub(crate) processing: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    /// Held while a scheduling pass runs
    pub(crate) pass_lock: Arc<Mutex<()>>,
    /// A scheduling pass was requested
    pub(crate) pass_requested: Arc<AtomicBool>,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            processing: Arc::new(Mutex::new(HashMap::new())),
            pass_lock: Arc::new(Mutex::new(())),
            pass_requested: Arc::new(AtomicBool::new(false)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DebridDownloader {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to query job records
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Unlocking providers in priority order
    pub(crate) providers: Arc<ProviderChain>,
    /// Supervisor of the external transfer processes
    pub(crate) engine: TransferEngine,
    /// Direct-link availability probing
    pub(crate) link_checker: Arc<LinkChecker>,
    /// Queue and in-flight job bookkeeping
    pub(crate) queue_state: QueueState,
}

async fn create_dir(path: &Path, what: &str) -> Result<()> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create {} '{}': {}", what, path.display(), e),
        ))
    })
}

impl DebridDownloader {
    /// Create a new DebridDownloader instance
    ///
    /// This initializes all core components:
    /// - Creates the save, temp and container directories
    /// - Opens/creates the SQLite database and runs migrations
    /// - Builds the provider chain from the configured credentials
    /// - Puts jobs interrupted by a previous run back in the queue and starts them
    pub async fn new(config: Config) -> Result<Self> {
        let providers = ProviderChain::from_config(&config.providers)?;
        Self::with_providers(config, providers).await
    }

    /// Create a DebridDownloader with a custom provider chain
    ///
    /// Use this to plug in [`UnlockProvider`](crate::providers::UnlockProvider)
    /// implementations other than the built-in ones.
    pub async fn with_providers(config: Config, providers: ProviderChain) -> Result<Self> {
        let settings = TransferSettings::from_config(&config);
        Self::build(config, providers, settings).await
    }

    pub(crate) async fn build(
        config: Config,
        providers: ProviderChain,
        settings: TransferSettings,
    ) -> Result<Self> {
        create_dir(&config.download.save_dir, "save directory").await?;
        create_dir(&config.download.temp_dir, "temp directory").await?;
        create_dir(&config.download.containers_dir, "containers directory").await?;

        let db = Database::new(&config.persistence.database_path).await?;

        if db.was_unclean_shutdown().await? {
            tracing::warn!("Previous session did not shut down cleanly");
        }
        db.set_clean_start().await?;

        let recovered = db.reset_interrupted().await?;
        if recovered > 0 {
            tracing::info!(count = recovered, "Re-queued jobs interrupted by the previous session");
        }

        let link_checker = LinkChecker::new(&config.link_check)?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);
        let (transfer_tx, transfer_rx) = mpsc::unbounded_channel();
        let engine = TransferEngine::new(
            settings,
            ArchiveExtractor::new(config.tools.clone()),
            transfer_tx,
        );

        let downloader = Self {
            db: Arc::new(db),
            event_tx,
            config: Arc::new(config),
            providers: Arc::new(providers),
            engine,
            link_checker: Arc::new(link_checker),
            queue_state: QueueState::new(),
        };

        tokio::spawn(downloader.clone().consume_transfer_events(transfer_rx));
        downloader.process_queue().await?;

        Ok(downloader)
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Run `test_connection` against every enabled provider
    pub async fn test_providers(&self) -> Vec<crate::providers::ProviderTestResult> {
        self.providers.test_all().await
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Whether new jobs are accepted (false once shutdown started)
    pub fn is_accepting(&self) -> bool {
        self.queue_state.accepting_new.load(Ordering::SeqCst)
    }

    /// Stored torrent bytes of a real container job
    pub(crate) fn container_path(&self, id: &JobId) -> std::path::PathBuf {
        self.config
            .download
            .containers_dir
            .join(format!("{id}.torrent"))
    }
}
