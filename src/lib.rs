//! # debrid-dl
//!
//! Download backend that looks like a torrent client to media-automation tools but
//! fetches everything over plain HTTP through debrid unlocking services.
//!
//! ## Design Philosophy
//!
//! debrid-dl is designed to be:
//! - **Drop-in** - Upstream tools submit torrents or links exactly as they would to a torrent client
//! - **Provider-agnostic** - Unlocking services sit behind one trait and fail over in priority order
//! - **Library-first** - A single [`DebridDownloader`] handle, with an optional REST API on top
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use debrid_dl::{AddOptions, Config, DebridDownloader};
//! use debrid_dl::config::ProviderCredentials;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.providers.alldebrid = Some(ProviderCredentials::with_api_key("my-api-key"));
//!
//!     let downloader = DebridDownloader::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let id = downloader
//!         .add_direct_link("https://hoster.example/f/abc123", AddOptions::default())
//!         .await?;
//!     println!("queued {id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Torrent container analysis
pub mod container;
/// Database persistence layer
pub mod db;
/// Job manager: queue, state machine, scheduling
pub mod downloader;
/// Error types
pub mod error;
/// Archive extraction through external tools
pub mod extraction;
/// Debrid unlocking providers
pub mod providers;
/// External transfer process supervision
pub mod transfer;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use container::{ContainerInfo, ContainerKind, analyze};
pub use db::Database;
pub use downloader::DebridDownloader;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, JobError, PostProcessError, Result, ToHttpStatus,
};
pub use providers::{ProviderChain, ProviderError, UnlockProvider};
pub use types::{AddOptions, Event, JobId, JobInfo, JobKind, Priority, QueueStats, State};

/// Run until SIGTERM or Ctrl+C, then shut the downloader down gracefully
///
/// On non-unix platforms only Ctrl+C is observed. If no signal can be registered the
/// shutdown starts immediately.
///
/// # Example
///
/// ```no_run
/// use debrid_dl::{Config, DebridDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = DebridDownloader::new(Config::default()).await?;
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: DebridDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C only");
            ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        _ = ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}
