//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;

use super::DebridDownloader;

impl DebridDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new jobs and starting queued ones
    /// 2. Abandons in-flight link resolution
    /// 3. Pauses running transfers, keeping their partial files
    /// 4. Marks a clean shutdown in the database
    ///
    /// Interrupted jobs stay Checking/Downloading in the store and are re-queued on the
    /// next start, resuming from their partial files.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        {
            let processing = self.queue_state.processing.lock().await;
            for (id, cancel) in processing.iter() {
                tracing::debug!(job_id = %id, "Abandoning link resolution");
                cancel.cancel();
            }
        }

        self.engine.shutdown().await;
        tracing::info!("Running transfers paused");

        if let Err(e) = self.db.set_clean_shutdown().await {
            tracing::error!(error = %e, "Failed to mark clean shutdown in database");
        } else {
            tracing::info!("Marked clean shutdown in database");
        }

        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
