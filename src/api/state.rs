//! Application state for the API server

use crate::{Config, DebridDownloader};
use std::sync::Arc;

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppState {
    /// The job manager
    pub downloader: Arc<DebridDownloader>,

    /// Configuration the server was started with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<DebridDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
