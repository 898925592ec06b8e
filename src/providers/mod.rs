//! Debrid unlocking providers
//!
//! Every service implements [`UnlockProvider`]; [`ProviderChain`] tries the enabled ones in
//! their declared order. Provider-specific status vocabularies are normalized to
//! [`RemoteStatus`] inside each adapter.
//!
//! ## Resolution
//!
//! - [`ProviderChain::resolve_link`] never fails: when no provider can unlock a URL, the
//!   original URL is returned and the download is attempted as-is.
//! - [`ProviderChain::resolve_container`] uploads a torrent, then polls until the remote
//!   side reports it ready, failed, or the wait exceeds the configured timeout. Failure of
//!   one provider moves on to the next; the last error is returned when all fail.

use crate::config::ProvidersConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

mod alldebrid;
mod realdebrid;

pub use crate::error::ProviderError;
pub use alldebrid::AllDebrid;
pub use realdebrid::RealDebrid;

/// Result type for a single provider call
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Remote job status, normalized across providers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    /// Accepted, not started
    Queued,
    /// Being fetched by the provider
    Downloading,
    /// Finished, links available
    Ready,
    /// Failed on the provider side
    Error,
}

/// Status of a torrent processed on the provider side
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderJobStatus {
    /// Provider-side id
    pub id: String,
    /// Normalized status
    pub status: RemoteStatus,
    /// Progress percentage (0.0 to 100.0)
    pub progress: f32,
    /// Hoster links, once ready
    pub links: Vec<String>,
    /// File name reported by the provider
    pub filename: Option<String>,
    /// Failure reason, when the status is [`RemoteStatus::Error`]
    pub error: Option<String>,
}

impl ProviderJobStatus {
    /// Human-readable status line, stored as the job's status message
    pub fn summary(&self) -> String {
        match self.status {
            RemoteStatus::Queued => "Queued at provider".to_string(),
            RemoteStatus::Downloading => format!("Provider downloading {:.1}%", self.progress),
            RemoteStatus::Ready => "Ready at provider".to_string(),
            RemoteStatus::Error => format!(
                "Provider error: {}",
                self.error.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

/// Progress notification from [`ProviderChain::resolve_container`]
#[derive(Clone, Debug)]
pub enum ContainerUpdate {
    /// A provider accepted the torrent
    Submitted {
        /// Provider name
        provider: &'static str,
        /// Provider-side id
        provider_job_id: String,
    },
    /// A status poll returned
    Status {
        /// Provider name
        provider: &'static str,
        /// Reported status
        status: ProviderJobStatus,
    },
}

/// A torrent that a provider finished processing
#[derive(Clone, Debug)]
pub struct ResolvedContainer {
    /// Provider that processed it
    pub provider: &'static str,
    /// Provider-side id
    pub provider_job_id: String,
    /// Hoster links, never empty
    pub links: Vec<String>,
    /// File name reported by the provider
    pub filename: Option<String>,
}

/// Outcome of a provider connectivity test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTestResult {
    /// Provider name
    pub provider: String,

    /// Whether the test was successful
    pub success: bool,

    /// Round-trip time in milliseconds (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Capability interface of an unlocking service
#[async_trait]
pub trait UnlockProvider: Send + Sync {
    /// Stable short name, used in logs and status messages
    fn name(&self) -> &'static str;

    /// Whether the provider is configured and switched on
    fn is_enabled(&self) -> bool;

    /// Turn a hoster URL into a direct, playable URL
    async fn unlock_link(&self, url: &str) -> ProviderResult<String>;

    /// Whether the provider accepts torrents
    fn supports_containers(&self) -> bool {
        false
    }

    /// Upload a torrent, returning the provider-side id
    async fn submit_container(&self, _bytes: &[u8], _name: &str) -> ProviderResult<String> {
        Err(ProviderError::Unsupported {
            provider: self.name(),
            operation: "torrent upload",
        })
    }

    /// Query the status of an uploaded torrent
    async fn poll_status(&self, _provider_job_id: &str) -> ProviderResult<ProviderJobStatus> {
        Err(ProviderError::Unsupported {
            provider: self.name(),
            operation: "status polling",
        })
    }

    /// Check that the credentials are accepted
    async fn test_connection(&self) -> ProviderResult<()>;
}

/// Ordered set of providers with fallback
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn UnlockProvider>>,
    poll_interval: Duration,
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("ProviderChain")
            .field("providers", &names)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl ProviderChain {
    /// Chain over `providers`, tried in the given order
    pub fn new(providers: Vec<Arc<dyn UnlockProvider>>) -> Self {
        Self {
            providers,
            poll_interval: Duration::from_secs(5),
        }
    }

    /// Override the interval between status polls
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Build the fixed provider set from configuration: AllDebrid, then Real-Debrid
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("debrid-dl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        let mut providers: Vec<Arc<dyn UnlockProvider>> = Vec::new();
        if let Some(creds) = &config.alldebrid {
            providers.push(Arc::new(AllDebrid::new(client.clone(), creds)));
        }
        if let Some(creds) = &config.realdebrid {
            providers.push(Arc::new(RealDebrid::new(client.clone(), creds)));
        }

        Ok(Self::new(providers).with_poll_interval(config.poll_interval))
    }

    fn enabled(&self) -> impl Iterator<Item = &Arc<dyn UnlockProvider>> {
        self.providers.iter().filter(|p| p.is_enabled())
    }

    /// Whether any enabled provider accepts torrents
    pub fn has_container_provider(&self) -> bool {
        self.enabled().any(|p| p.supports_containers())
    }

    /// Unlock a hoster URL; falls back to the URL itself when every provider fails
    pub async fn resolve_link(&self, url: &str) -> String {
        for provider in self.enabled() {
            match provider.unlock_link(url).await {
                Ok(unlocked) => {
                    tracing::debug!(provider = provider.name(), "Link unlocked");
                    return unlocked;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "Link unlock failed, trying next provider"
                    );
                }
            }
        }

        tracing::info!("No provider unlocked the link, using it as-is");
        url.to_string()
    }

    /// Have a provider process a torrent and return its hoster links
    ///
    /// Updates are best-effort: a dropped receiver does not interrupt resolution.
    pub async fn resolve_container(
        &self,
        bytes: &[u8],
        name: &str,
        updates: &mpsc::UnboundedSender<ContainerUpdate>,
        timeout: Duration,
    ) -> ProviderResult<ResolvedContainer> {
        let mut last_error = None;

        for provider in self.enabled().filter(|p| p.supports_containers()) {
            match self
                .resolve_with(provider.as_ref(), bytes, name, updates, timeout)
                .await
            {
                Ok(resolved) => {
                    tracing::info!(
                        provider = provider.name(),
                        provider_job_id = %resolved.provider_job_id,
                        links = resolved.links.len(),
                        "Torrent ready at provider"
                    );
                    return Ok(resolved);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "Torrent processing failed, trying next provider"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::NotConfigured("no enabled provider accepts torrents".to_string())
        }))
    }

    async fn resolve_with(
        &self,
        provider: &dyn UnlockProvider,
        bytes: &[u8],
        name: &str,
        updates: &mpsc::UnboundedSender<ContainerUpdate>,
        timeout: Duration,
    ) -> ProviderResult<ResolvedContainer> {
        let provider_job_id = provider.submit_container(bytes, name).await?;
        updates
            .send(ContainerUpdate::Submitted {
                provider: provider.name(),
                provider_job_id: provider_job_id.clone(),
            })
            .ok();

        let started = Instant::now();
        loop {
            match provider.poll_status(&provider_job_id).await {
                Ok(status) => {
                    updates
                        .send(ContainerUpdate::Status {
                            provider: provider.name(),
                            status: status.clone(),
                        })
                        .ok();

                    match status.status {
                        RemoteStatus::Ready if status.links.is_empty() => {
                            return Err(ProviderError::InvalidResponse {
                                provider: provider.name(),
                                message: "torrent ready without links".to_string(),
                            });
                        }
                        RemoteStatus::Ready => {
                            return Ok(ResolvedContainer {
                                provider: provider.name(),
                                provider_job_id,
                                links: status.links,
                                filename: status.filename,
                            });
                        }
                        RemoteStatus::Error => {
                            return Err(ProviderError::JobFailed {
                                provider: provider.name(),
                                provider_job_id,
                                message: status.error.unwrap_or_else(|| "unknown".to_string()),
                            });
                        }
                        RemoteStatus::Queued | RemoteStatus::Downloading => {}
                    }
                }
                // Transport hiccups while polling are retried on the next tick
                Err(ProviderError::Http(e)) => {
                    tracing::debug!(provider = provider.name(), error = %e, "Status poll failed");
                }
                Err(e) => return Err(e),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ProviderError::Timeout {
                    provider: provider.name(),
                    elapsed,
                });
            }
            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Run `test_connection` on every enabled provider
    pub async fn test_all(&self) -> Vec<ProviderTestResult> {
        let mut results = Vec::new();
        for provider in self.enabled() {
            let started = std::time::Instant::now();
            let result = provider.test_connection().await;
            results.push(match result {
                Ok(()) => ProviderTestResult {
                    provider: provider.name().to_string(),
                    success: true,
                    latency_ms: Some(started.elapsed().as_millis() as u64),
                    error: None,
                },
                Err(e) => ProviderTestResult {
                    provider: provider.name().to_string(),
                    success: false,
                    latency_ms: None,
                    error: Some(e.to_string()),
                },
            });
        }
        results
    }
}

/// Trim a configured base URL so paths can be appended with `/`
pub(crate) fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
