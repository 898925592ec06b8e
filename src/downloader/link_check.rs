//! Availability probing for direct links.

use crate::config::LinkCheckConfig;
use crate::error::{Error, Result};
use crate::utils::{content_size, filename_from_headers};
use regex::Regex;
use reqwest::header::RANGE;
use reqwest::{Client, Response, StatusCode};

/// What the server tells us about a file before downloading it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FileDetails {
    /// From `Content-Disposition` or the final URL
    pub(crate) filename: Option<String>,
    /// From `Content-Range` or `Content-Length`
    pub(crate) size: Option<u64>,
}

/// Probes hoster links before they are handed to a provider
#[derive(Clone, Debug)]
pub(crate) struct LinkChecker {
    client: Client,
    redirectors: Vec<Regex>,
    unavailable: Vec<Regex>,
}

fn compile(patterns: &[String], key: &str) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| Error::Config {
                message: format!("invalid pattern '{pattern}': {e}"),
                key: Some(key.to_string()),
            })
        })
        .collect()
}

impl LinkChecker {
    pub(crate) fn new(config: &LinkCheckConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.probe_timeout)
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            redirectors: compile(&config.redirector_patterns, "link_check.redirector_patterns")?,
            unavailable: compile(&config.unavailable_patterns, "link_check.unavailable_patterns")?,
        })
    }

    pub(crate) fn is_redirector(&self, url: &str) -> bool {
        self.redirectors.iter().any(|re| re.is_match(url))
    }

    fn is_unavailable_page(&self, url: &str) -> bool {
        self.unavailable.iter().any(|re| re.is_match(url))
    }

    /// Follow a shortener/protector URL to the hoster link behind it
    pub(crate) async fn follow_redirector(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::LinkResolution(format!("redirector {url} failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(Error::LinkResolution(format!(
                "redirector {url} returned {status}"
            )));
        }

        let target = response.url().to_string();
        if target == url || self.is_redirector(&target) {
            return Err(Error::LinkResolution(format!(
                "redirector {url} did not lead to a hoster link"
            )));
        }

        tracing::debug!(%url, %target, "Followed redirector");
        Ok(target)
    }

    /// HEAD, falling back to a one-byte ranged GET when HEAD is not allowed
    async fn probe(&self, url: &str) -> reqwest::Result<Response> {
        let response = self.client.head(url).send().await?;
        if response.status() != StatusCode::METHOD_NOT_ALLOWED {
            return Ok(response);
        }
        self.client.get(url).header(RANGE, "bytes=0-0").send().await
    }

    /// Reject links that are known to be gone
    ///
    /// A 404, or a redirect onto a hoster's "file not found" page, is fatal. Anything
    /// else (other error statuses, timeouts) is left for the provider to judge.
    pub(crate) async fn ensure_available(&self, url: &str) -> Result<()> {
        let response = match self.probe(url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Availability probe failed, continuing");
                return Ok(());
            }
        };

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::LinkResolution(format!("link is dead (404): {url}")));
        }

        let final_url = response.url().as_str();
        if final_url != url && self.is_unavailable_page(final_url) {
            return Err(Error::LinkResolution(format!(
                "link redirects to an unavailable page: {final_url}"
            )));
        }

        if !response.status().is_success() {
            tracing::warn!(%url, status = %response.status(), "Availability probe returned an error status");
        }
        Ok(())
    }

    /// File name and size of an unlocked link
    ///
    /// Fails only on an explicit HTTP error status; a probe that cannot be made yields
    /// empty details.
    pub(crate) async fn file_details(&self, url: &str) -> Result<FileDetails> {
        let response = match self.probe(url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Could not read file details");
                return Ok(FileDetails::default());
            }
        };

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(Error::LinkResolution(format!(
                "unlocked link returned {status}"
            )));
        }

        Ok(FileDetails {
            filename: filename_from_headers(response.headers(), response.url().as_str()),
            size: content_size(response.headers()),
        })
    }
}
