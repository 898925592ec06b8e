//! Real-Debrid (REST API 1.0)

use super::{
    ProviderError, ProviderJobStatus, ProviderResult, RemoteStatus, UnlockProvider,
    normalize_base_url,
};
use crate::config::ProviderCredentials;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

const NAME: &str = "realdebrid";
const DEFAULT_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Real-Debrid adapter
///
/// Errors come back as non-2xx responses with `{"error": "...", "error_code": n}`.
pub struct RealDebrid {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UnrestrictedLink {
    download: String,
}

#[derive(Debug, Deserialize)]
struct AddedTorrent {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    id: String,
    #[serde(default)]
    filename: Option<String>,
    status: String,
    #[serde(default)]
    progress: f32,
    #[serde(default)]
    links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {}

/// Map a Real-Debrid torrent status
fn normalize_status(status: &str) -> RemoteStatus {
    match status {
        "downloaded" => RemoteStatus::Ready,
        "queued" | "magnet_conversion" | "waiting_files_selection" => RemoteStatus::Queued,
        "downloading" | "compressing" | "uploading" => RemoteStatus::Downloading,
        "error" | "virus" | "dead" | "magnet_error" => RemoteStatus::Error,
        // Statuses added later by the service are treated as still in progress
        _ => RemoteStatus::Queued,
    }
}

impl RealDebrid {
    /// Create the adapter from configured credentials
    pub fn new(client: reqwest::Client, credentials: &ProviderCredentials) -> Self {
        Self {
            client,
            api_key: credentials.api_key.trim().to_string(),
            base_url: normalize_base_url(
                credentials.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            ),
            enabled: credentials.is_usable(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-2xx response into `ProviderError::Api`
    async fn check(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => (
                err.error_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| status.as_u16().to_string()),
                err.error,
            ),
            Err(_) => (status.as_u16().to_string(), body),
        };

        Err(ProviderError::Api {
            provider: NAME,
            code,
            message,
        })
    }

    async fn json<T: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
        let response = Self::check(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
            provider: NAME,
            message: e.to_string(),
        })
    }

    async fn select_all_files(&self, torrent_id: &str) -> ProviderResult<()> {
        let response = self
            .client
            .post(self.url(&format!("torrents/selectFiles/{torrent_id}")))
            .bearer_auth(&self.api_key)
            .form(&[("files", "all")])
            .send()
            .await?;
        Self::check(response).await?;
        tracing::debug!(provider = NAME, torrent_id, "Selected all files");
        Ok(())
    }
}

#[async_trait]
impl UnlockProvider for RealDebrid {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn unlock_link(&self, url: &str) -> ProviderResult<String> {
        let response = self
            .client
            .post(self.url("unrestrict/link"))
            .bearer_auth(&self.api_key)
            .form(&[("link", url)])
            .send()
            .await?;
        let link: UnrestrictedLink = Self::json(response).await?;
        Ok(link.download)
    }

    fn supports_containers(&self) -> bool {
        true
    }

    async fn submit_container(&self, bytes: &[u8], _name: &str) -> ProviderResult<String> {
        let response = self
            .client
            .put(self.url("torrents/addTorrent"))
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/x-bittorrent")
            .body(bytes.to_vec())
            .send()
            .await?;
        let added: AddedTorrent = Self::json(response).await?;
        Ok(added.id)
    }

    async fn poll_status(&self, provider_job_id: &str) -> ProviderResult<ProviderJobStatus> {
        let response = self
            .client
            .get(self.url(&format!("torrents/info/{provider_job_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let info: TorrentInfo = Self::json(response).await?;

        // The torrent does not start until files are chosen
        if info.status == "waiting_files_selection" {
            self.select_all_files(&info.id).await?;
        }

        let status = normalize_status(&info.status);
        Ok(ProviderJobStatus {
            id: info.id,
            status,
            progress: info.progress,
            links: info.links,
            filename: info.filename,
            error: (status == RemoteStatus::Error).then_some(info.status),
        })
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        let response = self
            .client
            .get(self.url("user"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let _: UserInfo = Self::json(response).await?;
        Ok(())
    }
}
