//! AllDebrid (API v4)

use super::{
    ProviderError, ProviderJobStatus, ProviderResult, RemoteStatus, UnlockProvider,
    normalize_base_url,
};
use crate::config::ProviderCredentials;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

const NAME: &str = "alldebrid";
const DEFAULT_BASE_URL: &str = "https://api.alldebrid.com/v4";
const AGENT: &str = "debrid-dl";

/// AllDebrid adapter
///
/// Every response is wrapped in `{"status": "success", "data": ...}` or
/// `{"status": "error", "error": {"code", "message"}}`.
pub struct AllDebrid {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct UnlockData {
    link: String,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    files: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: Option<u64>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    magnets: MagnetsField,
}

/// `magnets` is an object when queried by id, an array otherwise
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MagnetsField {
    One(Box<Magnet>),
    Many(Vec<Magnet>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Magnet {
    id: u64,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    status: String,
    status_code: i64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    downloaded: u64,
    #[serde(default)]
    links: Vec<MagnetLink>,
}

#[derive(Debug, Deserialize)]
struct MagnetLink {
    link: String,
}

#[derive(Debug, Deserialize)]
struct UserData {}

/// Map an AllDebrid magnet status code
///
/// 0 queued, 1 downloading, 2 compressing/moving, 3 uploading, 4 ready, 5+ errors.
fn normalize_status(code: i64) -> RemoteStatus {
    match code {
        0 => RemoteStatus::Queued,
        1..=3 => RemoteStatus::Downloading,
        4 => RemoteStatus::Ready,
        _ => RemoteStatus::Error,
    }
}

impl AllDebrid {
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

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
        let http_status = response.status();
        let body = response.text().await?;

        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
                provider: NAME,
                message: format!("HTTP {}: {}", http_status.as_u16(), e),
            })?;

        if envelope.status != "success" {
            let error = envelope.error.unwrap_or(ApiErrorBody {
                code: format!("HTTP_{}", http_status.as_u16()),
                message: "request failed".to_string(),
            });
            return Err(ProviderError::Api {
                provider: NAME,
                code: error.code,
                message: error.message,
            });
        }

        envelope.data.ok_or_else(|| ProviderError::InvalidResponse {
            provider: NAME,
            message: "success response without data".to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ProviderResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(&[("agent", AGENT)])
            .query(query)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl UnlockProvider for AllDebrid {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn unlock_link(&self, url: &str) -> ProviderResult<String> {
        let data: UnlockData = self.get("link/unlock", &[("link", url)]).await?;
        Ok(data.link)
    }

    fn supports_containers(&self) -> bool {
        true
    }

    async fn submit_container(&self, bytes: &[u8], name: &str) -> ProviderResult<String> {
        let file_name = if name.ends_with(".torrent") {
            name.to_string()
        } else {
            format!("{name}.torrent")
        };
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name)
            .mime_str("application/x-bittorrent")?;
        let form = reqwest::multipart::Form::new().part("files[]", part);

        let response = self
            .client
            .post(self.url("magnet/upload/file"))
            .bearer_auth(&self.api_key)
            .query(&[("agent", AGENT)])
            .multipart(form)
            .send()
            .await?;
        let data: UploadData = Self::decode(response).await?;

        let file = data
            .files
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: NAME,
                message: "upload response lists no files".to_string(),
            })?;

        if let Some(error) = file.error {
            return Err(ProviderError::Api {
                provider: NAME,
                code: error.code,
                message: error.message,
            });
        }

        file.id
            .map(|id| id.to_string())
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: NAME,
                message: "uploaded file has no id".to_string(),
            })
    }

    async fn poll_status(&self, provider_job_id: &str) -> ProviderResult<ProviderJobStatus> {
        let data: StatusData = self
            .get("magnet/status", &[("id", provider_job_id)])
            .await?;

        let magnet = match data.magnets {
            MagnetsField::One(magnet) => *magnet,
            MagnetsField::Many(magnets) => magnets
                .into_iter()
                .find(|m| m.id.to_string() == provider_job_id)
                .ok_or_else(|| ProviderError::InvalidResponse {
                    provider: NAME,
                    message: format!("magnet {provider_job_id} missing from status"),
                })?,
        };

        let status = normalize_status(magnet.status_code);
        let progress = match status {
            RemoteStatus::Ready => 100.0,
            _ if magnet.size > 0 => (magnet.downloaded as f64 / magnet.size as f64 * 100.0) as f32,
            _ => 0.0,
        };

        Ok(ProviderJobStatus {
            id: magnet.id.to_string(),
            status,
            progress,
            links: magnet.links.into_iter().map(|l| l.link).collect(),
            filename: magnet.filename,
            error: (status == RemoteStatus::Error).then_some(magnet.status),
        })
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        let _: UserData = self.get("user", &[]).await?;
        Ok(())
    }
}
