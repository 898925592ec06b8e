//! Configuration types for debrid-dl

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Download behavior configuration (directories, concurrency, post-processing)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Save directory for finished files (default: "./downloads")
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,

    /// Directory for partial files (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Directory holding submitted torrents until they are resolved (default: "./containers")
    #[serde(default = "default_containers_dir")]
    pub containers_dir: PathBuf,

    /// Maximum jobs in Checking or Downloading at once (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Save into `<save_dir>/<category>` when a category is given (default: true)
    #[serde(default = "default_true")]
    pub category_subfolders: bool,

    /// Extract recognized archives after download (default: true)
    #[serde(default = "default_true")]
    pub extract_archives: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            temp_dir: default_temp_dir(),
            containers_dir: default_containers_dir(),
            max_concurrent: default_max_concurrent(),
            category_subfolders: true,
            extract_archives: true,
        }
    }
}

/// External tool paths (transfer process and extractors)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Transfer program (default: "curl")
    #[serde(default = "default_transfer_binary")]
    pub transfer_binary: PathBuf,

    /// Extra arguments passed to the transfer program before the URL
    #[serde(default)]
    pub transfer_args: Vec<String>,

    /// Path to unrar executable (auto-detected if None)
    #[serde(default)]
    pub unrar_path: Option<PathBuf>,

    /// Path to 7z executable (auto-detected if None)
    #[serde(default)]
    pub sevenzip_path: Option<PathBuf>,

    /// Path to unzip executable (auto-detected if None)
    #[serde(default)]
    pub unzip_path: Option<PathBuf>,

    /// Path to tar executable (auto-detected if None)
    #[serde(default)]
    pub tar_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            transfer_binary: default_transfer_binary(),
            transfer_args: vec![],
            unrar_path: None,
            sevenzip_path: None,
            unzip_path: None,
            tar_path: None,
            search_path: true,
        }
    }
}

/// Credentials and endpoint of one unlocking provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderCredentials {
    /// API key (bearer token)
    pub api_key: String,

    /// Whether the provider takes part in resolution (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Override the API base URL (default: the provider's public endpoint)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderCredentials {
    /// Enabled credentials with the default endpoint
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            enabled: true,
            base_url: None,
        }
    }

    /// Point the provider at another endpoint (used for mocks and proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Enabled and carrying a non-empty key
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty()
    }
}

/// Unlocking provider configuration
///
/// Providers are tried in a fixed order: AllDebrid, then Real-Debrid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// AllDebrid credentials
    #[serde(default)]
    pub alldebrid: Option<ProviderCredentials>,

    /// Real-Debrid credentials
    #[serde(default)]
    pub realdebrid: Option<ProviderCredentials>,

    /// Interval between provider status polls for torrents (default: 5s)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// How long a provider may take to finish a torrent before the next one is tried (default: 24h)
    #[serde(default = "default_container_timeout", with = "duration_serde")]
    pub container_timeout: Duration,

    /// Per-request timeout for provider API calls (default: 30s)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            alldebrid: None,
            realdebrid: None,
            poll_interval: default_poll_interval(),
            container_timeout: default_container_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Availability probing for direct links
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkCheckConfig {
    /// Timeout for the HEAD/ranged GET probe (default: 15s)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// URL patterns (regex) of link shorteners/redirectors that must be followed first
    #[serde(default = "default_redirector_patterns")]
    pub redirector_patterns: Vec<String>,

    /// URL patterns (regex) of pages hosters redirect to when a file is gone
    #[serde(default = "default_unavailable_patterns")]
    pub unavailable_patterns: Vec<String>,
}

impl Default for LinkCheckConfig {
    fn default() -> Self {
        Self {
            probe_timeout: default_probe_timeout(),
            redirector_patterns: default_redirector_patterns(),
            unavailable_patterns: default_unavailable_patterns(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./debrid-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Main configuration for [`DebridDownloader`](crate::DebridDownloader)
///
/// Fields are organized into sub-configs:
/// - [`download`](DownloadConfig): directories, concurrency, post-processing
/// - [`tools`](ToolsConfig): transfer program and extractor paths
/// - [`providers`](ProvidersConfig): unlocking service credentials and polling
/// - [`link_check`](LinkCheckConfig): direct link availability probing
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Unlocking providers
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Direct link probing
    #[serde(default)]
    pub link_check: LinkCheckConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Save directory
    pub fn save_dir(&self) -> &PathBuf {
        &self.download.save_dir
    }

    /// Temporary directory
    pub fn temp_dir(&self) -> &PathBuf {
        &self.download.temp_dir
    }
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_containers_dir() -> PathBuf {
    PathBuf::from("./containers")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./debrid-dl.db")
}

fn default_true() -> bool {
    true
}

fn default_transfer_binary() -> PathBuf {
    PathBuf::from("curl")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_container_timeout() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_redirector_patterns() -> Vec<String> {
    vec![
        r"^https?://(www\.)?dl-protect\.[a-z]+/".to_string(),
        r"^https?://(www\.)?(ouo\.io|shorte\.st|adf\.ly)/".to_string(),
    ]
}

fn default_unavailable_patterns() -> Vec<String> {
    vec![
        r"(?i)/(404|error|file[-_]?not[-_]?found|removed|deleted)(\.html?)?([/?#]|$)".to_string(),
        r"(?i)[?&]e=(404|not_?found|deleted)".to_string(),
    ]
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
