//! Shared test helpers for creating DebridDownloader instances in tests.

use crate::config::Config;
use crate::downloader::DebridDownloader;
use crate::providers::{
    ProviderChain, ProviderJobStatus, ProviderResult, RemoteStatus, UnlockProvider,
};
use crate::transfer::TransferSettings;
use crate::types::{Event, JobId, JobInfo, State};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tokio::sync::broadcast;

pub(crate) const WAIT: Duration = Duration::from_secs(10);

/// Argument parsing shared by every stand-in transfer program
pub(crate) const SCRIPT_PRELUDE: &str = r#"#!/bin/sh
out=""; resume=0; url=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2;;
    --continue-at) resume=1; shift 2;;
    --*) shift;;
    *) url="$1"; shift;;
  esac
done
"#;

/// Config with every directory inside `root`
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = root.join("test.db");
    config.download.save_dir = root.join("save");
    config.download.temp_dir = root.join("temp");
    config.download.containers_dir = root.join("containers");
    config.download.max_concurrent = 3;
    config.tools.search_path = false;
    config.providers.poll_interval = Duration::from_millis(10);
    config
}

/// Downloader whose scheduler never starts anything (`max_concurrent = 0`)
///
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader() -> (DebridDownloader, TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.download.max_concurrent = 0;

    let downloader = DebridDownloader::with_providers(config, ProviderChain::new(vec![]))
        .await
        .unwrap();
    (downloader, temp_dir)
}

#[cfg(unix)]
pub(crate) fn write_script(path: &Path, contents: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, contents).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Everything a scenario test needs
pub(crate) struct TestRig {
    pub(crate) downloader: DebridDownloader,
    pub(crate) events: broadcast::Receiver<Event>,
    pub(crate) root: PathBuf,
    _temp: TempDir,
}

/// Options for [`rig`]
pub(crate) struct RigOptions {
    /// Shell body of the stand-in transfer program, run after [`SCRIPT_PRELUDE`]
    pub(crate) script: String,
    pub(crate) providers: Vec<Arc<dyn UnlockProvider>>,
    pub(crate) max_concurrent: usize,
    /// Copy instead of rename, sleeping this long per chunk
    pub(crate) slow_copy: Option<Duration>,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self {
            script: r#"printf 'payload' > "$out""#.to_string(),
            providers: vec![],
            max_concurrent: 3,
            slow_copy: None,
        }
    }
}

/// Downloader driving a stand-in transfer program
#[cfg(unix)]
pub(crate) async fn rig(options: RigOptions) -> TestRig {
    let temp = tempdir().unwrap();
    let root = temp.path().to_path_buf();
    let downloader = start_in(&root, options).await;
    let events = downloader.subscribe();

    TestRig {
        downloader,
        events,
        root,
        _temp: temp,
    }
}

/// Downloader over `root`, reusing whatever database and files it already holds
#[cfg(unix)]
async fn start_in(root: &Path, options: RigOptions) -> DebridDownloader {
    let binary = root.join("fake-curl");
    write_script(&binary, &format!("{SCRIPT_PRELUDE}{}\n", options.script));

    let mut config = test_config(root);
    config.download.max_concurrent = options.max_concurrent;
    config.tools.transfer_binary = binary;

    let mut settings = TransferSettings::from_config(&config);
    if let Some(delay) = options.slow_copy {
        settings = settings.with_forced_copy(delay);
    }
    let providers =
        ProviderChain::new(options.providers).with_poll_interval(Duration::from_millis(10));

    DebridDownloader::build(config, providers, settings)
        .await
        .unwrap()
}

impl TestRig {
    /// Shut the downloader down and start a new one on the same directories
    #[cfg(unix)]
    pub(crate) async fn restart(&mut self, options: RigOptions) {
        self.downloader.shutdown().await.unwrap();
        self.downloader = start_in(&self.root, options).await;
        self.events = self.downloader.subscribe();
    }

    pub(crate) fn save_dir(&self) -> PathBuf {
        self.root.join("save")
    }

    pub(crate) fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Next event matching `pred`, skipping others
    pub(crate) async fn event(&mut self, pred: impl Fn(&Event) -> bool) -> Event {
        tokio::time::timeout(WAIT, async {
            loop {
                match self.events.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Poll until the job reaches `state`
    pub(crate) async fn wait_for_state(&self, id: &JobId, state: State) -> JobInfo {
        wait_for_state(&self.downloader, id, state).await
    }
}

pub(crate) async fn wait_for_state(
    downloader: &DebridDownloader,
    id: &JobId,
    state: State,
) -> JobInfo {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let job = downloader.get(id).await.unwrap();
        if job.state == state {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job stuck in {:?} (wanted {:?}): {:?}",
            job.state,
            state,
            job.error_message
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Single-file real torrent
pub(crate) fn real_torrent(name: &str, length: u64) -> Vec<u8> {
    let mut out = b"d8:announce31:http://tracker.example/announce4:infod".to_vec();
    out.extend_from_slice(format!("6:lengthi{length}e").as_bytes());
    out.extend_from_slice(format!("4:name{}:{}", name.len(), name).as_bytes());
    out.extend_from_slice(b"12:piece lengthi262144e6:pieces0:ee");
    out
}

/// Provider that unlocks every link to `direct` and serves torrents as `links`
pub(crate) struct StubProvider {
    pub(crate) direct: String,
    pub(crate) links: Vec<String>,
}

#[async_trait]
impl UnlockProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn unlock_link(&self, _url: &str) -> ProviderResult<String> {
        Ok(self.direct.clone())
    }

    fn supports_containers(&self) -> bool {
        true
    }

    async fn submit_container(&self, _bytes: &[u8], _name: &str) -> ProviderResult<String> {
        Ok("remote-1".to_string())
    }

    async fn poll_status(&self, provider_job_id: &str) -> ProviderResult<ProviderJobStatus> {
        Ok(ProviderJobStatus {
            id: provider_job_id.to_string(),
            status: RemoteStatus::Ready,
            progress: 100.0,
            links: self.links.clone(),
            filename: None,
            error: None,
        })
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        Ok(())
    }
}
