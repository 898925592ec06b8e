//! Moving finished downloads into place

use crate::error::{PostProcessError, Result};
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const COPY_BUFFER: usize = 1024 * 1024;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Knobs for the streamed copy
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CopyOptions {
    /// Skip the rename attempt
    pub(crate) always_copy: bool,
    /// Pause after every chunk (throttles the copy)
    pub(crate) chunk_delay: Option<Duration>,
}

/// Move `src` to `dest`: rename, or a streamed copy across filesystems
///
/// `on_progress` receives the copied byte count roughly every 500ms during a copy.
/// Cancellation removes the partial destination and yields `MoveAborted`.
pub(crate) async fn move_file(
    src: &Path,
    dest: &Path,
    cancel: &CancellationToken,
    options: CopyOptions,
    on_progress: impl FnMut(u64),
) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if !options.always_copy {
        match tokio::fs::rename(src, dest).await {
            Ok(()) => {
                debug!(?src, ?dest, "Renamed into place");
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                info!(?src, ?dest, "Destination is on another filesystem, copying");
            }
            Err(e) => {
                return Err(PostProcessError::MoveFailed {
                    source_path: src.to_path_buf(),
                    dest_path: dest.to_path_buf(),
                    reason: e.to_string(),
                }
                .into());
            }
        }
    }

    copy_file(src, dest, cancel, options.chunk_delay, on_progress).await?;
    tokio::fs::remove_file(src).await?;
    Ok(())
}

async fn copy_file(
    src: &Path,
    dest: &Path,
    cancel: &CancellationToken,
    chunk_delay: Option<Duration>,
    mut on_progress: impl FnMut(u64),
) -> Result<()> {
    let move_failed = |e: std::io::Error| PostProcessError::MoveFailed {
        source_path: src.to_path_buf(),
        dest_path: dest.to_path_buf(),
        reason: e.to_string(),
    };

    let mut reader = tokio::fs::File::open(src).await.map_err(move_failed)?;
    let mut writer = tokio::fs::File::create(dest).await.map_err(move_failed)?;
    let mut buffer = vec![0u8; COPY_BUFFER];
    let mut copied = 0u64;
    let mut last_report = Instant::now();
    on_progress(0);

    loop {
        let step = async {
            let n = reader.read(&mut buffer).await?;
            if n > 0 {
                writer.write_all(&buffer[..n]).await?;
            }
            if let Some(delay) = chunk_delay {
                tokio::time::sleep(delay).await;
            }
            Ok::<usize, std::io::Error>(n)
        };

        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = step => Some(result.map_err(move_failed)?),
        };

        let Some(n) = n else {
            drop(writer);
            if let Err(e) = tokio::fs::remove_file(dest).await {
                debug!(?dest, error = %e, "Could not remove partial copy");
            }
            info!(?dest, copied, "Copy aborted");
            return Err(PostProcessError::MoveAborted {
                dest_path: dest.to_path_buf(),
            }
            .into());
        };

        if n == 0 {
            break;
        }
        copied += n as u64;
        if last_report.elapsed() >= PROGRESS_INTERVAL {
            on_progress(copied);
            last_report = Instant::now();
        }
    }

    writer.flush().await.map_err(move_failed)?;
    writer.sync_all().await.map_err(move_failed)?;
    on_progress(copied);
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[tokio::test]
    async fn rename_moves_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.bin");
        let dest = temp.path().join("nested/dir/a.bin");
        std::fs::write(&src, b"payload").unwrap();

        move_file(&src, &dest, &CancellationToken::new(), CopyOptions::default(), |_| {})
            .await
            .unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn forced_copy_reports_progress_and_removes_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("big.bin");
        let dest = temp.path().join("out/big.bin");
        std::fs::write(&src, vec![7u8; 3 * COPY_BUFFER + 10]).unwrap();

        let mut reports = Vec::new();
        let options = CopyOptions {
            always_copy: true,
            chunk_delay: None,
        };
        move_file(&src, &dest, &CancellationToken::new(), options, |n| reports.push(n))
            .await
            .unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 3 * COPY_BUFFER as u64 + 10);
        assert_eq!(reports.first(), Some(&0));
        assert_eq!(reports.last(), Some(&(3 * COPY_BUFFER as u64 + 10)));
    }

    #[tokio::test]
    async fn cancelled_copy_removes_partial_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("big.bin");
        let dest = temp.path().join("big.out");
        std::fs::write(&src, vec![1u8; 8 * COPY_BUFFER]).unwrap();

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        let options = CopyOptions {
            always_copy: true,
            chunk_delay: Some(Duration::from_millis(100)),
        };
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            canceller.cancel();
        });

        let err = move_file(&src, &dest, &cancel, options, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::PostProcess(PostProcessError::MoveAborted { .. })
        ));
        assert!(!dest.exists(), "partial destination must be removed");
        assert!(src.exists(), "source stays when the copy is aborted");
    }

    #[tokio::test]
    async fn missing_source_is_move_failed() {
        let temp = TempDir::new().unwrap();
        let err = move_file(
            &temp.path().join("missing"),
            &temp.path().join("dest"),
            &CancellationToken::new(),
            CopyOptions::default(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            Error::PostProcess(PostProcessError::MoveFailed { .. })
        ));
    }
}
