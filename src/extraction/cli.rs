//! Cancellable execution of extraction tools

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Run `binary` with `args` to completion
///
/// Returns `None` when `cancel` fires first; the child is killed on drop.
pub(super) async fn run(
    binary: &Path,
    args: Vec<OsString>,
    cancel: &CancellationToken,
) -> Result<Option<Output>> {
    let child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            Error::ExternalTool(format!("Failed to execute {}: {}", binary.display(), e))
        })?;

    tokio::select! {
        output = child.wait_with_output() => Ok(Some(output?)),
        _ = cancel.cancelled() => Ok(None),
    }
}

/// What the tool said on failure: stderr, else stdout, else the exit status
pub(super) fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim_end().to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim_end().to_string();
    }
    match output.status.code() {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_string(),
    }
}
