//! Spawning the external transfer process and classifying how it ended

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};

/// Exit code curl uses when the server refuses a range request
pub const EXIT_RANGE_UNSUPPORTED: i32 = 33;

/// How a transfer process ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferExit {
    /// Exit code 0
    Success,
    /// The server does not honor range requests; the partial file is useless
    ResumeUnsupported,
    /// Any other exit
    Failed {
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Trailing non-progress stderr output
        stderr: String,
    },
}

impl TransferExit {
    /// Classify a finished process
    pub fn classify(status: ExitStatus, stderr: String) -> Self {
        match status.code() {
            Some(0) => TransferExit::Success,
            Some(EXIT_RANGE_UNSUPPORTED) => TransferExit::ResumeUnsupported,
            code => TransferExit::Failed { code, stderr },
        }
    }

    /// Error message for a failed exit
    pub fn describe(&self) -> String {
        match self {
            TransferExit::Success => "transfer finished".to_string(),
            TransferExit::ResumeUnsupported => "server does not support resuming".to_string(),
            TransferExit::Failed { code, stderr } => {
                let head = match code {
                    Some(code) => format!("transfer process exited with code {code}"),
                    None => "transfer process was terminated by a signal".to_string(),
                };
                if stderr.is_empty() {
                    head
                } else {
                    format!("{head}: {stderr}")
                }
            }
        }
    }
}

/// Arguments for one transfer: follow redirects, fail on HTTP errors, write to `output`
pub(crate) fn transfer_args(
    url: &str,
    output: &Path,
    resume: bool,
    extra_args: &[String],
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--location".into(), "--fail".into()];
    if resume {
        args.push("--continue-at".into());
        args.push("-".into());
    }
    args.push("--output".into());
    args.push(output.into());
    args.extend(extra_args.iter().map(OsString::from));
    args.push(url.into());
    args
}

/// Spawn the transfer process with stderr piped for progress parsing
pub(crate) fn spawn(binary: &Path, args: Vec<OsString>) -> std::io::Result<Child> {
    Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}
