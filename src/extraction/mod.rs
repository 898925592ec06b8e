//! Archive extraction through external tools
//!
//! Formats are recognized by file name suffix and handed to the matching command-line
//! tool (`unrar`, `7z`, `unzip`, `tar`). Tool output on failure is passed through
//! verbatim so the job's error message shows what the tool said.

mod cli;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::ToolsConfig;
use crate::error::{Error, PostProcessError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Archive family, which decides the extraction tool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// RAR, including `.partN.rar` and `.r00` volumes
    Rar,
    /// 7-Zip, including split `.7z.001` volumes
    SevenZip,
    /// ZIP
    Zip,
    /// Tarballs, plain or compressed
    Tar,
}

/// Recognized suffixes, longest first so compound suffixes win
const SUFFIXES: &[(&str, ArchiveFormat)] = &[
    (".tar.bz2", ArchiveFormat::Tar),
    (".7z.001", ArchiveFormat::SevenZip),
    (".tar.gz", ArchiveFormat::Tar),
    (".tar.xz", ArchiveFormat::Tar),
    (".tbz2", ArchiveFormat::Tar),
    (".rar", ArchiveFormat::Rar),
    (".r00", ArchiveFormat::Rar),
    (".zip", ArchiveFormat::Zip),
    (".tar", ArchiveFormat::Tar),
    (".tgz", ArchiveFormat::Tar),
    (".txz", ArchiveFormat::Tar),
    (".7z", ArchiveFormat::SevenZip),
];

impl ArchiveFormat {
    /// Detect the format from a file name
    pub fn detect(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        SUFFIXES
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix) && lower.len() > suffix.len())
            .map(|(_, format)| *format)
    }

    fn tool_names(self) -> &'static [&'static str] {
        match self {
            ArchiveFormat::Rar => &["unrar"],
            ArchiveFormat::SevenZip => &["7z", "7zz", "7za"],
            ArchiveFormat::Zip => &["unzip"],
            ArchiveFormat::Tar => &["tar"],
        }
    }

    fn args(self, archive: &Path, dest: &Path) -> Vec<OsString> {
        match self {
            ArchiveFormat::Rar => {
                // unrar treats the destination as a directory only with a trailing separator
                let mut dest_dir = dest.as_os_str().to_owned();
                dest_dir.push(std::path::MAIN_SEPARATOR_STR);
                vec!["x".into(), "-o+".into(), "-y".into(), archive.into(), dest_dir]
            }
            ArchiveFormat::SevenZip => {
                let mut out = OsString::from("-o");
                out.push(dest);
                vec!["x".into(), "-y".into(), out, archive.into()]
            }
            ArchiveFormat::Zip => vec!["-o".into(), archive.into(), "-d".into(), dest.into()],
            ArchiveFormat::Tar => vec!["-xf".into(), archive.into(), "-C".into(), dest.into()],
        }
    }
}

/// Whether a file name looks like an archive this module can extract
pub fn is_archive(filename: &str) -> bool {
    ArchiveFormat::detect(filename).is_some()
}

/// File name without archive and volume suffixes
///
/// `Show.S01.part01.rar` becomes `Show.S01`, `data.tar.gz` becomes `data`. Names that
/// are not archives are returned unchanged.
pub fn archive_base_name(filename: &str) -> String {
    let lower = filename.to_ascii_lowercase();
    let Some((suffix, format)) = SUFFIXES
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix) && lower.len() > suffix.len())
    else {
        return filename.to_string();
    };

    let mut stem = &filename[..filename.len() - suffix.len()];
    if *format == ArchiveFormat::Rar
        && let Some(idx) = stem.to_ascii_lowercase().rfind(".part")
    {
        let digits = &stem[idx + ".part".len()..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            stem = &stem[..idx];
        }
    }
    stem.to_string()
}

/// Runs extraction tools resolved from [`ToolsConfig`]
#[derive(Clone, Debug)]
pub struct ArchiveExtractor {
    tools: ToolsConfig,
}

impl ArchiveExtractor {
    /// Create an extractor using the configured tool paths
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }

    /// Locate the binary for `format`: configured path first, then PATH
    pub fn tool_for(&self, format: ArchiveFormat) -> Result<PathBuf> {
        let configured = match format {
            ArchiveFormat::Rar => &self.tools.unrar_path,
            ArchiveFormat::SevenZip => &self.tools.sevenzip_path,
            ArchiveFormat::Zip => &self.tools.unzip_path,
            ArchiveFormat::Tar => &self.tools.tar_path,
        };
        if let Some(path) = configured {
            return Ok(path.clone());
        }

        let names = format.tool_names();
        if self.tools.search_path {
            if let Some(found) = names.iter().find_map(|name| which::which(name).ok()) {
                return Ok(found);
            }
            return Err(Error::ExternalTool(format!(
                "{} not found in PATH",
                names.join("/")
            )));
        }

        Err(Error::ExternalTool(format!(
            "no path configured for {} and PATH search is disabled",
            names[0]
        )))
    }

    /// Extract `archive` into `dest` and return the top-level entries created there
    ///
    /// `dest` is created if missing. When `cancel` fires, the tool is killed, `dest` is
    /// removed and `PostProcessError::MoveAborted` is returned.
    pub async fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let filename = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let format = ArchiveFormat::detect(&filename).ok_or_else(|| {
            PostProcessError::ExtractionFailed {
                archive: archive.to_path_buf(),
                reason: "unrecognized archive type".to_string(),
            }
        })?;
        let tool = self.tool_for(format)?;

        tokio::fs::create_dir_all(dest).await?;
        info!(?archive, ?dest, ?format, tool = %tool.display(), "Extracting archive");

        let output = match cli::run(&tool, format.args(archive, dest), cancel).await? {
            Some(output) => output,
            None => {
                warn!(?archive, "Extraction cancelled, removing partial output");
                if let Err(e) = tokio::fs::remove_dir_all(dest).await {
                    debug!(?dest, error = %e, "Could not remove partial extraction");
                }
                return Err(PostProcessError::MoveAborted {
                    dest_path: dest.to_path_buf(),
                }
                .into());
            }
        };

        if !output.status.success() {
            return Err(PostProcessError::ExtractionFailed {
                archive: archive.to_path_buf(),
                reason: cli::failure_text(&output),
            }
            .into());
        }

        let entries = top_level_entries(dest).await?;
        info!(?archive, entries = entries.len(), "Extraction finished");
        Ok(entries)
    }
}

async fn top_level_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}
