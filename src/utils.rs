//! Utility functions for file names, paths and HTTP response metadata

use crate::error::{Error, PostProcessError, Result};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, HeaderMap};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Get a path that does not exist yet, adding ` (1)`, ` (2)`, ... before the extension
///
/// # Examples
///
/// ```
/// use debrid_dl::utils::unique_path;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/debrid-dl-doc/movie.mkv");
/// let unique = unique_path(path).unwrap();
/// // If /tmp/debrid-dl-doc/movie.mkv exists, returns /tmp/debrid-dl-doc/movie (1).mkv
/// # let _ = unique;
/// ```
pub fn unique_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
        Error::PostProcess(PostProcessError::InvalidPath {
            path: path.to_path_buf(),
            reason: "cannot extract file stem".to_string(),
        })
    })?;

    let extension = path.extension().and_then(|e| e.to_str());

    let parent = path.parent().ok_or_else(|| {
        Error::PostProcess(PostProcessError::InvalidPath {
            path: path.to_path_buf(),
            reason: "cannot extract parent directory".to_string(),
        })
    })?;

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        let new_path = parent.join(new_name);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(Error::PostProcess(PostProcessError::InvalidPath {
        path: path.to_path_buf(),
        reason: format!("no free name after {MAX_RENAME_ATTEMPTS} attempts"),
    }))
}

/// Make a name safe to use as a single path component
///
/// Path separators and control characters become `_`; leading dots are stripped so the
/// result can never be `.`/`..` or a hidden file. Empty results become `download`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.').trim();
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Recover a filename (with extension) from response headers or the final URL
///
/// Tries `Content-Disposition` (`filename=` then RFC 5987 `filename*=`), then the last
/// non-empty path segment of `url`. Returns `None` when neither yields a name, so the
/// caller can keep the name it already has.
pub fn filename_from_headers(headers: &HeaderMap, url: &str) -> Option<String> {
    if let Some(content_disposition) = headers.get(CONTENT_DISPOSITION)
        && let Ok(value) = content_disposition.to_str()
    {
        // Format: attachment; filename="file.mkv" or filename*=UTF-8''file.mkv
        for part in value.split(';') {
            let part = part.trim();
            if let Some(raw) = part.strip_prefix("filename=") {
                let filename = raw.trim_matches('"');
                if !filename.is_empty() {
                    return Some(sanitize_filename(filename));
                }
            } else if let Some(raw) = part.strip_prefix("filename*=") {
                // charset'lang'encoded-filename
                if let Some(idx) = raw.rfind('\'')
                    && let Ok(decoded) = urlencoding::decode(&raw[idx + 1..])
                    && !decoded.is_empty()
                {
                    return Some(sanitize_filename(&decoded));
                }
            }
        }
    }

    filename_from_url(url)
}

/// Last non-empty path segment of a URL, percent-decoded
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let decoded = urlencoding::decode(last).ok()?;
    Some(sanitize_filename(&decoded))
}

/// Total size advertised by a response
///
/// A ranged response (`Content-Range: bytes 0-0/12345`) reports the full size after the
/// slash; otherwise `Content-Length` is used.
pub fn content_size(headers: &HeaderMap) -> Option<u64> {
    if let Some(range) = headers.get(CONTENT_RANGE).and_then(|v| v.to_str().ok())
        && let Some((_, total)) = range.rsplit_once('/')
    {
        return total.trim().parse().ok();
    }

    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .filter(|size| *size > 0)
}
