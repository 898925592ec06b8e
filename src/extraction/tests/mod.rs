use crate::config::ToolsConfig;
use crate::error::{Error, PostProcessError};
use crate::extraction::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write an executable shell script standing in for an extraction tool
#[cfg(unix)]
fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn tools_without_path_search() -> ToolsConfig {
    ToolsConfig {
        search_path: false,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[test]
fn test_is_archive_recognizes_supported_suffixes() {
    for name in [
        "a.zip",
        "a.rar",
        "a.part01.rar",
        "a.r00",
        "a.7z",
        "a.7z.001",
        "a.tar",
        "a.tar.gz",
        "a.tgz",
        "a.tar.bz2",
        "a.tbz2",
        "a.tar.xz",
        "a.txz",
        "UPPER.ZIP",
    ] {
        assert!(is_archive(name), "{name} should be an archive");
    }
}

#[test]
fn test_is_archive_rejects_other_files() {
    for name in ["movie.mkv", "notes.txt", "archive.zip.txt", ".zip", "file.r01", "gz"] {
        assert!(!is_archive(name), "{name} should not be an archive");
    }
}

#[test]
fn test_detect_picks_tool_family() {
    assert_eq!(ArchiveFormat::detect("x.part2.rar"), Some(ArchiveFormat::Rar));
    assert_eq!(ArchiveFormat::detect("x.r00"), Some(ArchiveFormat::Rar));
    assert_eq!(ArchiveFormat::detect("x.7z.001"), Some(ArchiveFormat::SevenZip));
    assert_eq!(ArchiveFormat::detect("x.tar.gz"), Some(ArchiveFormat::Tar));
    assert_eq!(ArchiveFormat::detect("x.zip"), Some(ArchiveFormat::Zip));
}

#[test]
fn test_archive_base_name_strips_compound_suffixes() {
    assert_eq!(archive_base_name("Show.S01.part01.rar"), "Show.S01");
    assert_eq!(archive_base_name("Show.S01.PART10.RAR"), "Show.S01");
    assert_eq!(archive_base_name("Show.S01.rar"), "Show.S01");
    assert_eq!(archive_base_name("Show.S01.r00"), "Show.S01");
    assert_eq!(archive_base_name("backup.7z.001"), "backup");
    assert_eq!(archive_base_name("data.tar.gz"), "data");
    assert_eq!(archive_base_name("data.tbz2"), "data");
    assert_eq!(archive_base_name("photos.zip"), "photos");
}

#[test]
fn test_archive_base_name_keeps_non_archives_and_odd_parts() {
    assert_eq!(archive_base_name("movie.mkv"), "movie.mkv");
    // ".partial" is not a volume marker
    assert_eq!(archive_base_name("doc.partial.rar"), "doc.partial");
}

// ---------------------------------------------------------------------------
// Tool resolution
// ---------------------------------------------------------------------------

#[test]
fn test_configured_tool_path_wins() {
    let tools = ToolsConfig {
        unzip_path: Some(PathBuf::from("/opt/bin/unzip")),
        ..tools_without_path_search()
    };
    let extractor = ArchiveExtractor::new(tools);
    assert_eq!(
        extractor.tool_for(ArchiveFormat::Zip).unwrap(),
        PathBuf::from("/opt/bin/unzip")
    );
}

#[test]
fn test_missing_tool_without_path_search_is_external_tool_error() {
    let extractor = ArchiveExtractor::new(tools_without_path_search());
    match extractor.tool_for(ArchiveFormat::Rar) {
        Err(Error::ExternalTool(msg)) => assert!(msg.contains("unrar"), "{msg}"),
        other => panic!("expected ExternalTool error, got {other:?}"),
    }
}

#[test]
fn test_path_search_agrees_with_which() {
    let extractor = ArchiveExtractor::new(ToolsConfig::default());
    assert_eq!(
        extractor.tool_for(ArchiveFormat::Tar).is_ok(),
        which::which("tar").is_ok()
    );
}

// ---------------------------------------------------------------------------
// Extraction with stand-in tools
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[tokio::test]
async fn test_extract_returns_top_level_entries() {
    let temp = TempDir::new().unwrap();
    // unzip -o <archive> -d <dest>
    let unzip = fake_tool(
        temp.path(),
        "unzip",
        r#"mkdir -p "$4/sub" && echo a > "$4/a.txt" && echo b > "$4/sub/b.txt""#,
    );
    let archive = temp.path().join("photos.zip");
    std::fs::write(&archive, b"PK").unwrap();
    let dest = temp.path().join("out").join("photos");

    let extractor = ArchiveExtractor::new(ToolsConfig {
        unzip_path: Some(unzip),
        ..tools_without_path_search()
    });
    let entries = extractor
        .extract(&archive, &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(entries, vec![dest.join("a.txt"), dest.join("sub")]);
    assert!(dest.join("sub/b.txt").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_extract_passes_rar_arguments() {
    let temp = TempDir::new().unwrap();
    let args_file = temp.path().join("args");
    let unrar = fake_tool(
        temp.path(),
        "unrar",
        &format!(r#"echo "$@" > "{}""#, args_file.display()),
    );
    let archive = temp.path().join("Show.part01.rar");
    std::fs::write(&archive, b"Rar!").unwrap();
    let dest = temp.path().join("Show");

    let extractor = ArchiveExtractor::new(ToolsConfig {
        unrar_path: Some(unrar),
        ..tools_without_path_search()
    });
    extractor
        .extract(&archive, &dest, &CancellationToken::new())
        .await
        .unwrap();

    let args = std::fs::read_to_string(&args_file).unwrap();
    assert_eq!(
        args.trim(),
        format!("x -o+ -y {} {}/", archive.display(), dest.display())
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_tool_failure_text_is_surfaced_verbatim() {
    let temp = TempDir::new().unwrap();
    let sevenzip = fake_tool(
        temp.path(),
        "7z",
        "echo 'ERROR: Data Error in encrypted file. Wrong password?' >&2; exit 2",
    );
    let archive = temp.path().join("secret.7z");
    std::fs::write(&archive, b"7z").unwrap();

    let extractor = ArchiveExtractor::new(ToolsConfig {
        sevenzip_path: Some(sevenzip),
        ..tools_without_path_search()
    });
    let err = extractor
        .extract(&archive, &temp.path().join("secret"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::PostProcess(PostProcessError::ExtractionFailed { archive: a, reason }) => {
            assert_eq!(a, archive);
            assert_eq!(
                reason,
                "ERROR: Data Error in encrypted file. Wrong password?"
            );
        }
        other => panic!("expected ExtractionFailed, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_silent_failure_reports_exit_status() {
    let temp = TempDir::new().unwrap();
    let tar = fake_tool(temp.path(), "tar", "exit 3");
    let archive = temp.path().join("data.tar");
    std::fs::write(&archive, b"").unwrap();

    let extractor = ArchiveExtractor::new(ToolsConfig {
        tar_path: Some(tar),
        ..tools_without_path_search()
    });
    let err = extractor
        .extract(&archive, &temp.path().join("data"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("exited with status 3"), "{err}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_cancel_kills_tool_and_removes_destination() {
    let temp = TempDir::new().unwrap();
    let unzip = fake_tool(
        temp.path(),
        "unzip",
        r#"echo partial > "$4/partial.bin"; sleep 30"#,
    );
    let archive = temp.path().join("big.zip");
    std::fs::write(&archive, b"PK").unwrap();
    let dest = temp.path().join("big");

    let extractor = ArchiveExtractor::new(ToolsConfig {
        unzip_path: Some(unzip),
        ..tools_without_path_search()
    });
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = extractor.extract(&archive, &dest, &cancel).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(
        err,
        Error::PostProcess(PostProcessError::MoveAborted { .. })
    ));
    assert!(!dest.exists(), "partial extraction must be removed");
}

#[tokio::test]
async fn test_unrecognized_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("movie.mkv");
    std::fs::write(&file, b"x").unwrap();

    let err = ArchiveExtractor::new(tools_without_path_search())
        .extract(&file, &temp.path().join("movie"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PostProcess(PostProcessError::ExtractionFailed { .. })
    ));
}

#[tokio::test]
async fn test_real_tar_extraction() {
    let Ok(tar) = which::which("tar") else {
        println!("Skipping test: tar binary not found in PATH");
        return;
    };
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    std::fs::create_dir(&src).unwrap();
    std::fs::write(src.join("hello.txt"), b"hello").unwrap();
    let archive = temp.path().join("bundle.tar");
    let status = std::process::Command::new(&tar)
        .arg("-cf")
        .arg(&archive)
        .arg("-C")
        .arg(&src)
        .arg("hello.txt")
        .status()
        .unwrap();
    assert!(status.success());

    let dest = temp.path().join(archive_base_name("bundle.tar"));
    let entries = ArchiveExtractor::new(ToolsConfig::default())
        .extract(&archive, &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(entries, vec![dest.join("hello.txt")]);
    assert_eq!(std::fs::read(dest.join("hello.txt")).unwrap(), b"hello");
}
