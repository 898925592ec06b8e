use super::*;

#[tokio::test]
async fn test_add_direct_link_creates_queued_job() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let mut events = downloader.subscribe();

    let url = "https://hoster.example/f/Movie.2024.mkv";
    let id = downloader
        .add_direct_link(url, AddOptions::default())
        .await
        .unwrap();

    assert_eq!(id, JobId::for_url(url));
    let job = downloader.get(&id).await.unwrap();
    assert_eq!(job.state, State::Queued);
    assert_eq!(job.kind, JobKind::DirectLink);
    assert_eq!(job.name, "Movie.2024.mkv");
    assert_eq!(job.total_bytes, 0);

    let record = downloader.db.get_job(&id).await.unwrap().unwrap();
    assert_eq!(record.origin, url);

    match events.recv().await.unwrap() {
        Event::Queued { id: queued, name } => {
            assert_eq!(queued, id);
            assert_eq!(name, "Movie.2024.mkv");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_add_direct_link_rejects_invalid_urls() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    for url in ["not a url", "ftp://hoster.example/f", "/relative/path"] {
        let err = downloader
            .add_direct_link(url, AddOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{url}: {err:?}");
    }
    assert!(downloader.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_same_link_twice_returns_existing_job() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let url = "https://hoster.example/f/abc";

    let first = downloader
        .add_direct_link(url, AddOptions::default())
        .await
        .unwrap();
    let second = downloader
        .add_direct_link(
            url,
            AddOptions {
                name: Some("renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(first, second);
    let jobs = downloader.list(None).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "abc", "the duplicate must not overwrite the record");
}

#[tokio::test]
async fn test_add_paused_and_named() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let id = downloader
        .add_direct_link(
            "https://hoster.example/f/xyz",
            AddOptions {
                paused: true,
                name: Some("Show.S01E01.mkv".to_string()),
                priority: Priority::High,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let job = downloader.get(&id).await.unwrap();
    assert_eq!(job.state, State::Paused);
    assert_eq!(job.name, "Show.S01E01.mkv");
    assert_eq!(job.priority, Priority::High);
}

#[tokio::test]
async fn test_category_subfolder_and_explicit_save_path() {
    let (downloader, temp_dir) = create_test_downloader().await;

    let with_category = downloader
        .add_direct_link(
            "https://hoster.example/f/1",
            AddOptions {
                category: Some("tv".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let explicit = downloader
        .add_direct_link(
            "https://hoster.example/f/2",
            AddOptions {
                category: Some("tv".to_string()),
                save_path: Some(temp_dir.path().join("elsewhere")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let job = downloader.get(&with_category).await.unwrap();
    assert_eq!(job.save_path, temp_dir.path().join("save").join("tv"));
    assert_eq!(job.category.as_deref(), Some("tv"));

    let job = downloader.get(&explicit).await.unwrap();
    assert_eq!(job.save_path, temp_dir.path().join("elsewhere"));
}

#[tokio::test]
async fn test_direct_link_container_joins_the_direct_link_path() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let url = "https://hoster.example/f/abc123";
    let bytes = encode_direct_link(url, "Movie.2024.1080p.mkv", 4_000_000_000);

    let id = downloader
        .add_container(&bytes, AddOptions::default())
        .await
        .unwrap();

    assert_eq!(id, JobId::for_url(url));
    let job = downloader.get(&id).await.unwrap();
    assert_eq!(job.kind, JobKind::DirectLink);
    assert_eq!(job.name, "Movie.2024.1080p.mkv");
    assert_eq!(job.total_bytes, 4_000_000_000);

    // the raw link maps onto the same job
    let again = downloader
        .add_direct_link(url, AddOptions::default())
        .await
        .unwrap();
    assert_eq!(again, id);
    assert_eq!(downloader.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_real_container_is_stored_by_info_hash() {
    let (downloader, temp_dir) = create_test_downloader().await;
    let bytes = real_torrent("Show.S01E01.mkv", 1_048_576);
    let expected = crate::container::analyze(&bytes).unwrap().id();

    let id = downloader
        .add_container(&bytes, AddOptions::default())
        .await
        .unwrap();
    assert_eq!(id, expected);

    let stored = temp_dir
        .path()
        .join("containers")
        .join(format!("{id}.torrent"));
    assert_eq!(std::fs::read(&stored).unwrap(), bytes);

    let job = downloader.get(&id).await.unwrap();
    assert_eq!(job.kind, JobKind::RealContainer);
    assert_eq!(job.name, "Show.S01E01.mkv");
    assert_eq!(job.total_bytes, 1_048_576);

    let again = downloader
        .add_container(&bytes, AddOptions::default())
        .await
        .unwrap();
    assert_eq!(again, id);
    assert_eq!(downloader.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_torrent_is_not_stored_again() {
    let (downloader, temp_dir) = create_test_downloader().await;
    let bytes = real_torrent("Show.S01E02.mkv", 2048);

    let id = downloader
        .add_container(&bytes, AddOptions::default())
        .await
        .unwrap();
    let stored = temp_dir
        .path()
        .join("containers")
        .join(format!("{id}.torrent"));
    std::fs::remove_file(&stored).unwrap();

    let again = downloader
        .add_container(&bytes, AddOptions::default())
        .await
        .unwrap();
    assert_eq!(again, id);
    assert!(!stored.exists(), "a duplicate must not write the torrent again");
}

#[tokio::test]
async fn test_unstorable_torrent_leaves_no_record() {
    let (downloader, temp_dir) = create_test_downloader().await;
    let containers = temp_dir.path().join("containers");
    std::fs::remove_dir_all(&containers).unwrap();
    std::fs::write(&containers, b"not a directory").unwrap();

    let err = downloader
        .add_container(&real_torrent("Show.S01E03.mkv", 2048), AddOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)), "{err:?}");
    assert!(downloader.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_container_is_rejected() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let err = downloader
        .add_container(b"this is not bencode", AddOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedContainer(_)));
    assert!(downloader.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_no_new_jobs_after_shutdown() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    downloader.shutdown().await.unwrap();

    let err = downloader
        .add_direct_link("https://hoster.example/f/late", AddOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
    assert!(!downloader.is_accepting());
}
