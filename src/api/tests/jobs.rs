use super::*;
use crate::api::routes::AddJobResponse;
use crate::types::JobId;
use serde_json::json;

async fn add_url(app: &Router, body: serde_json::Value) -> Response {
    app.clone()
        .oneshot(post_json("/api/v1/jobs/url", body))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_add_url_creates_job() {
    let (app, downloader, temp_dir) = test_app().await;

    let response = add_url(
        &app,
        json!({
            "url": "https://hoster.example/f/Movie.mkv",
            "category": "movies",
            "paused": true,
            "priority": "high"
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let AddJobResponse { id } = json_body(response).await;
    assert_eq!(id, JobId::for_url("https://hoster.example/f/Movie.mkv"));

    let job = downloader.get(&id).await.unwrap();
    assert_eq!(job.state, State::Paused);
    assert_eq!(job.category.as_deref(), Some("movies"));
    assert_eq!(job.save_path, temp_dir.path().join("save").join("movies"));
}

#[tokio::test]
async fn test_add_url_rejects_invalid_url() {
    let (app, downloader, _temp_dir) = test_app().await;

    let response = add_url(&app, json!({"url": "ftp://hoster.example/f"})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "validation_error");
    assert!(downloader.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_url_without_url_is_rejected() {
    let (app, _downloader, _temp_dir) = test_app().await;

    let response = add_url(&app, json!({"name": "x"})).await;

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_add_same_url_twice_returns_same_id() {
    let (app, downloader, _temp_dir) = test_app().await;
    let body = json!({"url": "https://hoster.example/f/same"});

    let first: AddJobResponse = json_body(add_url(&app, body.clone()).await).await;
    let second: AddJobResponse = json_body(add_url(&app, body).await).await;

    assert_eq!(first.id, second.id);
    assert_eq!(downloader.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_container_upload() {
    let (app, downloader, _temp_dir) = test_app().await;
    let torrent = real_torrent("Show.S01E01.mkv", 2048);

    let response = app
        .oneshot(post_multipart(
            "/api/v1/jobs/container",
            &[
                ("file", Some("show.torrent"), torrent.as_slice()),
                ("options", None, &br#"{"category": "tv"}"#[..]),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let AddJobResponse { id } = json_body(response).await;
    let job = downloader.get(&id).await.unwrap();
    assert_eq!(job.name, "Show.S01E01.mkv");
    assert_eq!(job.total_bytes, 2048);
    assert_eq!(job.category.as_deref(), Some("tv"));
}

#[tokio::test]
async fn test_add_container_errors() {
    let (app, _downloader, _temp_dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_multipart(
            "/api/v1/jobs/container",
            &[("options", None, &b"{}"[..])],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "missing_file");

    let torrent = real_torrent("a.mkv", 1);
    let response = app
        .clone()
        .oneshot(post_multipart(
            "/api/v1/jobs/container",
            &[
                ("file", Some("a.torrent"), torrent.as_slice()),
                ("options", None, &b"not json"[..]),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "invalid_options");

    let response = app
        .oneshot(post_multipart(
            "/api/v1/jobs/container",
            &[("file", Some("junk.torrent"), &b"garbage"[..])],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(response).await, "malformed_container");
}

#[tokio::test]
async fn test_list_and_filter_jobs() {
    let (app, _downloader, _temp_dir) = test_app().await;
    add_url(&app, json!({"url": "https://hoster.example/f/a"})).await;
    add_url(
        &app,
        json!({"url": "https://hoster.example/f/b", "paused": true}),
    )
    .await;

    let response = app.clone().oneshot(get("/api/v1/jobs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let jobs: Vec<JobInfo> = json_body(response).await;
    assert_eq!(jobs.len(), 2);

    let response = app
        .clone()
        .oneshot(get("/api/v1/jobs?state=paused"))
        .await
        .unwrap();
    let jobs: Vec<JobInfo> = json_body(response).await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "b");

    let response = app
        .oneshot(get("/api/v1/jobs?state=seeding"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_job() {
    let (app, _downloader, _temp_dir) = test_app().await;
    let AddJobResponse { id } =
        json_body(add_url(&app, json!({"url": "https://hoster.example/f/one.bin"})).await).await;

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/jobs/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job: JobInfo = json_body(response).await;
    assert_eq!(job.id, id);
    assert_eq!(job.state, State::Queued);

    let response = app.oneshot(get("/api/v1/jobs/deadbeef")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "job_not_found");
}

#[tokio::test]
async fn test_pause_resume_delete() {
    let (app, downloader, _temp_dir) = test_app().await;
    let AddJobResponse { id } =
        json_body(add_url(&app, json!({"url": "https://hoster.example/f/x"})).await).await;

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/jobs/pause", json!({"ids": [id]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(downloader.get(&id).await.unwrap().state, State::Paused);

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/jobs/resume", json!({"ids": [id]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(downloader.get(&id).await.unwrap().state, State::Queued);

    let response = app
        .oneshot(post_json(
            "/api/v1/jobs/delete",
            json!({"ids": [id], "delete_files": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(downloader.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_control_errors_map_to_status_codes() {
    let (app, downloader, _temp_dir) = test_app().await;
    let AddJobResponse { id } =
        json_body(add_url(&app, json!({"url": "https://hoster.example/f/done"})).await).await;
    downloader
        .db
        .update_state(&id, State::Completed)
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/jobs/pause", json!({"ids": [id]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(error_code(response).await, "invalid_state");

    let response = app
        .oneshot(post_json("/api/v1/jobs/resume", json!({"ids": ["missing"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
