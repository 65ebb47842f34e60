//! End-to-end flow: inbound event -> match -> queue -> fetch -> extract.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::FileOptions;

use artifact_fetcher::server::create_router;
use artifact_fetcher::{
    AppState, ArtifactClient, ArtifactConfig, Config, Fetcher, Filter, MatchResponse,
};

fn zip_bytes(file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer.start_file(file_name, FileOptions::default()).unwrap();
    writer.write_all(content).unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn event_notification_triggers_download_and_hooks() {
    let api = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();
    let hook_log = dest.path().join("hooks.log");

    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello/actions/runs/42/artifacts"))
        .and(header("Authorization", "token secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "artifacts": [{
                "id": 11,
                "node_id": "node-11",
                "name": "dist",
                "size_in_bytes": 64,
                "url": format!("{}/artifacts/11", api.uri()),
                "archive_download_url": format!("{}/artifacts/11/zip", api.uri()),
                "expired": false,
                "created_at": "2024-01-10T14:59:22Z",
                "updated_at": "2024-01-10T14:59:22Z",
                "expires_at": "2024-04-10T14:59:22Z"
            }]
        })))
        .mount(&api)
        .await;

    Mock::given(method("GET"))
        .and(path("/artifacts/11/zip"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(zip_bytes("build/dist.txt", b"payload")),
        )
        .mount(&api)
        .await;

    let config = Config {
        artifacts: vec![ArtifactConfig {
            filter: Filter {
                event: Some("push".to_string()),
                workflow: None,
            },
            repo: "octocat/hello".to_string(),
            name: "nightly".to_string(),
            path: dest.path().to_path_buf(),
            before: vec![format!(
                "echo \"before $ARTIFACT_NAME\" >> {}",
                hook_log.display()
            )],
            after: vec![format!(
                "echo \"after $ARTIFACT_NAME\" >> {}",
                hook_log.display()
            )],
            github_token: "secret".to_string(),
        }],
        ..Config::default()
    };

    let fetcher = Arc::new(Fetcher::new(ArtifactClient::with_base_url(api.uri())));
    fetcher.start().await;

    let state = AppState::new(Arc::new(config), Arc::clone(&fetcher));
    let router = create_router(state);

    let payload = json!({
        "event": "push",
        "repository": "octocat/hello",
        "commit": "abc123",
        "ref": "refs/heads/main",
        "head": "main",
        "workflow": "ci",
        "requestID": "req-1",
        "data": { "run_id": 42 }
    });

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/receive")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: MatchResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.matches_count, 1);

    // Wait for the single worker to process the queued task
    let extracted = dest.path().join("build/dist.txt");
    for _ in 0..200 {
        if extracted.exists() && hook_log.exists() {
            let log = std::fs::read_to_string(&hook_log).unwrap();
            if log.lines().count() == 2 {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    assert_eq!(std::fs::read(&extracted).unwrap(), b"payload");
    assert_eq!(
        std::fs::read_to_string(&hook_log).unwrap(),
        "before dist\nafter dist\n"
    );

    fetcher.stop().await;
}
