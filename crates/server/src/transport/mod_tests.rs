// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;

use super::*;
use crate::config::Config;

fn test_app(workdir: &std::path::Path) -> Router {
    let config = Config::parse_from([
        "swe-swe",
        "--working-directory",
        &workdir.to_string_lossy(),
        "--no-preview-proxy",
    ]);
    let manager = Arc::new(SessionManager::new(Arc::new(config)));
    build_router(manager)
}

#[tokio::test]
async fn homepage_serves_html() {
    let tmp = tempfile::tempdir().unwrap();
    let server = axum_test::TestServer::new(test_app(tmp.path())).unwrap();
    let resp = server.get("/").await;
    resp.assert_status_ok();
    assert!(resp.text().contains("swe-swe"));
}

#[tokio::test]
async fn recording_list_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let server = axum_test::TestServer::new(test_app(tmp.path())).unwrap();
    let resp = server.get("/api/recording/list").await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>(), serde_json::json!([]));
}

#[tokio::test]
async fn recording_endpoints_404_for_unknown() {
    let tmp = tempfile::tempdir().unwrap();
    let server = axum_test::TestServer::new(test_app(tmp.path())).unwrap();

    let resp = server.delete("/api/recording/nope").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);

    let resp = server.post("/api/recording/nope/keep").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);

    let resp = server.get("/recording/nope").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recording_keep_and_rename_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::parse_from([
        "swe-swe",
        "--working-directory",
        &tmp.path().to_string_lossy(),
        "--no-preview-proxy",
    ]);
    let dir = config.recordings_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let meta = crate::recording::RecordingMeta {
        uuid: "rec-http".to_owned(),
        name: String::new(),
        agent: "claude".to_owned(),
        started_at: chrono::Utc::now(),
        ended_at: Some(chrono::Utc::now()),
        kept_at: None,
        command: vec![],
        visitors: vec![],
        max_cols: 80,
        max_rows: 24,
        playback_cols: 80,
        playback_rows: 24,
        work_dir: String::new(),
    };
    std::fs::write(
        crate::recording::metadata_path(&dir, "rec-http"),
        serde_json::to_vec(&meta).unwrap(),
    )
    .unwrap();
    std::fs::write(crate::recording::log_path(&dir, "rec-http"), b"hello\n").unwrap();

    let manager = Arc::new(SessionManager::new(Arc::new(config)));
    let server = axum_test::TestServer::new(build_router(manager)).unwrap();

    let resp = server.post("/api/recording/rec-http/keep").await;
    resp.assert_status_ok();
    let v: serde_json::Value = resp.json();
    assert!(v["keptAt"].is_string());

    let resp = server
        .patch("/api/recording/rec-http/rename")
        .json(&serde_json::json!({ "name": "My Recording" }))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["name"], "My Recording");

    // Invalid charset is rejected.
    let resp = server
        .patch("/api/recording/rec-http/rename")
        .json(&serde_json::json!({ "name": "bad\nname" }))
        .await;
    resp.assert_status(axum::http::StatusCode::BAD_REQUEST);

    // Playback pages render.
    let resp = server.get("/recording/rec-http").await;
    resp.assert_status_ok();
    assert!(resp.text().contains("session.log"));

    let resp = server.get("/recording/rec-http?render=embedded").await;
    resp.assert_status_ok();
    assert!(resp.text().contains("atob"));

    let resp = server.get("/recording/rec-http/session.log").await;
    resp.assert_status_ok();
    assert_eq!(resp.text(), "hello\n");

    // Download is a zip.
    let resp = server.get("/api/recording/rec-http/download").await;
    resp.assert_status_ok();
    assert!(resp.as_bytes().starts_with(b"PK"));

    // Delete removes the files.
    let resp = server.delete("/api/recording/rec-http").await;
    resp.assert_status_ok();
    let resp = server.get("/api/recording/list").await;
    assert_eq!(resp.json::<serde_json::Value>(), serde_json::json!([]));
}

#[tokio::test]
async fn repo_prepare_validates_mode_and_name() {
    let tmp = tempfile::tempdir().unwrap();
    let server = axum_test::TestServer::new(test_app(tmp.path())).unwrap();

    let resp = server
        .post("/api/repo/prepare")
        .json(&serde_json::json!({ "mode": "bogus" }))
        .await;
    resp.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let resp = server
        .post("/api/repo/prepare")
        .json(&serde_json::json!({ "mode": "create", "name": "bad name" }))
        .await;
    resp.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repo_create_then_conflict() {
    let tmp = tempfile::tempdir().unwrap();
    let server = axum_test::TestServer::new(test_app(tmp.path())).unwrap();

    let resp = server
        .post("/api/repo/prepare")
        .json(&serde_json::json!({ "mode": "create", "name": "newproj" }))
        .await;
    resp.assert_status_ok();
    assert!(tmp.path().join("newproj/.git").exists());

    let resp = server
        .post("/api/repo/prepare")
        .json(&serde_json::json!({ "mode": "create", "name": "newproj" }))
        .await;
    resp.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn worktree_check_requires_name() {
    let tmp = tempfile::tempdir().unwrap();
    let server = axum_test::TestServer::new(test_app(tmp.path())).unwrap();

    let resp = server.get("/api/worktree/check").await;
    resp.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let resp = server.get("/api/worktree/check?name=Fix%20Login").await;
    resp.assert_status_ok();
    let v: serde_json::Value = resp.json();
    assert_eq!(v["branch"], "fix-login");
    assert_eq!(v["exists"], false);
}

#[tokio::test]
async fn session_end_unknown_is_404() {
    let tmp = tempfile::tempdir().unwrap();
    let server = axum_test::TestServer::new(test_app(tmp.path())).unwrap();
    let resp = server.post("/api/session/nope/end").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ws_rejects_invalid_uuid() {
    let tmp = tempfile::tempdir().unwrap();
    let server = axum_test::TestServer::new(test_app(tmp.path())).unwrap();
    let resp = server.get("/ws/bad%20uuid").await;
    assert!(resp.status_code().is_client_error());
}
