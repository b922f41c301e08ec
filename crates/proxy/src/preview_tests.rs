// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::hub::HubRole;
use crate::registry::{ProxyKind, ProxyServers};

async fn preview_shared() -> Arc<crate::registry::ProxyShared> {
    let servers = ProxyServers::new(ProxyKind::Preview, true);
    servers.acquire(3000, None, "dark").await.unwrap()
}

#[tokio::test]
async fn serves_inject_js() {
    let shared = preview_shared().await;
    let server = axum_test::TestServer::new(super::router(shared)).unwrap();

    let resp = server.get("/__swe-swe-debug__/inject.js").await;
    resp.assert_status_ok();
    assert!(resp.header("content-type").to_str().unwrap().contains("javascript"));
    assert!(resp.text().contains("queryResult"));
}

#[tokio::test]
async fn serves_shell_page() {
    let shared = preview_shared().await;
    let server = axum_test::TestServer::new(super::router(shared)).unwrap();

    let resp = server.get("/__swe-swe-shell__").await;
    resp.assert_status_ok();
    assert!(resp.text().contains("<iframe"));
}

#[tokio::test]
async fn open_forwards_to_observers() {
    let shared = preview_shared().await;
    let hub = shared.hub.clone().unwrap();
    let (_id, mut rx) = hub.join(HubRole::Observer).await;

    let server = axum_test::TestServer::new(super::router(shared)).unwrap();
    let resp = server
        .get("/__swe-swe-debug__/open")
        .add_query_param("url", "http://localhost:3000/x")
        .await;
    resp.assert_status(axum::http::StatusCode::NO_CONTENT);

    let msg = rx.recv().await.unwrap();
    let v: serde_json::Value = serde_json::from_str(&msg).unwrap();
    assert_eq!(v["t"], "open");
    assert_eq!(v["url"], "http://localhost:3000/x");
}

#[tokio::test]
async fn open_requires_url_param() {
    let shared = preview_shared().await;
    let server = axum_test::TestServer::new(super::router(shared)).unwrap();
    let resp = server.get("/__swe-swe-debug__/open").await;
    assert!(resp.status_code().is_client_error());
}
