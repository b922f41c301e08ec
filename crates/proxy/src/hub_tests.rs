// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn page_routes_to_agent_and_observers() {
    let hub = DebugHub::new();
    let (_page, _page_rx) = hub.join(HubRole::Page).await;
    let (_agent, mut agent_rx) = hub.join(HubRole::Agent).await;
    let (_obs, mut obs_rx) = hub.join(HubRole::Observer).await;

    hub.route(HubRole::Page, r#"{"t":"console"}"#).await;

    assert_eq!(agent_rx.recv().await.as_deref(), Some(r#"{"t":"console"}"#));
    assert_eq!(obs_rx.recv().await.as_deref(), Some(r#"{"t":"console"}"#));
}

#[tokio::test]
async fn agent_routes_to_pages_only() {
    let hub = DebugHub::new();
    let (_page, mut page_rx) = hub.join(HubRole::Page).await;
    let (_agent, mut agent_rx) = hub.join(HubRole::Agent).await;
    let (_obs, mut obs_rx) = hub.join(HubRole::Observer).await;

    hub.route(HubRole::Agent, r#"{"t":"query","id":1}"#).await;

    assert_eq!(page_rx.recv().await.as_deref(), Some(r#"{"t":"query","id":1}"#));
    assert!(agent_rx.try_recv().is_err());
    assert!(obs_rx.try_recv().is_err());
}

#[tokio::test]
async fn observer_routes_to_pages() {
    let hub = DebugHub::new();
    let (_page, mut page_rx) = hub.join(HubRole::Page).await;
    let (_obs, _obs_rx) = hub.join(HubRole::Observer).await;

    hub.route(HubRole::Observer, r#"{"t":"navigate","url":"/x"}"#).await;

    assert!(page_rx.recv().await.is_some());
}

#[tokio::test]
async fn new_agent_replaces_old() {
    let hub = DebugHub::new();
    let (_a1, mut rx1) = hub.join(HubRole::Agent).await;
    let (_a2, mut rx2) = hub.join(HubRole::Agent).await;

    // The first agent's sender was dropped: its channel is closed.
    assert!(rx1.recv().await.is_none());

    hub.route(HubRole::Page, "hello").await;
    assert_eq!(rx2.recv().await.as_deref(), Some("hello"));
}

#[tokio::test]
async fn leave_agent_ignores_stale_id() {
    let hub = DebugHub::new();
    let (old_id, _rx1) = hub.join(HubRole::Agent).await;
    let (_new_id, mut rx2) = hub.join(HubRole::Agent).await;

    // Old agent disconnects after being replaced; the new agent stays.
    hub.leave(HubRole::Agent, old_id).await;
    assert!(hub.has_agent().await);

    hub.route(HubRole::Page, "still here").await;
    assert_eq!(rx2.recv().await.as_deref(), Some("still here"));
}

#[tokio::test]
async fn open_url_reaches_observers() {
    let hub = DebugHub::new();
    let (_obs, mut obs_rx) = hub.join(HubRole::Observer).await;
    let (_page, mut page_rx) = hub.join(HubRole::Page).await;

    hub.open_url("http://localhost:3000/docs").await;

    let msg = obs_rx.recv().await.unwrap_or_default();
    let v: serde_json::Value = serde_json::from_str(&msg).unwrap_or_default();
    assert_eq!(v["t"], "open");
    assert_eq!(v["url"], "http://localhost:3000/docs");
    assert!(page_rx.try_recv().is_err());
}
