// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn bind_local() -> std::net::TcpListener {
    std::net::TcpListener::bind("127.0.0.1:0").unwrap()
}

#[tokio::test]
async fn acquire_release_refcounts() {
    let servers = ProxyServers::new(ProxyKind::AgentChat, false);
    let listener = bind_local();

    let a = servers.acquire(4007, Some(listener), "dark").await.unwrap();
    assert_eq!(servers.ref_count(4007).await, 1);

    // Second acquire shares the same server, listener not needed.
    let b = servers.acquire(4007, None, "dark").await.unwrap();
    assert_eq!(servers.ref_count(4007).await, 2);
    assert!(Arc::ptr_eq(&a, &b));

    servers.release(4007).await;
    assert_eq!(servers.ref_count(4007).await, 1);
    servers.release(4007).await;
    assert_eq!(servers.ref_count(4007).await, 0);
}

#[tokio::test]
async fn release_unknown_port_is_noop() {
    let servers = ProxyServers::new(ProxyKind::Preview, false);
    servers.release(3999).await;
    assert_eq!(servers.ref_count(3999).await, 0);
}

#[tokio::test]
async fn disabled_registry_drops_listener() {
    let servers = ProxyServers::new(ProxyKind::Preview, true);
    let listener = bind_local();
    let addr = listener.local_addr().unwrap();

    let shared = servers.acquire(3001, Some(listener), "light").await.unwrap();
    assert_eq!(shared.backend_port, 3001);

    // The listener was closed: the port is free to bind again.
    assert!(std::net::TcpListener::bind(addr).is_ok());
}

#[tokio::test]
async fn preview_has_hub_agent_chat_does_not() {
    let preview = ProxyServers::new(ProxyKind::Preview, true);
    let chat = ProxyServers::new(ProxyKind::AgentChat, true);

    let p = preview.acquire(3002, Some(bind_local()), "dark").await.unwrap();
    let c = chat.acquire(4002, Some(bind_local()), "dark").await.unwrap();

    assert!(p.hub.is_some());
    assert!(c.hub.is_none());
}

#[tokio::test]
async fn target_defaults_to_backend_port_and_can_move() {
    let servers = ProxyServers::new(ProxyKind::Preview, true);
    let shared = servers.acquire(3015, Some(bind_local()), "dark").await.unwrap();

    assert_eq!(shared.target().await, "http://localhost:3015");
    shared.set_target("http://localhost:5173".to_owned()).await;
    assert_eq!(shared.target().await, "http://localhost:5173");
}
