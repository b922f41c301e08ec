// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn ws_target_maps_schemes() {
    assert_eq!(ws_target("http://localhost:3000", "/socket"), "ws://localhost:3000/socket");
    assert_eq!(ws_target("https://localhost:3000", "/socket"), "wss://localhost:3000/socket");
    assert_eq!(
        ws_target("http://localhost:3000", "/socket?room=1"),
        "ws://localhost:3000/socket?room=1"
    );
}

#[test]
fn ws_target_bare_host_defaults_to_ws() {
    assert_eq!(ws_target("localhost:3000", "/x"), "ws://localhost:3000/x");
}

#[test]
fn upgrade_detection_is_case_insensitive() {
    let mut headers = axum::http::HeaderMap::new();
    assert!(!wants_upgrade(&headers));

    headers.insert("upgrade", axum::http::HeaderValue::from_static("WebSocket"));
    assert!(wants_upgrade(&headers));

    headers.insert("upgrade", axum::http::HeaderValue::from_static("h2c"));
    assert!(!wants_upgrade(&headers));
}
