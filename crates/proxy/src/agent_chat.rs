// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-chat proxy: the same forwarding and WebSocket relay as the
//! preview proxy, with no debug hub, no injection, no shell page.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::registry::ProxyShared;
use crate::{forward, relay};

pub fn router(shared: Arc<ProxyShared>) -> Router {
    Router::new().fallback(proxy_fallback).with_state(shared)
}

async fn proxy_fallback(State(shared): State<Arc<ProxyShared>>, req: Request) -> Response {
    if relay::wants_upgrade(req.headers()) {
        let (mut parts, _body) = req.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| "/".into());
        return match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(ws) => relay::relay_upgrade(shared, path_and_query, ws).await,
            Err(e) => e.into_response(),
        };
    }
    forward::proxy_request(&shared, req, false).await
}
