// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preview proxy router: debug endpoints, the shell page, and a fallback
//! that forwards everything else to the user's app with debug-script
//! injection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::hub::{DebugHub, HubRole};
use crate::registry::ProxyShared;
use crate::{forward, inject, relay};

pub fn router(shared: Arc<ProxyShared>) -> Router {
    Router::new()
        .route("/__swe-swe-debug__/inject.js", get(inject_js))
        .route("/__swe-swe-debug__/ws", get(page_ws))
        .route("/__swe-swe-debug__/agent", get(agent_ws))
        .route("/__swe-swe-debug__/ui", get(ui_ws))
        .route("/__swe-swe-debug__/open", get(open_url))
        .route("/__swe-swe-shell__", get(shell_page))
        .fallback(proxy_fallback)
        .with_state(shared)
}

async fn inject_js() -> Response {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], inject::INJECT_JS)
        .into_response()
}

async fn shell_page() -> Html<&'static str> {
    Html(inject::SHELL_HTML)
}

#[derive(Debug, Deserialize)]
struct OpenQuery {
    url: String,
}

/// `GET /__swe-swe-debug__/open?url=…` — forwarded to UI observers; used
/// by the in-container `xdg-open` shim.
async fn open_url(
    State(shared): State<Arc<ProxyShared>>,
    Query(q): Query<OpenQuery>,
) -> Response {
    match shared.hub {
        Some(ref hub) => {
            hub.open_url(&q.url).await;
            StatusCode::NO_CONTENT.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn page_ws(State(shared): State<Arc<ProxyShared>>, ws: WebSocketUpgrade) -> Response {
    hub_upgrade(shared, HubRole::Page, ws)
}

async fn agent_ws(State(shared): State<Arc<ProxyShared>>, ws: WebSocketUpgrade) -> Response {
    hub_upgrade(shared, HubRole::Agent, ws)
}

async fn ui_ws(State(shared): State<Arc<ProxyShared>>, ws: WebSocketUpgrade) -> Response {
    hub_upgrade(shared, HubRole::Observer, ws)
}

fn hub_upgrade(shared: Arc<ProxyShared>, role: HubRole, ws: WebSocketUpgrade) -> Response {
    let Some(hub) = shared.hub.clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    ws.on_upgrade(move |socket| hub_connection(hub, role, socket))
}

/// Per-connection loop: forward routed hub messages out, route incoming
/// text in. An agent whose receiver closes has been replaced.
async fn hub_connection(hub: Arc<DebugHub>, role: HubRole, socket: WebSocket) {
    let (id, mut rx) = hub.join(role).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            routed = rx.recv() => {
                match routed {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => hub.route(role, text.as_str()).await,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    hub.leave(role, id).await;
    let _ = ws_tx.close().await;
}

/// Everything that is not a debug endpoint is proxied to the app, with
/// WebSocket upgrades relayed at the frame level.
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
    forward::proxy_request(&shared, req, true).await
}

#[cfg(test)]
#[path = "preview_tests.rs"]
mod tests;
