// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket pass-through: proxied upgrade requests are accepted on the
//! proxy side and relayed frame-by-frame to the backend. No rewriting is
//! applied to WebSocket traffic.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as AxMessage, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as TgMessage;

use crate::registry::ProxyShared;

/// Whether an incoming request asks for a WebSocket upgrade.
pub fn wants_upgrade(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Rewrite the proxy target base URL into a ws:// (or wss://) URL for the
/// given path and query.
pub fn ws_target(base: &str, path_and_query: &str) -> String {
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{base}")
    };
    crate::forward::join_target(&ws_base, path_and_query)
}

/// Handle a proxied WebSocket upgrade: dial the backend first so a dial
/// failure surfaces as 502 on the upgrade request, then relay both ways.
pub async fn relay_upgrade(
    shared: Arc<ProxyShared>,
    path_and_query: String,
    ws: WebSocketUpgrade,
) -> Response {
    let url = ws_target(&shared.target().await, &path_and_query);

    let dial = tokio::time::timeout(
        Duration::from_secs(10),
        tokio_tungstenite::connect_async(&url),
    )
    .await;

    let backend = match dial {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(e)) => {
            tracing::debug!(target = %url, err = %e, "ws relay: backend dial failed");
            return (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response();
        }
        Err(_) => {
            tracing::debug!(target = %url, "ws relay: backend dial timed out");
            return (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response();
        }
    };

    ws.on_upgrade(move |client| relay(client, backend))
}

async fn relay(
    client: WebSocket,
    backend: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut backend_tx, mut backend_rx) = backend.split();

    loop {
        tokio::select! {
            msg = client_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let forward = match msg {
                    AxMessage::Text(t) => TgMessage::Text(t.as_str().into()),
                    AxMessage::Binary(b) => TgMessage::Binary(b),
                    AxMessage::Ping(p) => TgMessage::Ping(p),
                    AxMessage::Pong(p) => TgMessage::Pong(p),
                    AxMessage::Close(_) => break,
                };
                if backend_tx.send(forward).await.is_err() {
                    break;
                }
            }
            msg = backend_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let forward = match msg {
                    TgMessage::Text(t) => AxMessage::Text(t.as_str().into()),
                    TgMessage::Binary(b) => AxMessage::Binary(b),
                    TgMessage::Ping(p) => AxMessage::Ping(p),
                    TgMessage::Pong(p) => AxMessage::Pong(p),
                    TgMessage::Close(_) => break,
                    TgMessage::Frame(_) => continue,
                };
                if client_tx.send(forward).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = client_tx.close().await;
    let _ = backend_tx.close().await;
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
