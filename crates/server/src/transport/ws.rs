// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session WebSocket handler: viewer membership, terminal I/O, resize and
//! upload frames, and the JSON control plane.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures_util::StreamExt;
use nix::sys::signal::Signal;
use serde::Deserialize;

use crate::assistant;
use crate::chunk;
use crate::error::ErrorCode;
use crate::recording::valid_display_name;
use crate::session::{CreateParams, Session};
use crate::transport::conn::ViewerConn;
use crate::transport::ws_msg::{
    parse_resize, parse_upload, sanitize_upload_name, ClientMessage, ServerMessage, FRAME_RESIZE,
    FRAME_UPLOAD,
};
use crate::transport::App;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub assistant: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub pwd: String,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub theme: String,
}

/// Duration of the post-MOTD input grace window.
const INPUT_GRACE: Duration = Duration::from_secs(3);

pub fn valid_session_uuid(uuid: &str) -> bool {
    !uuid.is_empty()
        && uuid.len() <= 64
        && uuid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// `GET /ws/{uuid}?assistant=&name=&branch=&pwd=&parent=&theme=`
pub async fn ws_handler(
    State(app): State<App>,
    Path(uuid): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if !valid_session_uuid(&uuid) {
        return ErrorCode::BadRequest.to_http_response("invalid session uuid").into_response();
    }
    ws.on_upgrade(move |socket| handle_connection(app, uuid, query, socket))
}

async fn handle_connection(app: App, uuid: String, query: WsQuery, socket: WebSocket) {
    let assistant_key =
        if query.assistant.is_empty() { "claude".to_owned() } else { query.assistant.clone() };
    let params = CreateParams {
        uuid: uuid.clone(),
        assistant: assistant_key,
        name: query.name.clone(),
        branch: query.branch.clone(),
        pwd: query.pwd.clone(),
        parent: query.parent.clone(),
        theme: query.theme.clone(),
    };

    let (created, session) = match app.manager.get_or_create(params).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(session = %uuid, err = %e, "session creation failed");
            return;
        }
    };

    let (sink, mut stream) = socket.split();
    let conn = Arc::new(ViewerConn::new(sink));
    let viewer_id = session.add_viewer(Arc::clone(&conn)).await;

    if created {
        session.start_reader();
        if session.assistant.slash_format.supported() {
            let banner = assistant::motd(
                &session.assistant,
                session.preview_port,
                session.proxy_offset,
            );
            session.feed_and_broadcast(banner.as_bytes()).await;
            session.set_input_grace(INPUT_GRACE).await;
        }
    } else {
        send_backlog(&session, &conn).await;
    }

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Binary(data) => handle_binary(&app, &session, viewer_id, &conn, &data).await,
            Message::Text(text) => handle_text(&app, &session, &conn, text.as_str()).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    session.remove_viewer(viewer_id).await;
}

/// Deliver the scrollback ring and a screen snapshot to a late joiner,
/// both gzip-chunked.
async fn send_backlog(session: &Arc<Session>, conn: &Arc<ViewerConn>) {
    let (ring_bytes, snapshot) = {
        let term = session.term().await;
        (term.ring.snapshot(), term.screen.snapshot_ansi())
    };
    for frame in chunk::encode(&ring_bytes).frames() {
        if conn.send_binary(frame).await.is_err() {
            return;
        }
    }
    for frame in chunk::encode(&snapshot).frames() {
        if conn.send_binary(frame).await.is_err() {
            return;
        }
    }
}

async fn handle_binary(
    _app: &App,
    session: &Arc<Session>,
    viewer_id: u64,
    conn: &Arc<ViewerConn>,
    data: &[u8],
) {
    match data.first() {
        Some(&FRAME_RESIZE) if data.len() >= 5 => {
            if let Some((rows, cols)) = parse_resize(data) {
                session.set_viewer_dims(viewer_id, rows, cols).await;
            }
        }
        Some(&FRAME_UPLOAD) if data.len() >= 3 => {
            let reply = handle_upload(session, data).await;
            let _ = conn.send_json(&reply).await;
        }
        _ => session.write_input(data).await,
    }
}

async fn handle_upload(session: &Arc<Session>, frame: &[u8]) -> ServerMessage {
    let Some((raw_name, bytes)) = parse_upload(frame) else {
        return upload_error("malformed upload frame");
    };
    let Some(name) = sanitize_upload_name(&raw_name) else {
        tracing::warn!(session = %session.uuid, name = %raw_name, "upload rejected: bad filename");
        return upload_error("invalid filename");
    };

    let dir = session.work_dir.join(".swe-swe").join("uploads");
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        tracing::warn!(session = %session.uuid, err = %e, "upload dir creation failed");
        return upload_error("failed to create upload directory");
    }
    let path = dir.join(&name);
    if let Err(e) = tokio::fs::write(&path, bytes).await {
        tracing::warn!(session = %session.uuid, err = %e, "upload write failed");
        return upload_error("failed to write file");
    }

    // Hand the agent the file by path so it can read it from disk.
    session.write_input(path.to_string_lossy().as_bytes()).await;

    ServerMessage::FileUpload { success: true, filename: Some(name), error: None }
}

fn upload_error(message: &str) -> ServerMessage {
    ServerMessage::FileUpload { success: false, filename: None, error: Some(message.to_owned()) }
}

async fn handle_text(app: &App, session: &Arc<Session>, conn: &Arc<ViewerConn>, text: &str) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(session = %session.uuid, err = %e, "unparseable control message");
            return;
        }
    };

    match msg {
        ClientMessage::Ping { data } => {
            let _ = conn.send_json(&ServerMessage::Pong { data }).await;
        }
        ClientMessage::Chat { user_name, text } => {
            session
                .broadcast_json(&ServerMessage::Chat {
                    user_name,
                    text,
                    timestamp: Utc::now().to_rfc3339(),
                })
                .await;
        }
        ClientMessage::RenameSession { name } => {
            if !valid_display_name(&name) {
                tracing::warn!(session = %session.uuid, "rename rejected by validation");
                return;
            }
            app.manager.rename_session(session, &name).await;
        }
        ClientMessage::ToggleYolo => {
            let Some(mode) = session.toggle_yolo().await else {
                tracing::debug!(
                    session = %session.uuid,
                    assistant = %session.assistant.name,
                    "yolo toggle ignored: not supported"
                );
                return;
            };
            session.broadcast_status().await;
            let word = if mode { "ON" } else { "OFF" };
            let line =
                format!("\r\n\x1b[33m[Switching YOLO mode {word}, restarting agent...]\x1b[0m\r\n");
            session.feed_and_broadcast(line.as_bytes()).await;
            // The reader loop picks up the staged replacement after exit.
            session.send_signal(Signal::SIGTERM).await;
        }
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
