// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers: pages, the git/worktree API, the recording API, and
//! session termination.

use std::path::PathBuf;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use base64::Engine;
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::recording;
use crate::session::SessionInfo;
use crate::transport::App;
use crate::worktree;

// -- Pages --------------------------------------------------------------------

/// `GET /` — minimal homepage listing assistants and recent recordings.
pub async fn home(State(app): State<App>) -> Html<String> {
    let mut items = String::new();
    for (key, cfg) in &app.manager.assistants {
        if !cfg.homepage || !crate::assistant::binary_available(cfg.binary) {
            continue;
        }
        let uuid = uuid::Uuid::new_v4();
        items.push_str(&format!(
            r#"<li><a href="/session/{uuid}?assistant={key}">{key}</a></li>"#
        ));
    }

    let mut recordings = String::new();
    for meta in recording::list_recordings(&app.manager.config.recordings_dir()).into_iter().take(20)
    {
        let label = if meta.name.is_empty() { meta.uuid.clone() } else { meta.name.clone() };
        recordings.push_str(&format!(
            r#"<li><a href="/recording/{}">{}</a> <small>{} · {}</small></li>"#,
            meta.uuid,
            html_escape(&label),
            meta.agent,
            meta.started_at.to_rfc3339(),
        ));
    }

    Html(format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>swe-swe</title></head>
<body><h1>swe-swe</h1>
<h2>New session</h2><ul>{items}</ul>
<h2>Recordings</h2><ul>{recordings}</ul>
</body></html>"#
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionPageQuery {
    #[serde(default)]
    pub assistant: String,
}

/// `GET /session/{uuid}?assistant=` — session page; redirects when the
/// assistant query does not match the running session.
pub async fn session_page(
    State(app): State<App>,
    Path(uuid): Path<String>,
    Query(query): Query<SessionPageQuery>,
) -> Response {
    if let Some(session) = app.manager.get(&uuid).await {
        if !query.assistant.is_empty() && query.assistant != session.assistant.name {
            let target = format!("/session/{uuid}?assistant={}", session.assistant.name);
            return Redirect::to(&target).into_response();
        }
    }
    let assistant = if query.assistant.is_empty() { "claude" } else { query.assistant.as_str() };
    Html(format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>swe-swe session</title></head>
<body><h1>Session {uuid}</h1>
<p>Assistant: {assistant}</p>
<p>Connect a terminal client to <code>/ws/{uuid}?assistant={assistant}</code>.</p>
</body></html>"#
    ))
    .into_response()
}

/// `GET /ssl/ca.crt` — serve the CA certificate configured via
/// `TLS_CERT_PATH`.
pub async fn ssl_ca() -> Response {
    let Ok(path) = std::env::var("TLS_CERT_PATH") else {
        return ErrorCode::NotFound.to_http_response("no certificate configured").into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            ([(header::CONTENT_TYPE, "application/x-x509-ca-cert")], bytes).into_response()
        }
        Err(e) => {
            tracing::warn!(path = %path, err = %e, "failed to read CA certificate");
            ErrorCode::NotFound.to_http_response("certificate not found").into_response()
        }
    }
}

// -- Worktree / repo API ------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeEntry {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_session: Option<SessionInfo>,
}

/// `GET /api/worktrees`
pub async fn api_worktrees(State(app): State<App>) -> Response {
    let repo = app.manager.config.working_directory.clone();
    match worktree::list_worktrees(&repo).await {
        Ok(list) => {
            let mut out = Vec::with_capacity(list.len());
            for wt in list {
                let active_session = app.manager.session_on_branch(&wt.name).await;
                out.push(WorktreeEntry { name: wt.name, path: wt.path, active_session });
            }
            Json(out).into_response()
        }
        Err(e) => ErrorCode::Upstream.to_http_response(e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct WorktreeCheckQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeCheck {
    pub branch: String,
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_session: Option<SessionInfo>,
}

/// `GET /api/worktree/check?name=`
pub async fn api_worktree_check(
    State(app): State<App>,
    Query(query): Query<WorktreeCheckQuery>,
) -> Response {
    if query.name.trim().is_empty() {
        return ErrorCode::BadRequest.to_http_response("name is required").into_response();
    }
    let branch = worktree::derive_branch_name(&query.name);
    if branch.is_empty() {
        return ErrorCode::BadRequest.to_http_response("name derives to empty branch").into_response();
    }
    let path = worktree::worktree_path(&app.manager.config.working_directory, &branch);
    let active_session = app.manager.session_on_branch(&branch).await;
    Json(WorktreeCheck {
        branch,
        path: path.to_string_lossy().into_owned(),
        exists: path.exists(),
        active_session,
    })
    .into_response()
}

/// `GET /api/repos`
pub async fn api_repos(State(app): State<App>) -> Json<Vec<worktree::RepoInfo>> {
    Json(worktree::list_repos(&app.manager.config.working_directory).await)
}

#[derive(Debug, Deserialize)]
pub struct PrepareRequest {
    pub mode: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// `POST /api/repo/prepare` — ready a repo for a session.
///
/// `workspace` soft-fails fetch errors into a warning; `clone` and
/// `create` fail hard.
pub async fn api_repo_prepare(
    State(app): State<App>,
    Json(req): Json<PrepareRequest>,
) -> Response {
    let root = app.manager.config.working_directory.clone();
    match req.mode.as_str() {
        "workspace" => {
            let repo = if req.path.is_empty() { root } else { PathBuf::from(&req.path) };
            let warning = match worktree::run_git(&repo, &["fetch", "--all", "--prune"]).await {
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(repo = %repo.display(), err = %e, "workspace fetch failed");
                    Some(format!("git fetch failed: {e}"))
                }
            };
            Json(PrepareResponse {
                ok: true,
                path: Some(repo.to_string_lossy().into_owned()),
                warning,
            })
            .into_response()
        }
        "clone" => {
            if !worktree::valid_project_name(&req.name) {
                return ErrorCode::BadRequest.to_http_response("invalid project name").into_response();
            }
            if req.url.trim().is_empty() {
                return ErrorCode::BadRequest.to_http_response("url is required").into_response();
            }
            let dest = root.join(&req.name);
            if dest.exists() {
                return ErrorCode::Conflict.to_http_response("project already exists").into_response();
            }
            let dest_str = dest.to_string_lossy().into_owned();
            match worktree::run_git(&root, &["clone", req.url.trim(), &dest_str]).await {
                Ok(_) => Json(PrepareResponse { ok: true, path: Some(dest_str), warning: None })
                    .into_response(),
                Err(e) => ErrorCode::Upstream.to_http_response(e.to_string()).into_response(),
            }
        }
        "create" => {
            if !worktree::valid_project_name(&req.name) {
                return ErrorCode::BadRequest.to_http_response("invalid project name").into_response();
            }
            let dest = root.join(&req.name);
            if dest.exists() {
                return ErrorCode::Conflict.to_http_response("project already exists").into_response();
            }
            if let Err(e) = tokio::fs::create_dir_all(&dest).await {
                return ErrorCode::Internal.to_http_response(e.to_string()).into_response();
            }
            match worktree::run_git(&dest, &["init", "-q"]).await {
                Ok(_) => Json(PrepareResponse {
                    ok: true,
                    path: Some(dest.to_string_lossy().into_owned()),
                    warning: None,
                })
                .into_response(),
                Err(e) => ErrorCode::Upstream.to_http_response(e.to_string()).into_response(),
            }
        }
        other => ErrorCode::BadRequest
            .to_http_response(format!("invalid mode: {other}"))
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct BranchesQuery {
    #[serde(default)]
    pub path: String,
}

/// `GET /api/repo/branches?path=`
pub async fn api_repo_branches(
    State(app): State<App>,
    Query(query): Query<BranchesQuery>,
) -> Response {
    let repo = if query.path.is_empty() {
        app.manager.config.working_directory.clone()
    } else {
        PathBuf::from(&query.path)
    };
    match worktree::list_branches(&repo).await {
        Ok(branches) => Json(branches).into_response(),
        Err(e) => ErrorCode::Upstream.to_http_response(e.to_string()).into_response(),
    }
}

// -- Recording API ------------------------------------------------------------

/// `GET /api/recording/list`
pub async fn api_recording_list(State(app): State<App>) -> Json<Vec<recording::RecordingMeta>> {
    Json(recording::list_recordings(&app.manager.config.recordings_dir()))
}

/// `DELETE /api/recording/{uuid}`
pub async fn api_recording_delete(State(app): State<App>, Path(uuid): Path<String>) -> Response {
    let dir = app.manager.config.recordings_dir();
    if recording::load_metadata(&dir, &uuid).is_none() {
        return ErrorCode::NotFound.to_http_response("unknown recording").into_response();
    }
    if app.manager.active_recordings().await.contains(&uuid) {
        return ErrorCode::Conflict.to_http_response("recording is active").into_response();
    }
    recording::delete_recording(&dir, &uuid);
    Json(serde_json::json!({ "ok": true })).into_response()
}

/// `POST /api/recording/{uuid}/keep`
pub async fn api_recording_keep(State(app): State<App>, Path(uuid): Path<String>) -> Response {
    match recording::mark_kept(&app.manager.config.recordings_dir(), &uuid) {
        Some(meta) => Json(meta).into_response(),
        None => ErrorCode::NotFound.to_http_response("unknown recording").into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// `PATCH /api/recording/{uuid}/rename`
pub async fn api_recording_rename(
    State(app): State<App>,
    Path(uuid): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Response {
    if !recording::valid_display_name(&req.name) {
        return ErrorCode::BadRequest.to_http_response("invalid name").into_response();
    }
    match recording::rename_metadata(&app.manager.config.recordings_dir(), &uuid, &req.name) {
        Some(meta) => Json(meta).into_response(),
        None => ErrorCode::NotFound.to_http_response("unknown recording").into_response(),
    }
}

/// `GET /api/recording/{uuid}/download`
pub async fn api_recording_download(State(app): State<App>, Path(uuid): Path<String>) -> Response {
    let dir = app.manager.config.recordings_dir();
    if recording::load_metadata(&dir, &uuid).is_none() {
        return ErrorCode::NotFound.to_http_response("unknown recording").into_response();
    }
    match recording::build_download_zip(&dir, &uuid) {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/zip".to_owned()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"session-{uuid}.zip\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaybackQuery {
    #[serde(default)]
    pub render: String,
}

/// `GET /recording/{uuid}` — playback page; `?render=embedded` inlines
/// the transcript, otherwise the page streams `session.log`.
pub async fn recording_page(
    State(app): State<App>,
    Path(uuid): Path<String>,
    Query(query): Query<PlaybackQuery>,
) -> Response {
    let dir = app.manager.config.recordings_dir();
    let Some(meta) = recording::load_metadata(&dir, &uuid) else {
        return ErrorCode::NotFound.to_http_response("unknown recording").into_response();
    };

    let cols = if meta.playback_cols > 0 { meta.playback_cols } else { 80 };
    let rows = if meta.playback_rows > 0 { meta.playback_rows } else { 24 };
    let title = if meta.name.is_empty() { meta.uuid.clone() } else { meta.name.clone() };

    let source = if query.render == "embedded" {
        let log = std::fs::read(recording::log_path(&dir, &uuid)).unwrap_or_default();
        let encoded = base64::engine::general_purpose::STANDARD.encode(log);
        format!("const data = atob(\"{encoded}\"); render(data);")
    } else {
        format!(
            "fetch(\"/recording/{uuid}/session.log\").then(r => r.text()).then(render);"
        )
    };

    Html(format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>{title}</title>
<style>pre {{ background: #1a1a1a; color: #e0e0e0; padding: 1em; overflow: auto;
  width: {cols}ch; min-height: {rows}em; }}</style></head>
<body><h1>{title}</h1>
<pre id="screen"></pre>
<script>
function render(text) {{
  // Strip escape sequences for the plain transcript view.
  const plain = text.replace(/\x1b(?:\[[0-9;?]*[@-~]|\][^\x07]*(?:\x07|\x1b\\)|[@-Z\\-_])/g, "");
  document.getElementById("screen").textContent = plain;
}}
{source}
</script>
</body></html>"#,
        title = html_escape(&title),
    ))
    .into_response()
}

/// `GET /recording/{uuid}/session.log`
pub async fn recording_log(State(app): State<App>, Path(uuid): Path<String>) -> Response {
    let dir = app.manager.config.recordings_dir();
    match tokio::fs::read(recording::log_path(&dir, &uuid)).await {
        Ok(bytes) => {
            ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], bytes).into_response()
        }
        Err(_) => ErrorCode::NotFound.to_http_response("unknown recording").into_response(),
    }
}

// -- Session API --------------------------------------------------------------

/// `POST /api/session/{uuid}/end` — SIGINT, then SIGKILL after 2 s.
pub async fn api_session_end(State(app): State<App>, Path(uuid): Path<String>) -> Response {
    let Some(session) = app.manager.get(&uuid).await else {
        return ErrorCode::NotFound.to_http_response("unknown session").into_response();
    };

    session.send_signal(Signal::SIGINT).await;
    let escalate = session.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        if let Some(pty) = escalate.current_pty().await {
            if pty.is_alive() {
                tracing::info!(session = %escalate.uuid, "escalating to SIGKILL");
                let _ = pty.signal(Signal::SIGKILL);
            }
        }
    });

    (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
