// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP and WebSocket transport for the primary server.

pub mod conn;
pub mod http;
pub mod ws;
pub mod ws_msg;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::session::SessionManager;

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct App {
    pub manager: Arc<SessionManager>,
}

/// Build the primary axum router.
pub fn build_router(manager: Arc<SessionManager>) -> Router {
    let app = App { manager };
    Router::new()
        .route("/", get(http::home))
        .route("/session/{uuid}", get(http::session_page))
        .route("/ws/{uuid}", get(ws::ws_handler))
        .route("/ssl/ca.crt", get(http::ssl_ca))
        .route("/api/worktrees", get(http::api_worktrees))
        .route("/api/worktree/check", get(http::api_worktree_check))
        .route("/api/repos", get(http::api_repos))
        .route("/api/repo/prepare", post(http::api_repo_prepare))
        .route("/api/repo/branches", get(http::api_repo_branches))
        .route("/api/recording/list", get(http::api_recording_list))
        .route("/api/recording/{uuid}", delete(http::api_recording_delete))
        .route("/api/recording/{uuid}/keep", post(http::api_recording_keep))
        .route("/api/recording/{uuid}/rename", patch(http::api_recording_rename))
        .route("/api/recording/{uuid}/download", get(http::api_recording_download))
        .route("/api/session/{uuid}/end", post(http::api_session_end))
        .route("/recording/{uuid}", get(http::recording_page))
        .route("/recording/{uuid}/session.log", get(http::recording_log))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
