// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! swe-swe: a multi-user web terminal server hosting long-lived PTY
//! sessions for AI coding agents, with per-session reverse proxies,
//! session recording, and git worktree management.

pub mod assistant;
pub mod chunk;
pub mod config;
pub mod error;
pub mod mcp;
pub mod pty;
pub mod recording;
pub mod ring;
pub mod screen;
pub mod session;
pub mod transport;
pub mod worktree;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::session::SessionManager;

/// Run the primary server until the process is stopped.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let manager = Arc::new(SessionManager::new(Arc::clone(&config)));
    session::spawn_reaper(Arc::clone(&manager));

    let addr = config.listen_addr();
    let router = transport::build_router(manager);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("swe-swe listening on {addr}");
    axum::serve(listener, router).await?;
    Ok(())
}
