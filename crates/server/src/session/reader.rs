// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session PTY reader: feeds the screen and ring, fans raw output out
//! to viewers, answers cursor-position queries inline, and handles exit
//! versus process replacement.

use std::sync::Arc;

use nix::sys::signal::Signal;

use super::Session;
use crate::pty::nbio::{read_chunk, write_all};
use crate::transport::ws_msg::ServerMessage;

/// Device Status Report: `ESC [ 6 n` asks for the cursor position.
const DSR_QUERY: &[u8] = b"\x1b[6n";

/// Spawn the reader task for a session.
pub fn spawn(session: Arc<Session>) {
    tokio::spawn(run(session));
}

async fn run(session: Arc<Session>) {
    let mut buf = vec![0u8; 4096];

    loop {
        let Some(pty) = session.current_pty().await else {
            break;
        };

        match read_chunk(&pty.master, &mut buf).await {
            Ok(0) => {
                if !handle_eof(&session).await {
                    break;
                }
            }
            Ok(n) => {
                let chunk = &buf[..n];

                // Some agents (Codex's crossterm) give the terminal only a
                // few milliseconds to answer a DSR; browsers cannot make
                // that round trip, so answer from here.
                if chunk.windows(DSR_QUERY.len()).any(|w| w == DSR_QUERY) {
                    let (rows, _cols) = session.pty_size().await;
                    let reply = format!("\x1b[{rows};1R");
                    if let Err(e) = write_all(&pty.master, reply.as_bytes()).await {
                        tracing::debug!(session = %session.uuid, err = %e, "DSR reply failed");
                    }
                }

                {
                    let mut term = session.term().await;
                    term.screen.feed(chunk);
                    term.ring.write(chunk);
                }
                session.broadcast_binary(chunk).await;
            }
            Err(e) if e.raw_os_error() == Some(nix::libc::EIO) => {
                if !handle_eof(&session).await {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(session = %session.uuid, err = %e, "PTY read error");
                if !handle_eof(&session).await {
                    break;
                }
            }
        }
    }
}

/// Reap the child and either respawn a staged replacement (returning
/// `true` to continue reading) or finalize the session.
async fn handle_eof(session: &Arc<Session>) -> bool {
    let Some(pty) = session.current_pty().await else {
        return false;
    };

    // The PTY can break while the process lives on; make sure it is gone
    // before reaping.
    if pty.is_alive() {
        let _ = pty.signal(Signal::SIGKILL);
    }
    let status = match pty.wait().await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(session = %session.uuid, err = %e, "child reap failed");
            crate::pty::ExitStatus { code: Some(1), signal: None }
        }
    };

    if let Some(replacement) = session.take_pending_replacement().await {
        tracing::info!(session = %session.uuid, cmd = %replacement, "replacing session process");
        match session.spawn_process(&replacement, true).await {
            Ok(()) => return true,
            Err(e) => {
                tracing::error!(session = %session.uuid, err = %e, "process replacement failed");
                // Fall through to normal exit handling.
            }
        }
    }

    let exit_code = status.exit_code();
    session.mark_exited();
    session.recording.finalize().await;

    if session.viewer_count().await == 0 {
        tracing::info!(session = %session.uuid, exit_code, "session process exited (no viewers)");
        return false;
    }

    let banner = format!("\r\n\x1b[0m[Process exited (code {exit_code})]\r\n");
    session.feed_and_broadcast(banner.as_bytes()).await;
    session
        .broadcast_json(&ServerMessage::Exit { exit_code, worktree: session.worktree.clone() })
        .await;

    tracing::info!(session = %session.uuid, exit_code, "session process exited");
    false
}
