// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON control-plane messages exchanged over the session WebSocket.
//!
//! Both directions use internally-tagged enums (`{"type": "chat", ...}`)
//! with camelCase payload fields.

use serde::{Deserialize, Serialize};

/// Binary frame prefixes from the client.
pub const FRAME_RESIZE: u8 = 0x00;
pub const FRAME_UPLOAD: u8 = 0x01;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Ping {
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    Chat {
        user_name: String,
        text: String,
    },
    RenameSession {
        name: String,
    },
    ToggleYolo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Chat {
        user_name: String,
        text: String,
        timestamp: String,
    },
    Status {
        viewers: usize,
        cols: u16,
        rows: u16,
        assistant: String,
        session_name: String,
        uuid_short: String,
        work_dir: String,
        preview_port: u16,
        agent_chat_port: u16,
        yolo_mode: bool,
        yolo_supported: bool,
    },
    Exit {
        exit_code: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        worktree: Option<WorktreeExit>,
    },
    FileUpload {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Worktree details attached to the exit frame so the UI can offer a
/// merge-back flow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeExit {
    pub path: String,
    pub branch: String,
    pub target_branch: String,
}

/// Parse a resize frame `[0x00, rows_hi, rows_lo, cols_hi, cols_lo]`.
pub fn parse_resize(frame: &[u8]) -> Option<(u16, u16)> {
    if frame.len() < 5 || frame[0] != FRAME_RESIZE {
        return None;
    }
    let rows = u16::from_be_bytes([frame[1], frame[2]]);
    let cols = u16::from_be_bytes([frame[3], frame[4]]);
    Some((rows, cols))
}

/// Parse an upload frame `[0x01, len_hi, len_lo, name…, bytes…]`.
pub fn parse_upload(frame: &[u8]) -> Option<(String, &[u8])> {
    if frame.len() < 3 || frame[0] != FRAME_UPLOAD {
        return None;
    }
    let name_len = u16::from_be_bytes([frame[1], frame[2]]) as usize;
    if frame.len() < 3 + name_len {
        return None;
    }
    let name = String::from_utf8(frame[3..3 + name_len].to_vec()).ok()?;
    Some((name, &frame[3 + name_len..]))
}

/// Reduce an uploaded filename to a safe basename.
///
/// Rejects empty names, `.`, `..`, anything with a path separator left
/// after basename extraction, and names that try to climb out with a
/// leading `..`.
pub fn sanitize_upload_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    if base.is_empty() || base == "." || base == ".." || base.starts_with("..") {
        return None;
    }
    if base.contains('\0') {
        return None;
    }
    Some(base.to_owned())
}

#[cfg(test)]
#[path = "ws_msg_tests.rs"]
mod tests;
