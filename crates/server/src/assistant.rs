// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assistant registry: the built-in table of supported coding agents,
//! their launch/restart/YOLO command variants, and the MOTD banner.

use std::collections::BTreeMap;
use std::path::Path;

/// How an assistant consumes project slash commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashFormat {
    /// Markdown files (Claude-style `.claude/commands/*.md`).
    Md,
    /// TOML command definitions (Gemini-style).
    Toml,
    /// Single command file (Codex-style).
    File,
    /// No slash-command support.
    None,
}

impl SlashFormat {
    pub fn supported(&self) -> bool {
        !matches!(self, SlashFormat::None)
    }
}

/// Immutable launch description for one assistant.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Registry key and display name.
    pub name: &'static str,
    /// Command used on first launch.
    pub shell_cmd: String,
    /// Command used when restarting in normal mode.
    pub shell_restart_cmd: String,
    /// Command used when restarting in YOLO mode; empty when the
    /// assistant has no auto-approve variant.
    pub yolo_restart_cmd: String,
    /// Binary probed on PATH to decide availability.
    pub binary: &'static str,
    /// Whether the assistant is offered on the homepage.
    pub homepage: bool,
    pub slash_format: SlashFormat,
}

impl AssistantConfig {
    pub fn yolo_supported(&self) -> bool {
        !self.yolo_restart_cmd.is_empty()
    }
}

/// Markers that indicate a command already runs in YOLO mode.
const YOLO_MARKERS: &[&str] = &[
    "--dangerously-skip-permissions",
    "--approval-mode=yolo",
    "--yolo",
    "--yes-always",
    "GOOSE_MODE=auto",
];

/// Whether a startup command line opts into auto-approve mode.
pub fn command_is_yolo(cmd: &str) -> bool {
    YOLO_MARKERS.iter().any(|marker| cmd.contains(marker))
}

/// The compile-time assistant table, keyed by assistant name.
///
/// `shell` is always present; `custom` is added when the server was
/// started with an explicit shell command.
pub fn registry(custom_shell: Option<(&str, &str)>) -> BTreeMap<&'static str, AssistantConfig> {
    let mut table = BTreeMap::new();

    table.insert(
        "claude",
        AssistantConfig {
            name: "claude",
            shell_cmd: "claude".into(),
            shell_restart_cmd: "claude --continue".into(),
            yolo_restart_cmd: "claude --dangerously-skip-permissions --continue".into(),
            binary: "claude",
            homepage: true,
            slash_format: SlashFormat::Md,
        },
    );
    table.insert(
        "gemini",
        AssistantConfig {
            name: "gemini",
            shell_cmd: "gemini".into(),
            shell_restart_cmd: "gemini".into(),
            yolo_restart_cmd: "gemini --approval-mode=yolo".into(),
            binary: "gemini",
            homepage: true,
            slash_format: SlashFormat::Toml,
        },
    );
    table.insert(
        "codex",
        AssistantConfig {
            name: "codex",
            shell_cmd: "codex".into(),
            shell_restart_cmd: "codex resume --last".into(),
            yolo_restart_cmd: "codex --yolo resume --last".into(),
            binary: "codex",
            homepage: true,
            slash_format: SlashFormat::File,
        },
    );
    table.insert(
        "aider",
        AssistantConfig {
            name: "aider",
            shell_cmd: "aider".into(),
            shell_restart_cmd: "aider".into(),
            yolo_restart_cmd: "aider --yes-always".into(),
            binary: "aider",
            homepage: true,
            slash_format: SlashFormat::None,
        },
    );
    table.insert(
        "goose",
        AssistantConfig {
            name: "goose",
            shell_cmd: "goose".into(),
            shell_restart_cmd: "goose".into(),
            yolo_restart_cmd: "GOOSE_MODE=auto goose".into(),
            binary: "goose",
            homepage: true,
            slash_format: SlashFormat::None,
        },
    );
    table.insert(
        "opencode",
        AssistantConfig {
            name: "opencode",
            shell_cmd: "opencode".into(),
            shell_restart_cmd: "opencode".into(),
            yolo_restart_cmd: String::new(),
            binary: "opencode",
            homepage: true,
            slash_format: SlashFormat::None,
        },
    );

    let login_shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".into());
    table.insert(
        "shell",
        AssistantConfig {
            name: "shell",
            shell_cmd: login_shell.clone(),
            shell_restart_cmd: login_shell,
            yolo_restart_cmd: String::new(),
            binary: "",
            homepage: true,
            slash_format: SlashFormat::None,
        },
    );

    if let Some((cmd, restart)) = custom_shell {
        table.insert(
            "custom",
            AssistantConfig {
                name: "custom",
                shell_cmd: cmd.to_owned(),
                shell_restart_cmd: if restart.is_empty() { cmd.to_owned() } else { restart.to_owned() },
                yolo_restart_cmd: String::new(),
                binary: "",
                homepage: true,
                slash_format: SlashFormat::None,
            },
        );
    }

    table
}

/// Whether an assistant's binary is reachable. The shell pseudo-assistant
/// (empty binary) is always available.
pub fn binary_available(binary: &str) -> bool {
    if binary.is_empty() {
        return true;
    }
    let Ok(path) = std::env::var("PATH") else {
        return false;
    };
    path.split(':').any(|dir| {
        if dir.is_empty() {
            return false;
        }
        Path::new(dir).join(binary).is_file()
    })
}

/// ANSI MOTD sent to the first viewer of a slash-capable assistant.
pub fn motd(assistant: &AssistantConfig, preview_port: u16, proxy_offset: u16) -> String {
    let proxy_port = proxy_offset.saturating_add(preview_port);
    format!(
        "\x1b[1;36mswe-swe\x1b[0m \x1b[90m·\x1b[0m {} session\r\n\
         \x1b[90mPreview:\x1b[0m serve on \x1b[1m$PORT\x1b[0m ({preview_port}) \
         \x1b[90m→\x1b[0m http://localhost:{proxy_port}/\r\n\
         \x1b[90mAgent chat:\x1b[0m $AGENT_CHAT_PORT ({})\r\n\
         \x1b[90mProject slash commands load from\x1b[0m swe-swe/ \x1b[90min your repo.\x1b[0m\r\n\r\n",
        assistant.name,
        preview_port.saturating_add(1000),
    )
}

#[cfg(test)]
#[path = "assistant_tests.rs"]
mod tests;
