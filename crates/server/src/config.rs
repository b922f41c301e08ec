// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::ops::RangeInclusive;
use std::path::PathBuf;

use clap::Parser;

/// Web terminal server for AI coding agents.
#[derive(Debug, Clone, Parser)]
#[command(name = "swe-swe", version, about)]
pub struct Config {
    /// Listen address for the primary HTTP server (":9898" binds all
    /// interfaces).
    #[arg(long, env = "SWE_ADDR", default_value = ":9898")]
    pub addr: String,

    /// Shell command for the `custom` assistant entry.
    #[arg(long, env = "SWE_SHELL")]
    pub shell: Option<String>,

    /// Restart command for the `custom` assistant (defaults to --shell).
    #[arg(long, env = "SWE_SHELL_RESTART")]
    pub shell_restart: Option<String>,

    /// Base workspace directory for repos, worktrees, and recordings.
    #[arg(long, env = "SWE_WORKING_DIRECTORY", default_value = "/workspace")]
    pub working_directory: PathBuf,

    /// Run the MCP stdio tool server instead of the HTTP server.
    #[arg(long)]
    pub mcp: bool,

    /// One-shot: stream debug-hub messages for N seconds, print, exit.
    #[arg(long, value_name = "SECONDS")]
    pub debug_listen: Option<u64>,

    /// One-shot: query the preview DOM with a CSS selector, print, exit.
    #[arg(long, value_name = "SELECTOR")]
    pub debug_query: Option<String>,

    /// Debug hub endpoint override (ws://…/__swe-swe-debug__/agent).
    #[arg(long, env = "SWE_DEBUG_ENDPOINT")]
    pub debug_endpoint: Option<String>,

    /// Disable the preview reverse proxy entirely.
    #[arg(long)]
    pub no_preview_proxy: bool,

    /// Offset added to app ports to place proxy listeners.
    #[arg(long, env = "SWE_PROXY_PORT_OFFSET", default_value = "20000")]
    pub proxy_port_offset: u16,
}

/// Default preview app port range.
const DEFAULT_PREVIEW_PORTS: RangeInclusive<u16> = 3000..=3019;

impl Config {
    /// Socket address string for the primary listener; a bare ":port"
    /// binds every interface.
    pub fn listen_addr(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }

    /// Preview port range, overridable via `SWE_PREVIEW_PORTS=start-end`.
    pub fn preview_ports(&self) -> RangeInclusive<u16> {
        parse_port_range(std::env::var("SWE_PREVIEW_PORTS").ok().as_deref())
            .unwrap_or(DEFAULT_PREVIEW_PORTS)
    }

    /// Agent-chat ports are preview + 1000; `SWE_AGENT_CHAT_PORTS` only
    /// shifts the offset by redefining the range start.
    pub fn agent_chat_offset(&self) -> u16 {
        match parse_port_range(std::env::var("SWE_AGENT_CHAT_PORTS").ok().as_deref()) {
            Some(range) => range.start().saturating_sub(*self.preview_ports().start()),
            None => 1000,
        }
    }

    pub fn custom_shell(&self) -> Option<(&str, &str)> {
        self.shell
            .as_deref()
            .map(|cmd| (cmd, self.shell_restart.as_deref().unwrap_or("")))
    }

    /// Directory holding recording logs and metadata.
    pub fn recordings_dir(&self) -> PathBuf {
        self.working_directory.join(".swe-swe").join("recordings")
    }
}

/// Parse `"start-end"` into an inclusive range.
pub fn parse_port_range(value: Option<&str>) -> Option<RangeInclusive<u16>> {
    let value = value?.trim();
    let (start, end) = value.split_once('-')?;
    let start: u16 = start.trim().parse().ok()?;
    let end: u16 = end.trim().parse().ok()?;
    if start > end {
        return None;
    }
    Some(start..=end)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
