// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process environment construction.

use std::path::Path;

/// Variables the server owns; the parent's values never leak through.
const RESERVED: &[&str] = &["TERM", "PORT", "BROWSER", "PATH", "COLORFGBG", "AGENT_CHAT_PORT"];

/// Directory holding the in-container helper binaries (the `swe-swe-open`
/// browser shim among them).
const BIN_DIR: &str = "/home/app/.swe-swe/bin";

/// Build the complete child environment from the parent's variables.
///
/// Reserved variables are filtered out, then re-set: `TERM`, the session's
/// `PORT`/`AGENT_CHAT_PORT`, the browser shim, a prepended `PATH`, and a
/// theme-matching `COLORFGBG`. `extra` (the per-repo `swe-swe/env` file)
/// is appended last and may override anything.
pub fn build_child_env(
    parent: Vec<(String, String)>,
    preview_port: u16,
    agent_chat_port: u16,
    theme: &str,
    extra: &[(String, String)],
) -> Vec<(String, String)> {
    let parent_path =
        parent.iter().find(|(k, _)| k == "PATH").map(|(_, v)| v.clone()).unwrap_or_default();

    let mut env: Vec<(String, String)> =
        parent.into_iter().filter(|(k, _)| !RESERVED.contains(&k.as_str())).collect();

    env.push(("TERM".into(), "xterm-256color".into()));
    env.push(("PORT".into(), preview_port.to_string()));
    env.push(("AGENT_CHAT_PORT".into(), agent_chat_port.to_string()));
    env.push(("BROWSER".into(), format!("{BIN_DIR}/swe-swe-open")));
    let path = if parent_path.is_empty() {
        BIN_DIR.to_owned()
    } else {
        format!("{BIN_DIR}:{parent_path}")
    };
    env.push(("PATH".into(), path));
    // Foreground;background hint: dark text on light, light text on dark.
    let colorfgbg = if theme == "light" { "0;15" } else { "15;0" };
    env.push(("COLORFGBG".into(), colorfgbg.into()));

    for (k, v) in extra {
        env.retain(|(existing, _)| existing != k);
        env.push((k.clone(), v.clone()));
    }
    env
}

/// Parse `K=V` lines, skipping blanks and `#` comments.
pub fn parse_env_lines(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (k, v) = line.split_once('=')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_owned(), v.trim().to_owned()))
        })
        .collect()
}

/// Read `{workdir}/swe-swe/env` if present.
pub async fn load_env_file(workdir: &Path) -> Vec<(String, String)> {
    match tokio::fs::read_to_string(workdir.join("swe-swe").join("env")).await {
        Ok(contents) => parse_env_lines(&contents),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
