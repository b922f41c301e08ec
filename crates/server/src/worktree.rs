// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree management: branch-name derivation, worktree creation and
//! re-entry, dotfile symlinks, and the repo helpers behind the git API.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// A checked-out worktree of the base repository.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Worktree {
    /// Branch name (doubles as the display name).
    pub name: String,
    pub path: String,
}

/// Derive a git-safe branch name from free-form user input.
///
/// Idempotent: feeding the output back in returns it unchanged.
pub fn derive_branch_name(input: &str) -> String {
    // NFD-normalize, drop combining marks, lowercase, map spaces.
    let mut s: String = input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    // Collapse runs, then remove separator-adjacent junk until stable.
    loop {
        let before = s.clone();
        s = collapse_runs(&s, '-');
        s = collapse_runs(&s, '/');
        s = collapse_runs(&s, '.');
        for pattern in ["/-", "-/", "/.", "./"] {
            s = s.replace(pattern, "/");
        }
        if s == before {
            break;
        }
    }

    // Strip a leading '.' from each path component.
    s = s
        .split('/')
        .map(|part| part.strip_prefix('.').unwrap_or(part))
        .collect::<Vec<_>>()
        .join("/");

    // Git refuses refs ending in ".lock".
    while let Some(stripped) = s.strip_suffix(".lock") {
        s = stripped.to_owned();
    }

    s.trim_matches(|c| matches!(c, '-' | '/' | '.')).to_owned()
}

/// Worktree directory name for a branch: `/` becomes `--`.
pub fn worktree_dir_name(branch: &str) -> String {
    branch.replace('/', "--")
}

/// Where a worktree for `(repo, branch)` lives.
pub fn worktree_path(repo: &Path, branch: &str) -> PathBuf {
    let dir = worktree_dir_name(branch);
    if repo == Path::new("/workspace") {
        PathBuf::from("/worktrees").join(dir)
    } else {
        repo.parent().unwrap_or(repo).join("worktrees").join(dir)
    }
}

/// Run git with the given args in `repo`, returning stdout.
pub async fn run_git(repo: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = tokio::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .output()
        .await
        .context("failed to run git")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn ref_exists(repo: &Path, reference: &str) -> bool {
    run_git(repo, &["rev-parse", "--verify", "--quiet", reference]).await.is_ok()
}

/// Create the worktree for `branch` under the conventional path, or
/// re-enter it when it already exists.
///
/// Branch origin preference: local branch, then `origin/<branch>`, then a
/// new branch.
pub async fn create_or_enter(repo: &Path, branch: &str) -> anyhow::Result<PathBuf> {
    let target = worktree_path(repo, branch);
    if target.exists() {
        return Ok(target);
    }

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.context("failed to create worktrees dir")?;
    }

    let target_str = target.to_string_lossy().into_owned();
    if ref_exists(repo, &format!("refs/heads/{branch}")).await {
        run_git(repo, &["worktree", "add", &target_str, branch]).await?;
    } else if ref_exists(repo, &format!("refs/remotes/origin/{branch}")).await {
        let origin_ref = format!("origin/{branch}");
        run_git(repo, &["worktree", "add", "--track", "-b", branch, &target_str, &origin_ref])
            .await?;
    } else {
        run_git(repo, &["worktree", "add", "-b", branch, &target_str]).await?;
    }

    symlink_host_files(repo, &target).await;
    Ok(target)
}

/// Named host-only files that get linked into each worktree alongside
/// untracked dotfiles.
const HOST_FILES: &[&str] = &["CLAUDE.md", "AGENTS.md", "swe-swe"];

/// Symlink untracked dotfiles and host files from the base repo into the
/// worktree. Best-effort: failures are logged and skipped.
pub async fn symlink_host_files(repo: &Path, worktree: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(repo).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name == ".git" {
            continue;
        }
        let eligible = name.starts_with('.') || HOST_FILES.contains(&name);
        if !eligible {
            continue;
        }
        // Skip anything git tracks; those arrive via the checkout itself.
        if run_git(repo, &["ls-files", "--error-unmatch", "--", name]).await.is_ok() {
            continue;
        }
        let source = repo.join(name);
        let dest = worktree.join(name);
        if dest.exists() {
            continue;
        }
        if let Err(e) = tokio::fs::symlink(&source, &dest).await {
            tracing::warn!(src = %source.display(), err = %e, "worktree: symlink failed");
        }
    }
}

/// List the repo's worktrees via `git worktree list --porcelain`.
pub async fn list_worktrees(repo: &Path) -> anyhow::Result<Vec<Worktree>> {
    let out = run_git(repo, &["worktree", "list", "--porcelain"]).await?;
    let mut result = Vec::new();
    let mut path: Option<String> = None;
    for line in out.lines() {
        if let Some(p) = line.strip_prefix("worktree ") {
            path = Some(p.to_owned());
        } else if let Some(branch) = line.strip_prefix("branch refs/heads/") {
            if let Some(p) = path.take() {
                result.push(Worktree { name: branch.to_owned(), path: p });
            }
        } else if line.is_empty() {
            path = None;
        }
    }
    Ok(result)
}

/// A git repository visible to the session creator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    pub name: String,
    pub path: String,
}

/// Repos under the workspace root: the root itself when it is a repo,
/// plus every immediate child directory containing `.git`.
pub async fn list_repos(workspace: &Path) -> Vec<RepoInfo> {
    let mut repos = Vec::new();
    if workspace.join(".git").exists() {
        repos.push(RepoInfo {
            name: workspace
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "workspace".to_owned()),
            path: workspace.to_string_lossy().into_owned(),
        });
    }
    let Ok(mut entries) = tokio::fs::read_dir(workspace).await else {
        return repos;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.join(".git").exists() {
            repos.push(RepoInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: path.to_string_lossy().into_owned(),
            });
        }
    }
    repos.sort_by(|a, b| a.name.cmp(&b.name));
    repos
}

/// Local branches followed by `origin/` remote branches, short names.
pub async fn list_branches(repo: &Path) -> anyhow::Result<Vec<String>> {
    let out = run_git(
        repo,
        &["for-each-ref", "--format=%(refname:short)", "refs/heads", "refs/remotes/origin"],
    )
    .await?;
    let mut branches: Vec<String> = Vec::new();
    for line in out.lines() {
        let name = line.trim();
        if name.is_empty() || name == "origin" || name.ends_with("/HEAD") {
            continue;
        }
        let short = name.strip_prefix("origin/").unwrap_or(name);
        if !branches.iter().any(|b| b == short) {
            branches.push(short.to_owned());
        }
    }
    Ok(branches)
}

/// Project-name rule for clone/create targets.
pub fn valid_project_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        && name != "."
        && name != ".."
}

fn collapse_runs(s: &str, ch: char) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was = false;
    for c in s.chars() {
        if c == ch {
            if !last_was {
                out.push(c);
            }
            last_was = true;
        } else {
            out.push(c);
            last_was = false;
        }
    }
    out
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
