// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn derives_simple_names() {
    assert_eq!(derive_branch_name("Fix Login Bug"), "fix-login-bug");
    assert_eq!(derive_branch_name("feature/new API"), "feature/new-api");
    assert_eq!(derive_branch_name("already-clean"), "already-clean");
}

#[test]
fn strips_accents_via_nfd() {
    assert_eq!(derive_branch_name("Café Über"), "cafe-uber");
}

#[test]
fn collapses_runs_and_junk() {
    assert_eq!(derive_branch_name("a---b"), "a-b");
    assert_eq!(derive_branch_name("a//b"), "a/b");
    assert_eq!(derive_branch_name("a/-b"), "a/b");
    assert_eq!(derive_branch_name("a-/b"), "a/b");
    assert_eq!(derive_branch_name("a/./b"), "a/b");
}

#[test]
fn strips_leading_dots_per_component() {
    assert_eq!(derive_branch_name(".hidden/.branch"), "hidden/branch");
}

#[test]
fn trims_lock_suffix_and_edges() {
    assert_eq!(derive_branch_name("topic.lock"), "topic");
    assert_eq!(derive_branch_name("-topic-"), "topic");
    assert_eq!(derive_branch_name("/topic/"), "topic");
}

#[test]
fn derivation_is_idempotent() {
    for input in [
        "Fix Login Bug",
        "feature/new API",
        "Café Über",
        ".hidden/.branch",
        "a/-b--c/./d.lock",
        "weird!!chars@@here",
        "",
    ] {
        let once = derive_branch_name(input);
        assert_eq!(derive_branch_name(&once), once, "not idempotent for {input:?}");
    }
}

proptest::proptest! {
    #[test]
    fn derivation_idempotent_for_any_input(input in ".{0,60}") {
        let once = derive_branch_name(&input);
        proptest::prop_assert_eq!(derive_branch_name(&once), once);
    }
}

#[test]
fn worktree_dir_replaces_slashes() {
    assert_eq!(worktree_dir_name("feature/api/v2"), "feature--api--v2");
}

#[test]
fn worktree_path_special_cases_workspace() {
    assert_eq!(
        worktree_path(Path::new("/workspace"), "fix/bug"),
        PathBuf::from("/worktrees/fix--bug")
    );
    assert_eq!(
        worktree_path(Path::new("/srv/repos/app"), "fix"),
        PathBuf::from("/srv/repos/worktrees/fix")
    );
}

#[test]
fn project_name_validation() {
    assert!(valid_project_name("my-app"));
    assert!(valid_project_name("app_2.0"));
    assert!(!valid_project_name(""));
    assert!(!valid_project_name("."));
    assert!(!valid_project_name(".."));
    assert!(!valid_project_name("has space"));
    assert!(!valid_project_name("has/slash"));
    assert!(!valid_project_name(&"x".repeat(65)));
}

#[tokio::test]
async fn worktree_roundtrip_in_real_repo() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("app");
    std::fs::create_dir_all(&repo).unwrap();

    run_git(&repo, &["init", "-q", "-b", "main"]).await.unwrap();
    run_git(&repo, &["config", "user.email", "t@example.com"]).await.unwrap();
    run_git(&repo, &["config", "user.name", "t"]).await.unwrap();
    std::fs::write(repo.join("README.md"), "hi\n").unwrap();
    // Host-only files: linked into worktrees. Tracked files are not.
    std::fs::write(repo.join(".env"), "SECRET=1\n").unwrap();
    std::fs::write(repo.join("CLAUDE.md"), "notes\n").unwrap();
    run_git(&repo, &["add", "README.md"]).await.unwrap();
    run_git(&repo, &["commit", "-q", "-m", "init"]).await.unwrap();

    let path = create_or_enter(&repo, "fix/bug").await.unwrap();
    assert!(path.exists());
    assert_eq!(path, dir.path().join("worktrees/fix--bug"));

    // Untracked host files are symlinked, tracked files checked out.
    assert!(path.join(".env").is_symlink());
    assert!(path.join("CLAUDE.md").is_symlink());
    assert!(path.join("README.md").exists());
    assert!(!path.join("README.md").is_symlink());

    // Re-entry returns the same path without error.
    let again = create_or_enter(&repo, "fix/bug").await.unwrap();
    assert_eq!(again, path);

    // The branch exists in the repo and the worktree list sees it.
    let worktrees = list_worktrees(&repo).await.unwrap();
    assert!(worktrees.iter().any(|w| w.name == "fix/bug"));

    let branches = list_branches(&repo).await.unwrap();
    assert!(branches.contains(&"main".to_owned()));
    assert!(branches.contains(&"fix/bug".to_owned()));
}
