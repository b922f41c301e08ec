// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::pty::nbio::read_chunk;

fn base_env() -> Vec<(String, String)> {
    vec![
        ("PATH".to_owned(), std::env::var("PATH").unwrap_or_default()),
        ("TERM".to_owned(), "xterm-256color".to_owned()),
    ]
}

async fn read_to_string_until(proc: &PtyProcess, needle: &str) -> String {
    let mut out = String::new();
    let mut buf = [0u8; 4096];
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        let read = tokio::time::timeout_at(deadline.into(), read_chunk(&proc.master, &mut buf)).await;
        match read {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => {
                out.push_str(&String::from_utf8_lossy(&buf[..n]));
                if out.contains(needle) {
                    break;
                }
            }
            Ok(Err(_)) => break,
        }
    }
    out
}

#[tokio::test]
async fn spawn_echoes_output() {
    let proc = PtyProcess::spawn(
        &["sh".into(), "-c".into(), "echo pty-marker-$((40+2))".into()],
        &base_env(),
        std::path::Path::new("/tmp"),
        80,
        24,
    )
    .unwrap();

    let out = read_to_string_until(&proc, "pty-marker-42").await;
    assert!(out.contains("pty-marker-42"), "pty output: {out:?}");

    let status = proc.wait().await.unwrap();
    assert_eq!(status.exit_code(), 0);
}

#[tokio::test]
async fn env_fully_replaces_parent() {
    let mut env = base_env();
    env.push(("SWE_TEST_VALUE".to_owned(), "injected".to_owned()));
    let proc = PtyProcess::spawn(
        &["sh".into(), "-c".into(), "echo v=$SWE_TEST_VALUE h=${HOME:-unset}".into()],
        &env,
        std::path::Path::new("/tmp"),
        80,
        24,
    )
    .unwrap();

    let out = read_to_string_until(&proc, "v=").await;
    assert!(out.contains("v=injected"), "pty output: {out:?}");
    assert!(out.contains("h=unset"), "HOME leaked into the child: {out:?}");
    let _ = proc.wait().await;
}

#[tokio::test]
async fn workdir_applies_to_child() {
    let dir = tempfile::tempdir().unwrap();
    let proc = PtyProcess::spawn(
        &["sh".into(), "-c".into(), "pwd".into()],
        &base_env(),
        dir.path(),
        80,
        24,
    )
    .unwrap();

    let expected = dir.path().to_string_lossy().into_owned();
    let out = read_to_string_until(&proc, &expected).await;
    assert!(out.contains(&expected), "pty output: {out:?}");
    let _ = proc.wait().await;
}

#[tokio::test]
async fn exit_code_propagates() {
    let proc = PtyProcess::spawn(
        &["sh".into(), "-c".into(), "exit 7".into()],
        &base_env(),
        std::path::Path::new("/tmp"),
        80,
        24,
    )
    .unwrap();

    let status = proc.wait().await.unwrap();
    assert_eq!(status.exit_code(), 7);
}

#[test]
fn signal_exit_maps_to_128_plus() {
    let status = ExitStatus { code: None, signal: Some(15) };
    assert_eq!(status.exit_code(), 143);
}

#[test]
fn empty_command_rejected() {
    let err = PtyProcess::spawn(&[], &[], std::path::Path::new("/tmp"), 80, 24);
    assert!(err.is_err());
}
