// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `swe-swe` binary as a subprocess with an isolated
//! workspace and exercises it over HTTP and WebSocket.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `swe-swe` binary.
pub fn server_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("swe-swe")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `swe-swe` process that is killed on drop.
pub struct ServerProcess {
    child: Child,
    port: u16,
    /// Isolated workspace; removed with the struct.
    pub workspace: tempfile::TempDir,
}

impl ServerProcess {
    /// Spawn the server on a free port with a fresh workspace.
    pub fn start() -> anyhow::Result<Self> {
        let binary = server_binary();
        anyhow::ensure!(binary.exists(), "swe-swe binary not found at {}", binary.display());

        let workspace = tempfile::tempdir()?;
        let port = free_port()?;

        let child = Command::new(&binary)
            .args([
                "--addr",
                &format!("127.0.0.1:{port}"),
                "--working-directory",
                &workspace.path().to_string_lossy(),
                "--no-preview-proxy",
            ])
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port, workspace })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn ws_url(&self, uuid: &str, assistant: &str) -> String {
        format!("ws://127.0.0.1:{}/ws/{uuid}?assistant={assistant}", self.port)
    }

    /// Poll the recording list endpoint until the server responds.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/api/recording/list", self.base_url());
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("swe-swe did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
