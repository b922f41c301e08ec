// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `swe-swe` binary and
//! exercise HTTP and the session WebSocket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use swe_swe_specs::ServerProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn homepage_and_recording_list() -> anyhow::Result<()> {
    let server = ServerProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let home = reqwest::get(server.base_url()).await?.text().await?;
    assert!(home.contains("swe-swe"));

    let recordings: serde_json::Value =
        reqwest::get(format!("{}/api/recording/list", server.base_url())).await?.json().await?;
    assert_eq!(recordings, serde_json::json!([]));

    Ok(())
}

#[tokio::test]
async fn worktree_check_derives_branch() -> anyhow::Result<()> {
    let server = ServerProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let v: serde_json::Value = reqwest::get(format!(
        "{}/api/worktree/check?name=Fix%20Login%20Bug",
        server.base_url()
    ))
    .await?
    .json()
    .await?;
    assert_eq!(v["branch"], swe_swe::worktree::derive_branch_name("Fix Login Bug"));
    assert_eq!(v["branch"], "fix-login-bug");
    assert_eq!(v["exists"], false);

    Ok(())
}

#[tokio::test]
async fn unknown_session_end_is_404() -> anyhow::Result<()> {
    let server = ServerProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp =
        client.post(format!("{}/api/session/zzzz/end", server.base_url())).send().await?;
    assert_eq!(resp.status().as_u16(), 404);

    Ok(())
}

#[tokio::test]
async fn ws_session_status_and_ping() -> anyhow::Result<()> {
    let server = ServerProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let url = server.ws_url("e2e00001-0000-0000-0000-000000000001", "shell");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await?;

    // A status frame arrives on join.
    let status = next_json(&mut ws, "status").await?;
    assert_eq!(status["assistant"], "shell");
    assert_eq!(status["viewers"], 1);
    assert_eq!(status["rows"], 24);
    assert_eq!(status["cols"], 80);

    // Resize to 40×100; the next status reports the new minimum.
    ws.send(Message::Binary(vec![0x00, 0x00, 0x28, 0x00, 0x64].into())).await?;
    let status = next_json(&mut ws, "status").await?;
    assert_eq!(status["rows"], 40);
    assert_eq!(status["cols"], 100);

    // Ping echoes its payload.
    ws.send(Message::Text(r#"{"type":"ping","data":{"n":7}}"#.into())).await?;
    let pong = next_json(&mut ws, "pong").await?;
    assert_eq!(pong["data"]["n"], 7);

    // Chat broadcasts with a timestamp.
    ws.send(Message::Text(r#"{"type":"chat","userName":"ada","text":"hi"}"#.into())).await?;
    let chat = next_json(&mut ws, "chat").await?;
    assert_eq!(chat["userName"], "ada");
    assert!(chat["timestamp"].is_string());

    Ok(())
}

/// Read frames until a JSON text frame with the wanted `type` arrives.
async fn next_json(
    ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
    wanted: &str,
) -> anyhow::Result<serde_json::Value> {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let msg = tokio::time::timeout_at(deadline, ws.next())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for {wanted}"))?;
        match msg {
            Some(Ok(Message::Text(text))) => {
                let v: serde_json::Value = serde_json::from_str(&text)?;
                if v["type"] == wanted {
                    return Ok(v);
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => anyhow::bail!("websocket error: {e}"),
            None => anyhow::bail!("websocket closed before {wanted}"),
        }
    }
}
