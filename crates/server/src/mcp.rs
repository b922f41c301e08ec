// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP stdio tool server: line-delimited JSON-RPC 2.0 exposing two
//! preview-debugging tools backed by the debug hub's agent endpoint.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// Protocol revision this server speaks.
const PROTOCOL_VERSION: &str = "2025-11-25";

/// How long a DOM query waits for the first reply.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest allowed listen window.
const MAX_LISTEN_SECS: u64 = 30;

/// Resolve the debug hub agent endpoint.
///
/// Priority: explicit override, then `SWE_PREVIEW_PORT`/`PORT` plus the
/// proxy offset, then the base of the default port range.
pub fn default_endpoint(override_url: Option<&str>, proxy_offset: u16) -> String {
    if let Some(url) = override_url {
        return url.to_owned();
    }
    let port = std::env::var("SWE_PREVIEW_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(3000);
    format!("ws://localhost:{}/__swe-swe-debug__/agent", proxy_offset.saturating_add(port))
}

/// Connect to the hub, send one DOM query, and wait for the first reply.
pub async fn debug_query(endpoint: &str, selector: &str) -> anyhow::Result<String> {
    let (mut stream, _) = tokio_tungstenite::connect_async(endpoint).await?;
    let query = json!({ "t": "query", "id": uuid::Uuid::new_v4().to_string(), "selector": selector });
    stream.send(Message::Text(query.to_string().into())).await?;

    let reply = tokio::time::timeout(QUERY_TIMEOUT, async {
        while let Some(msg) = stream.next().await {
            if let Ok(Message::Text(text)) = msg {
                return Some(text.to_string());
            }
        }
        None
    })
    .await;

    match reply {
        Ok(Some(text)) => Ok(text),
        Ok(None) => anyhow::bail!("debug hub closed without replying"),
        Err(_) => anyhow::bail!("no reply from page within {QUERY_TIMEOUT:?}"),
    }
}

/// Collect every message from the hub for `duration`.
pub async fn debug_listen(endpoint: &str, duration: Duration) -> anyhow::Result<Vec<String>> {
    let (mut stream, _) = tokio_tungstenite::connect_async(endpoint).await?;
    let mut messages = Vec::new();
    let deadline = tokio::time::Instant::now() + duration;

    loop {
        let msg = tokio::time::timeout_at(deadline, stream.next()).await;
        match msg {
            Ok(Some(Ok(Message::Text(text)))) => messages.push(text.to_string()),
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_))) | Ok(None) => break,
            Err(_) => break, // deadline reached
        }
    }
    Ok(messages)
}

/// Run the stdio JSON-RPC loop until stdin closes.
pub async fn run_stdio(endpoint: String) -> anyhow::Result<()> {
    // Blocking stdin reader feeding an async channel, so the tool calls
    // can run on the runtime while reads block.
    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) if !l.trim().is_empty() => {
                    if line_tx.send(l).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    let mut stdout = io::stdout();
    while let Some(line) = line_rx.recv().await {
        if let Some(response) = handle_line(&endpoint, &line).await {
            writeln!(stdout, "{response}")?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Dispatch a single JSON-RPC line. Notifications return `None`.
pub async fn handle_line(endpoint: &str, line: &str) -> Option<Value> {
    let parsed: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => {
            return Some(json!({
                "jsonrpc": "2.0",
                "id": Value::Null,
                "error": { "code": -32700, "message": "parse error" }
            }));
        }
    };

    let method = parsed.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let id = parsed.get("id").cloned();
    let params = parsed.get("params").cloned().unwrap_or(json!({}));

    let result = match method {
        "initialize" => json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "swe-swe-preview",
                "version": env!("CARGO_PKG_VERSION")
            }
        }),
        "ping" => json!({}),
        "notifications/initialized" => return None,
        "tools/list" => tools_list(),
        "tools/call" => match tools_call(endpoint, &params).await {
            Ok(result) => result,
            Err(code_and_msg) => {
                return Some(error_response(id, code_and_msg.0, &code_and_msg.1));
            }
        },
        other => {
            // Notifications without an id get silently dropped.
            let id = id?;
            return Some(error_response(
                Some(id),
                -32601,
                &format!("method not found: {other}"),
            ));
        }
    };

    Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn error_response(id: Option<Value>, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": { "code": code, "message": message }
    })
}

fn tools_list() -> Value {
    json!({
        "tools": [
            {
                "name": "browser_debug_preview",
                "description": "Query the live preview DOM with a CSS selector and return the first matching element's text, HTML, visibility, and bounding rect.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string", "description": "CSS selector" }
                    },
                    "required": ["selector"]
                }
            },
            {
                "name": "browser_debug_preview_listen",
                "description": "Stream console, network, and navigation events from the live preview for a few seconds.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "duration_seconds": {
                            "type": "number",
                            "description": "How long to listen (max 30, default 5)"
                        }
                    }
                }
            }
        ]
    })
}

async fn tools_call(endpoint: &str, params: &Value) -> Result<Value, (i64, String)> {
    let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
    let args = params.get("arguments").cloned().unwrap_or(json!({}));

    match name {
        "browser_debug_preview" => {
            let selector = args
                .get("selector")
                .and_then(|s| s.as_str())
                .ok_or((-32602i64, "missing required param: selector".to_owned()))?;
            match debug_query(endpoint, selector).await {
                Ok(reply) => Ok(tool_text(&reply, false)),
                Err(e) => Ok(tool_text(&format!("debug query failed: {e}"), true)),
            }
        }
        "browser_debug_preview_listen" => {
            let secs = args
                .get("duration_seconds")
                .and_then(|d| d.as_u64())
                .unwrap_or(5)
                .min(MAX_LISTEN_SECS);
            match debug_listen(endpoint, Duration::from_secs(secs)).await {
                Ok(messages) => Ok(tool_text(&messages.join("\n"), false)),
                Err(e) => Ok(tool_text(&format!("debug listen failed: {e}"), true)),
            }
        }
        other => Err((-32602, format!("unknown tool: {other}"))),
    }
}

fn tool_text(text: &str, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error
    })
}

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod tests;
