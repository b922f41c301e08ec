// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serialized WebSocket writer ("Safe-WS").
//!
//! The PTY reader, status broadcasts, and per-connection handlers all
//! write to the same viewer socket; the write half lives behind a mutex
//! so frames never interleave and per-viewer delivery stays FIFO.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use serde::Serialize;
use tokio::sync::Mutex;

pub struct ViewerConn {
    sink: Mutex<Option<SplitSink<WebSocket, Message>>>,
}

impl ViewerConn {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink: Mutex::new(Some(sink)) }
    }

    /// A connection with no socket; sends are no-ops.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self { sink: Mutex::new(None) }
    }

    pub async fn send_binary(&self, data: Vec<u8>) -> Result<(), axum::Error> {
        match self.sink.lock().await.as_mut() {
            Some(sink) => sink.send(Message::Binary(data.into())).await,
            None => Ok(()),
        }
    }

    pub async fn send_json<T: Serialize>(&self, msg: &T) -> Result<(), axum::Error> {
        let text = serde_json::to_string(msg).map_err(axum::Error::new)?;
        match self.sink.lock().await.as_mut() {
            Some(sink) => sink.send(Message::Text(text.into())).await,
            None => Ok(()),
        }
    }

    pub async fn close(&self) {
        if let Some(sink) = self.sink.lock().await.as_mut() {
            let _ = sink.close().await;
        }
    }
}
