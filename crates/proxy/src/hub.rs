// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debug hub: brokers messages between in-page debug scripts, UI
//! observers, and the agent.
//!
//! Routing rules:
//! - in-page → agent + observers
//! - agent → in-page
//! - observer → in-page
//!
//! There is at most one agent; a new agent connection replaces (and
//! disconnects) the previous one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};

/// Identifies a connection within the hub.
pub type ClientId = u64;

/// Which role a hub connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubRole {
    /// In-page debug script (`/__swe-swe-debug__/ws`).
    Page,
    /// The agent (`/__swe-swe-debug__/agent`). Singular.
    Agent,
    /// UI observer (`/__swe-swe-debug__/ui`).
    Observer,
}

struct HubInner {
    pages: HashMap<ClientId, mpsc::UnboundedSender<String>>,
    observers: HashMap<ClientId, mpsc::UnboundedSender<String>>,
    agent: Option<(ClientId, mpsc::UnboundedSender<String>)>,
}

/// One hub per preview-proxy server, shared by all sessions on the port.
pub struct DebugHub {
    inner: RwLock<HubInner>,
    next_id: AtomicU64,
}

impl Default for DebugHub {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugHub {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HubInner {
                pages: HashMap::new(),
                observers: HashMap::new(),
                agent: None,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a connection with the given role.
    ///
    /// Returns the connection id and the receiver carrying messages routed
    /// to it. Registering an agent drops the previous agent's sender, which
    /// ends its forwarding loop and closes its socket.
    pub async fn join(&self, role: HubRole) -> (ClientId, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.write().await;
        match role {
            HubRole::Page => {
                inner.pages.insert(id, tx);
            }
            HubRole::Observer => {
                inner.observers.insert(id, tx);
            }
            HubRole::Agent => {
                if let Some((old_id, _)) = inner.agent.replace((id, tx)) {
                    tracing::debug!(old_id, new_id = id, "debug hub: agent replaced");
                }
            }
        }
        (id, rx)
    }

    /// Remove a connection. The agent slot is only cleared if it still
    /// belongs to `id` (a replacement may have taken it in the meantime).
    pub async fn leave(&self, role: HubRole, id: ClientId) {
        let mut inner = self.inner.write().await;
        match role {
            HubRole::Page => {
                inner.pages.remove(&id);
            }
            HubRole::Observer => {
                inner.observers.remove(&id);
            }
            HubRole::Agent => {
                if inner.agent.as_ref().is_some_and(|(cur, _)| *cur == id) {
                    inner.agent = None;
                }
            }
        }
    }

    /// Route a message from a connection to its counterparties.
    pub async fn route(&self, from: HubRole, text: &str) {
        let inner = self.inner.read().await;
        match from {
            HubRole::Page => {
                if let Some((_, ref tx)) = inner.agent {
                    let _ = tx.send(text.to_owned());
                }
                for tx in inner.observers.values() {
                    let _ = tx.send(text.to_owned());
                }
            }
            HubRole::Agent | HubRole::Observer => {
                for tx in inner.pages.values() {
                    let _ = tx.send(text.to_owned());
                }
            }
        }
    }

    /// Send an `{t:"open", url}` command to all UI observers.
    pub async fn open_url(&self, url: &str) {
        let msg = serde_json::json!({ "t": "open", "url": url }).to_string();
        let inner = self.inner.read().await;
        for tx in inner.observers.values() {
            let _ = tx.send(msg.clone());
        }
    }

    /// Number of connected in-page scripts.
    pub async fn page_count(&self) -> usize {
        self.inner.read().await.pages.len()
    }

    /// Whether an agent is currently connected.
    pub async fn has_agent(&self) -> bool {
        self.inner.read().await.agent.is_some()
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
