// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ref-counted registry of per-port proxy servers.
//!
//! Sessions `acquire` a server for their backend port and `release` it on
//! close. The first acquire starts the server on a pre-bound listener; the
//! last release shuts it down (5 s grace). Multiple sessions share one
//! server when a parent passes its ports to a shell child.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::DebugHub;

/// Which flavor of proxy a registry manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// Preview proxy: debug hub, script injection, shell page.
    Preview,
    /// Agent-chat proxy: plain forwarding only.
    AgentChat,
}

/// State shared between a proxy server's handlers and its owning sessions.
pub struct ProxyShared {
    /// Backend port the proxy forwards to by default.
    pub backend_port: u16,
    /// Outbound HTTP client (30 s timeout, no redirects, lax TLS).
    pub client: reqwest::Client,
    /// Debug hub; present on preview proxies only.
    pub hub: Option<Arc<DebugHub>>,
    target: RwLock<String>,
    theme: RwLock<String>,
}

impl ProxyShared {
    fn new(kind: ProxyKind, backend_port: u16, theme: &str) -> anyhow::Result<Arc<Self>> {
        Ok(Arc::new(Self {
            backend_port,
            client: crate::forward::build_client()?,
            hub: match kind {
                ProxyKind::Preview => Some(Arc::new(DebugHub::new())),
                ProxyKind::AgentChat => None,
            },
            target: RwLock::new(format!("http://localhost:{backend_port}")),
            theme: RwLock::new(theme.to_owned()),
        }))
    }

    /// Current forwarding target URL.
    pub async fn target(&self) -> String {
        self.target.read().await.clone()
    }

    /// Point the proxy at a different backend URL.
    pub async fn set_target(&self, url: String) {
        *self.target.write().await = url;
    }

    pub async fn theme(&self) -> String {
        self.theme.read().await.clone()
    }

    pub async fn set_theme(&self, theme: &str) {
        *self.theme.write().await = theme.to_owned();
    }
}

struct ServerEntry {
    refs: usize,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
    shared: Arc<ProxyShared>,
}

/// Registry of running proxy servers keyed by backend port.
pub struct ProxyServers {
    kind: ProxyKind,
    disabled: bool,
    inner: Mutex<HashMap<u16, ServerEntry>>,
}

impl ProxyServers {
    pub fn new(kind: ProxyKind, disabled: bool) -> Self {
        Self { kind, disabled, inner: Mutex::new(HashMap::new()) }
    }

    /// Acquire the server for `backend_port`, starting it on `listener` if
    /// absent. The listener is dropped when the server already exists or
    /// the registry is disabled.
    pub async fn acquire(
        &self,
        backend_port: u16,
        listener: Option<std::net::TcpListener>,
        theme: &str,
    ) -> anyhow::Result<Arc<ProxyShared>> {
        let mut inner = self.inner.lock().await;

        if let Some(entry) = inner.get_mut(&backend_port) {
            entry.refs += 1;
            return Ok(Arc::clone(&entry.shared));
        }

        let shared = ProxyShared::new(self.kind, backend_port, theme)?;
        let shutdown = CancellationToken::new();

        let handle = if self.disabled {
            drop(listener);
            None
        } else {
            let listener = listener.context("no listener supplied for new proxy server")?;
            listener.set_nonblocking(true)?;
            let listener = tokio::net::TcpListener::from_std(listener)?;
            let router = match self.kind {
                ProxyKind::Preview => crate::preview::router(Arc::clone(&shared)),
                ProxyKind::AgentChat => crate::agent_chat::router(Arc::clone(&shared)),
            };
            let token = shutdown.clone();
            let kind = self.kind;
            Some(tokio::spawn(async move {
                let serve = axum::serve(listener, router)
                    .with_graceful_shutdown(token.cancelled_owned());
                if let Err(e) = serve.await {
                    tracing::warn!(?kind, backend_port, err = %e, "proxy server error");
                }
            }))
        };

        inner.insert(backend_port, ServerEntry { refs: 1, shutdown, handle, shared: Arc::clone(&shared) });
        Ok(shared)
    }

    /// Release one reference; the server shuts down when none remain.
    pub async fn release(&self, backend_port: u16) {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.get_mut(&backend_port) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return;
        }
        if let Some(entry) = inner.remove(&backend_port) {
            entry.shutdown.cancel();
            if let Some(mut handle) = entry.handle {
                tokio::spawn(async move {
                    if tokio::time::timeout(Duration::from_secs(5), &mut handle).await.is_err() {
                        tracing::warn!(backend_port, "proxy server did not stop in time");
                        handle.abort();
                    }
                });
            }
        }
    }

    /// Number of live references for a port (0 when no server is running).
    pub async fn ref_count(&self, backend_port: u16) -> usize {
        self.inner.lock().await.get(&backend_port).map(|e| e.refs).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
