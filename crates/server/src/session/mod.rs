// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle: the session object, the manager registry, port-pair
//! allocation, and the reaper.

pub mod env;
pub mod reader;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use nix::sys::signal::Signal;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use swe_swe_proxy::{ProxyKind, ProxyServers};

use crate::assistant::{self, AssistantConfig};
use crate::config::Config;
use crate::pty::PtyProcess;
use crate::recording::{self, RecordingHandle};
use crate::ring::{RingBuffer, RING_CAPACITY};
use crate::screen::Screen;
use crate::transport::conn::ViewerConn;
use crate::transport::ws_msg::{ServerMessage, WorktreeExit};
use crate::worktree;

/// Default PTY size used until a viewer reports its dimensions.
pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_COLS: u16 = 80;

/// VT screen and scrollback ring; always mutated together.
pub struct TermState {
    pub screen: Screen,
    pub ring: RingBuffer,
}

struct ViewerEntry {
    conn: Arc<ViewerConn>,
    /// (rows, cols); `None` until the first resize frame arrives.
    dims: Option<(u16, u16)>,
}

/// Mutable session state guarded by the session lock.
pub struct SessionState {
    pub name: String,
    pub last_active: DateTime<Utc>,
    pub yolo_mode: bool,
    /// Command to exec when the current child exits; empty means none.
    pub pending_replacement: String,
    pub pty_rows: u16,
    pub pty_cols: u16,
    viewers: HashMap<u64, ViewerEntry>,
}

/// Grace-period input queue: typed input is buffered for a short window
/// after the MOTD so it does not pre-empt the banner.
struct InputBuffer {
    queue: Vec<Vec<u8>>,
    deadline: Option<tokio::time::Instant>,
}

/// Immutable spawn description, reused verbatim on process replacement.
pub struct SpawnSpec {
    pub env: Vec<(String, String)>,
    pub workdir: PathBuf,
    pub rec_dir: PathBuf,
    pub rec_uuid: String,
}

pub struct Session {
    pub uuid: String,
    pub assistant: AssistantConfig,
    pub created_at: DateTime<Utc>,
    pub parent_uuid: Option<String>,
    pub preview_port: u16,
    pub agent_chat_port: u16,
    pub proxy_offset: u16,
    pub theme: String,
    pub work_dir: PathBuf,
    pub branch_name: String,
    pub worktree: Option<WorktreeExit>,
    pub recording: RecordingHandle,
    spawn_spec: SpawnSpec,
    state: Mutex<SessionState>,
    term: Mutex<TermState>,
    input_buf: Mutex<InputBuffer>,
    pty: RwLock<Option<Arc<PtyProcess>>>,
    exited: AtomicBool,
    closed: AtomicBool,
    viewer_seq: AtomicU64,
    /// Set once the reader task has been spawned.
    reader_started: AtomicBool,
}

impl Session {
    /// Whether the child process is still running.
    pub fn is_alive(&self) -> bool {
        !self.exited.load(Ordering::Acquire)
    }

    pub fn mark_exited(&self) {
        self.exited.store(true, Ordering::Release);
    }

    pub fn uuid_short(&self) -> String {
        self.uuid.chars().take(8).collect()
    }

    pub async fn current_pty(&self) -> Option<Arc<PtyProcess>> {
        self.pty.read().await.clone()
    }

    pub async fn child_pid(&self) -> Option<i32> {
        self.pty.read().await.as_ref().map(|p| p.pid())
    }

    /// Spawn (or respawn) the wrapped child process on a fresh PTY.
    pub async fn spawn_process(&self, shell_cmd: &str, append: bool) -> anyhow::Result<()> {
        let argv = recording::wrap_command(
            shell_cmd,
            &self.spawn_spec.rec_dir,
            &self.spawn_spec.rec_uuid,
            append,
        );
        let (rows, cols) = {
            let state = self.state.lock().await;
            (state.pty_rows, state.pty_cols)
        };
        let proc = PtyProcess::spawn(
            &argv,
            &self.spawn_spec.env,
            &self.spawn_spec.workdir,
            cols,
            rows,
        )?;
        *self.pty.write().await = Some(Arc::new(proc));
        Ok(())
    }

    /// Add a viewer connection; returns its id. Status is broadcast after
    /// the session lock is released.
    pub async fn add_viewer(&self, conn: Arc<ViewerConn>) -> u64 {
        let id = self.viewer_seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.state.lock().await;
            state.viewers.insert(id, ViewerEntry { conn, dims: None });
            state.last_active = Utc::now();
        }
        self.recording.visitor_joined().await;
        self.broadcast_status().await;
        id
    }

    /// Remove a viewer and recompute the PTY size.
    pub async fn remove_viewer(&self, id: u64) {
        let resize = {
            let mut state = self.state.lock().await;
            state.viewers.remove(&id);
            recompute_size(&mut state)
        };
        if let Some((rows, cols)) = resize {
            self.apply_size(rows, cols).await;
        }
        self.broadcast_status().await;
    }

    /// Record a viewer's terminal dimensions and resize to the minimum
    /// across viewers.
    pub async fn set_viewer_dims(&self, id: u64, rows: u16, cols: u16) {
        let resize = {
            let mut state = self.state.lock().await;
            if let Some(entry) = state.viewers.get_mut(&id) {
                entry.dims = Some((rows.max(1), cols.max(1)));
            }
            recompute_size(&mut state)
        };
        if let Some((rows, cols)) = resize {
            self.apply_size(rows, cols).await;
            self.broadcast_status().await;
        }
    }

    async fn apply_size(&self, rows: u16, cols: u16) {
        if let Some(pty) = self.current_pty().await {
            if let Err(e) = pty.resize(cols, rows) {
                tracing::warn!(session = %self.uuid, err = %e, "PTY resize failed");
            }
        }
        self.term.lock().await.screen.resize(cols, rows);
        self.recording.update_max_dims(cols, rows).await;
    }

    /// Current PTY size as (rows, cols).
    pub async fn pty_size(&self) -> (u16, u16) {
        let state = self.state.lock().await;
        (state.pty_rows, state.pty_cols)
    }

    /// Arm the post-MOTD input grace window.
    pub async fn set_input_grace(&self, window: Duration) {
        let mut buf = self.input_buf.lock().await;
        buf.deadline = Some(tokio::time::Instant::now() + window);
    }

    /// Write terminal input, buffering during the grace period. The queue
    /// is flushed lazily on the first write after the deadline.
    pub async fn write_input(&self, data: &[u8]) {
        let queued = {
            let mut buf = self.input_buf.lock().await;
            match buf.deadline {
                Some(deadline) if tokio::time::Instant::now() < deadline => {
                    buf.queue.push(data.to_vec());
                    return;
                }
                Some(_) => {
                    buf.deadline = None;
                    std::mem::take(&mut buf.queue)
                }
                None => Vec::new(),
            }
        };
        let Some(pty) = self.current_pty().await else {
            return;
        };
        for chunk in queued {
            if let Err(e) = crate::pty::nbio::write_all(&pty.master, &chunk).await {
                tracing::warn!(session = %self.uuid, err = %e, "PTY write failed");
                return;
            }
        }
        if let Err(e) = crate::pty::nbio::write_all(&pty.master, data).await {
            tracing::warn!(session = %self.uuid, err = %e, "PTY write failed");
        }
    }

    /// Feed bytes into the screen and ring, then broadcast them — used
    /// for the MOTD, feedback lines, and the exit banner.
    pub async fn feed_and_broadcast(&self, data: &[u8]) {
        {
            let mut term = self.term.lock().await;
            term.screen.feed(data);
            term.ring.write(data);
        }
        self.broadcast_binary(data).await;
    }

    /// Lock the term state (screen + ring move together).
    pub async fn term(&self) -> tokio::sync::MutexGuard<'_, TermState> {
        self.term.lock().await
    }

    pub async fn viewer_conns(&self) -> Vec<Arc<ViewerConn>> {
        let state = self.state.lock().await;
        state.viewers.values().map(|v| Arc::clone(&v.conn)).collect()
    }

    pub async fn viewer_count(&self) -> usize {
        self.state.lock().await.viewers.len()
    }

    /// Send a binary frame to every viewer. A failed viewer is logged and
    /// skipped; its own read loop will remove it.
    pub async fn broadcast_binary(&self, data: &[u8]) {
        for conn in self.viewer_conns().await {
            if let Err(e) = conn.send_binary(data.to_vec()).await {
                tracing::debug!(session = %self.uuid, err = %e, "viewer write failed");
            }
        }
    }

    pub async fn broadcast_json(&self, msg: &ServerMessage) {
        for conn in self.viewer_conns().await {
            if let Err(e) = conn.send_json(msg).await {
                tracing::debug!(session = %self.uuid, err = %e, "viewer write failed");
            }
        }
    }

    /// Build the status frame from current state.
    pub async fn status_message(&self) -> ServerMessage {
        let state = self.state.lock().await;
        ServerMessage::Status {
            viewers: state.viewers.len(),
            cols: state.pty_cols,
            rows: state.pty_rows,
            assistant: self.assistant.name.to_owned(),
            session_name: state.name.clone(),
            uuid_short: self.uuid_short(),
            work_dir: self.work_dir.to_string_lossy().into_owned(),
            preview_port: self.preview_port,
            agent_chat_port: self.agent_chat_port,
            yolo_mode: state.yolo_mode,
            yolo_supported: self.assistant.yolo_supported(),
        }
    }

    pub async fn broadcast_status(&self) {
        let msg = self.status_message().await;
        self.broadcast_json(&msg).await;
    }

    pub async fn name(&self) -> String {
        self.state.lock().await.name.clone()
    }

    pub async fn set_name(&self, name: &str) {
        self.state.lock().await.name = name.to_owned();
        self.recording.set_name(name).await;
        self.broadcast_status().await;
    }

    pub async fn yolo_mode(&self) -> bool {
        self.state.lock().await.yolo_mode
    }

    /// Flip YOLO mode and stage the matching restart command. Returns the
    /// new mode, or `None` when the assistant has no YOLO variant.
    pub async fn toggle_yolo(&self) -> Option<bool> {
        if !self.assistant.yolo_supported() {
            return None;
        }
        let new_mode = {
            let mut state = self.state.lock().await;
            state.yolo_mode = !state.yolo_mode;
            state.pending_replacement = if state.yolo_mode {
                self.assistant.yolo_restart_cmd.clone()
            } else {
                self.assistant.shell_restart_cmd.clone()
            };
            state.yolo_mode
        };
        Some(new_mode)
    }

    /// Take the staged replacement command, if any.
    pub async fn take_pending_replacement(&self) -> Option<String> {
        let mut state = self.state.lock().await;
        if state.pending_replacement.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut state.pending_replacement))
        }
    }

    pub async fn send_signal(&self, sig: Signal) {
        if let Some(pty) = self.current_pty().await {
            if let Err(e) = pty.signal(sig) {
                tracing::debug!(session = %self.uuid, err = %e, "signal delivery failed");
            }
        }
    }

    /// Tear the session down: finalize the recording, close viewers, kill
    /// and reap the child. Idempotent; proxy refs are released by the
    /// manager.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.mark_exited();
        self.recording.finalize().await;

        let conns = {
            let mut state = self.state.lock().await;
            let conns: Vec<_> = state.viewers.values().map(|v| Arc::clone(&v.conn)).collect();
            state.viewers.clear();
            conns
        };
        for conn in conns {
            conn.close().await;
        }

        if let Some(pty) = self.pty.write().await.take() {
            if pty.is_alive() {
                let _ = pty.signal(Signal::SIGKILL);
            }
            let _ = pty.wait().await;
        }
    }

    /// Spawn the PTY reader exactly once.
    pub fn start_reader(self: &Arc<Self>) {
        if !self.reader_started.swap(true, Ordering::AcqRel) {
            reader::spawn(Arc::clone(self));
        }
    }
}

/// PTY size is the minimum across sized viewers (floor 1×1); 24×80 when
/// nobody has reported dimensions. Returns the new size if it changed.
fn recompute_size(state: &mut SessionState) -> Option<(u16, u16)> {
    let sized: Vec<(u16, u16)> = state.viewers.values().filter_map(|v| v.dims).collect();
    let (rows, cols) = if sized.is_empty() {
        (DEFAULT_ROWS, DEFAULT_COLS)
    } else {
        let rows = sized.iter().map(|(r, _)| *r).min().unwrap_or(DEFAULT_ROWS).max(1);
        let cols = sized.iter().map(|(_, c)| *c).min().unwrap_or(DEFAULT_COLS).max(1);
        (rows, cols)
    };
    if (rows, cols) == (state.pty_rows, state.pty_cols) {
        return None;
    }
    state.pty_rows = rows;
    state.pty_cols = cols;
    Some((rows, cols))
}

/// Parameters for [`SessionManager::get_or_create`].
#[derive(Debug, Clone, Default)]
pub struct CreateParams {
    pub uuid: String,
    pub assistant: String,
    pub name: String,
    pub branch: String,
    pub pwd: String,
    pub parent: String,
    pub theme: String,
}

/// Summary of a session for the homepage and worktree hints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub uuid: String,
    pub name: String,
    pub assistant: String,
    pub branch: String,
    pub work_dir: String,
    pub created_at: DateTime<Utc>,
}

pub struct SessionManager {
    pub config: Arc<Config>,
    pub assistants: BTreeMap<&'static str, AssistantConfig>,
    pub preview_servers: ProxyServers,
    pub agent_chat_servers: ProxyServers,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    /// Serializes session creation so concurrent connects to a new uuid
    /// cannot spawn two children.
    create_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(config: Arc<Config>) -> Self {
        let assistants = assistant::registry(config.custom_shell());
        let disabled = config.no_preview_proxy;
        Self {
            config,
            assistants,
            preview_servers: ProxyServers::new(ProxyKind::Preview, disabled),
            agent_chat_servers: ProxyServers::new(ProxyKind::AgentChat, false),
            sessions: RwLock::new(HashMap::new()),
            create_lock: Mutex::new(()),
        }
    }

    pub async fn get(&self, uuid: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(uuid).cloned()
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::with_capacity(sessions.len());
        for s in sessions.values() {
            out.push(SessionInfo {
                uuid: s.uuid.clone(),
                name: s.name().await,
                assistant: s.assistant.name.to_owned(),
                branch: s.branch_name.clone(),
                work_dir: s.work_dir.to_string_lossy().into_owned(),
                created_at: s.created_at,
            });
        }
        out
    }

    /// Find a live session checked out on `branch` (worktree hint).
    pub async fn session_on_branch(&self, branch: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        for s in sessions.values() {
            if s.is_alive() && s.branch_name == branch {
                return Some(SessionInfo {
                    uuid: s.uuid.clone(),
                    name: s.name().await,
                    assistant: s.assistant.name.to_owned(),
                    branch: s.branch_name.clone(),
                    work_dir: s.work_dir.to_string_lossy().into_owned(),
                    created_at: s.created_at,
                });
            }
        }
        None
    }

    /// Recording UUIDs of live sessions (exempt from retention).
    pub async fn active_recordings(&self) -> HashSet<String> {
        let sessions = self.sessions.read().await;
        let mut active = HashSet::new();
        for s in sessions.values() {
            if s.is_alive() {
                active.insert(s.recording.uuid().await);
            }
        }
        active
    }

    /// Return the existing live session for `uuid` or create a fresh one.
    /// A dead session under the same uuid is torn down first.
    pub async fn get_or_create(
        self: &Arc<Self>,
        params: CreateParams,
    ) -> anyhow::Result<(bool, Arc<Session>)> {
        if let Some(existing) = self.get(&params.uuid).await {
            if existing.is_alive() {
                return Ok((false, existing));
            }
        }

        let _guard = self.create_lock.lock().await;

        // Re-check under the creation lock: another connect may have won.
        if let Some(existing) = self.get(&params.uuid).await {
            if existing.is_alive() {
                return Ok((false, existing));
            }
            self.close_and_remove(&params.uuid).await;
        }

        let parent = if params.parent.is_empty() {
            None
        } else {
            self.get(&params.parent).await
        };

        let session = self.create_session(&params, parent).await?;
        self.sessions.write().await.insert(params.uuid.clone(), Arc::clone(&session));
        Ok((true, session))
    }

    async fn create_session(
        &self,
        params: &CreateParams,
        parent: Option<Arc<Session>>,
    ) -> anyhow::Result<Arc<Session>> {
        let assistant = self
            .assistants
            .get(params.assistant.as_str())
            .filter(|a| assistant::binary_available(a.binary))
            .cloned()
            .with_context(|| format!("assistant not available: {}", params.assistant))?;

        let theme = if params.theme == "light" { "light" } else { "dark" };

        // Working directory: explicit pwd wins; otherwise a branch means
        // a worktree of the base repo; otherwise the base repo itself.
        let base_repo = self.config.working_directory.clone();
        let mut branch_name = String::new();
        let mut worktree_info: Option<WorktreeExit> = None;
        let work_dir = if !params.pwd.is_empty() {
            PathBuf::from(&params.pwd)
        } else if !params.branch.is_empty() {
            branch_name = worktree::derive_branch_name(&params.branch);
            match worktree::create_or_enter(&base_repo, &branch_name).await {
                Ok(path) => {
                    let target_branch = worktree::run_git(
                        &base_repo,
                        &["rev-parse", "--abbrev-ref", "HEAD"],
                    )
                    .await
                    .map(|s| s.trim().to_owned())
                    .unwrap_or_else(|_| "main".to_owned());
                    worktree_info = Some(WorktreeExit {
                        path: path.to_string_lossy().into_owned(),
                        branch: branch_name.clone(),
                        target_branch,
                    });
                    path
                }
                Err(e) => {
                    tracing::warn!(
                        session = %params.uuid, branch = %branch_name, err = %e,
                        "worktree creation failed, using base repo"
                    );
                    base_repo.clone()
                }
            }
        } else {
            base_repo.clone()
        };

        // Port pair: inherit from a resolvable parent, else allocate.
        let (preview_port, agent_chat_port, preview_listener, agent_chat_listener) =
            match parent {
                Some(ref p) => (p.preview_port, p.agent_chat_port, None, None),
                None => {
                    let (preview, agent, pl, al) = self.allocate_port_pair()?;
                    (preview, agent, Some(pl), Some(al))
                }
            };

        // Session display name.
        let name = if !params.name.is_empty() {
            params.name.clone()
        } else if let Some(ref p) = parent {
            if assistant.name == "shell" {
                let parent_name = p.name().await;
                if parent_name.is_empty() {
                    String::new()
                } else {
                    format!("{parent_name} (Terminal)")
                }
            } else {
                derive_session_name(&work_dir, &branch_name).await
            }
        } else {
            derive_session_name(&work_dir, &branch_name).await
        };

        // Child environment.
        let extra = env::load_env_file(&work_dir).await;
        let child_env = env::build_child_env(
            std::env::vars().collect(),
            preview_port,
            agent_chat_port,
            theme,
            &extra,
        );

        // Recording wrap.
        let rec_uuid = Uuid::new_v4().to_string();
        let rec_dir = self.config.recordings_dir();
        tokio::fs::create_dir_all(&rec_dir)
            .await
            .context("failed to create recordings dir")?;
        let argv = recording::wrap_command(&assistant.shell_cmd, &rec_dir, &rec_uuid, false);

        let recording = RecordingHandle::new(
            rec_dir.clone(),
            rec_uuid.clone(),
            assistant.name,
            argv.clone(),
            &work_dir,
        );

        let yolo_mode = assistant::command_is_yolo(&assistant.shell_cmd);

        let session = Arc::new(Session {
            uuid: params.uuid.clone(),
            assistant,
            created_at: Utc::now(),
            parent_uuid: if params.parent.is_empty() { None } else { Some(params.parent.clone()) },
            preview_port,
            agent_chat_port,
            proxy_offset: self.config.proxy_port_offset,
            theme: theme.to_owned(),
            work_dir: work_dir.clone(),
            branch_name,
            worktree: worktree_info,
            recording,
            spawn_spec: SpawnSpec { env: child_env, workdir: work_dir, rec_dir, rec_uuid },
            state: Mutex::new(SessionState {
                name,
                last_active: Utc::now(),
                yolo_mode,
                pending_replacement: String::new(),
                pty_rows: DEFAULT_ROWS,
                pty_cols: DEFAULT_COLS,
                viewers: HashMap::new(),
            }),
            term: Mutex::new(TermState {
                screen: Screen::new(DEFAULT_COLS, DEFAULT_ROWS),
                ring: RingBuffer::new(RING_CAPACITY),
            }),
            input_buf: Mutex::new(InputBuffer { queue: Vec::new(), deadline: None }),
            pty: RwLock::new(None),
            exited: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            viewer_seq: AtomicU64::new(1),
            reader_started: AtomicBool::new(false),
        });

        let shell_cmd = session.assistant.shell_cmd.clone();
        session.spawn_process(&shell_cmd, false).await?;

        self.preview_servers
            .acquire(preview_port, preview_listener, theme)
            .await
            .context("failed to acquire preview proxy")?;
        self.agent_chat_servers
            .acquire(agent_chat_port, agent_chat_listener, theme)
            .await
            .context("failed to acquire agent-chat proxy")?;

        let display_name = session.name().await;
        session.recording.set_name(&display_name).await;

        tracing::info!(
            session = %session.uuid,
            assistant = %session.assistant.name,
            work_dir = %session.work_dir.display(),
            preview_port,
            agent_chat_port,
            "session created"
        );
        Ok(session)
    }

    /// Find a free preview/agent-chat port pair, pre-binding the two proxy
    /// listeners and bind-testing (then releasing) the two app ports.
    fn allocate_port_pair(
        &self,
    ) -> anyhow::Result<(u16, u16, std::net::TcpListener, std::net::TcpListener)> {
        let offset = self.config.proxy_port_offset;
        let agent_offset = self.config.agent_chat_offset();
        for preview in self.config.preview_ports() {
            let agent = preview.saturating_add(agent_offset);
            let Ok(preview_proxy) =
                std::net::TcpListener::bind(("0.0.0.0", offset.saturating_add(preview)))
            else {
                continue;
            };
            let Ok(agent_proxy) =
                std::net::TcpListener::bind(("0.0.0.0", offset.saturating_add(agent)))
            else {
                continue;
            };
            // App ports only need to be free for the child; release the
            // test binds immediately.
            let Ok(app) = std::net::TcpListener::bind(("127.0.0.1", preview)) else {
                continue;
            };
            let Ok(chat_app) = std::net::TcpListener::bind(("127.0.0.1", agent)) else {
                continue;
            };
            drop(app);
            drop(chat_app);
            return Ok((preview, agent, preview_proxy, agent_proxy));
        }
        bail!("no free preview port in range");
    }

    /// Rename a session and propagate to its shell children.
    pub async fn rename_session(&self, session: &Arc<Session>, name: &str) {
        session.set_name(name).await;

        let children: Vec<Arc<Session>> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|s| s.parent_uuid.as_deref() == Some(session.uuid.as_str()))
                .cloned()
                .collect()
        };
        for child in children {
            let child_name =
                if name.is_empty() { String::new() } else { format!("{name} (Terminal)") };
            child.set_name(&child_name).await;
        }
    }

    /// Close a session and release its proxy servers.
    pub async fn teardown(&self, session: &Arc<Session>) {
        session.close().await;
        self.preview_servers.release(session.preview_port).await;
        self.agent_chat_servers.release(session.agent_chat_port).await;
    }

    /// Remove a session from the registry and tear it down.
    pub async fn close_and_remove(&self, uuid: &str) {
        let session = self.sessions.write().await.remove(uuid);
        if let Some(session) = session {
            self.teardown(&session).await;
            tracing::info!(session = %uuid, "session closed");
        }
    }
}

/// Reaper: every minute, sweep dead sessions and run recording retention.
pub fn spawn_reaper(manager: Arc<SessionManager>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            let dead: Vec<String> = {
                let sessions = manager.sessions.read().await;
                sessions
                    .iter()
                    .filter(|(_, s)| !s.is_alive())
                    .map(|(uuid, _)| uuid.clone())
                    .collect()
            };
            for uuid in dead {
                manager.close_and_remove(&uuid).await;
            }

            let active = manager.active_recordings().await;
            let dir = manager.config.recordings_dir();
            recording::run_retention(&dir, &active);
        }
    });
}

/// Derive `{owner}/{repo}@{branch}` (or `{dir}@{branch}`) from a working
/// directory.
pub async fn derive_session_name(work_dir: &Path, branch: &str) -> String {
    let repo_part = match worktree::run_git(work_dir, &["config", "--get", "remote.origin.url"])
        .await
    {
        Ok(url) => owner_repo_from_url(url.trim())
            .unwrap_or_else(|| dir_name(work_dir)),
        Err(_) => dir_name(work_dir),
    };

    let branch = if branch.is_empty() {
        worktree::run_git(work_dir, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .map(|s| s.trim().to_owned())
            .unwrap_or_default()
    } else {
        branch.to_owned()
    };

    if branch.is_empty() || branch == "HEAD" {
        repo_part
    } else {
        format!("{repo_part}@{branch}")
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "work".into())
}

/// Extract `owner/repo` from common git remote URL shapes.
pub fn owner_repo_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
    // ssh: git@host:owner/repo
    if let Some((_, rest)) = trimmed.split_once(':') {
        if !rest.contains("//") {
            let parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();
            if parts.len() >= 2 {
                return Some(format!("{}/{}", parts[parts.len() - 2], parts[parts.len() - 1]));
            }
        }
    }
    // https://host/owner/repo
    let rest = trimmed.split_once("//").map(|(_, r)| r).unwrap_or(trimmed);
    let parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() >= 3 {
        return Some(format!("{}/{}", parts[parts.len() - 2], parts[parts.len() - 1]));
    }
    None
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
