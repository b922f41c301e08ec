// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session recording: typescript capture via `script(1)`, metadata JSON,
//! playback dimension calculation, and Recent/Kept retention.

use std::collections::HashMap;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Completed, non-kept recordings retained per agent.
pub const KEEP_RECENT: usize = 5;

/// Completed, non-kept recordings older than this are reaped regardless
/// of count.
pub const MAX_AGE: Duration = Duration::from_secs(48 * 60 * 60);

/// Metadata persisted next to the typescript logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMeta {
    /// Recording UUID — distinct from the session UUID and stable across
    /// process replacement.
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    pub agent: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kept_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub visitors: Vec<String>,
    #[serde(default)]
    pub max_cols: u16,
    #[serde(default)]
    pub max_rows: u16,
    #[serde(default)]
    pub playback_cols: u16,
    #[serde(default)]
    pub playback_rows: u16,
    #[serde(default)]
    pub work_dir: String,
}

/// File name stem for a recording UUID.
fn stem(uuid: &str) -> String {
    format!("session-{uuid}")
}

pub fn log_path(dir: &Path, uuid: &str) -> PathBuf {
    dir.join(format!("{}.log", stem(uuid)))
}

pub fn timing_path(dir: &Path, uuid: &str) -> PathBuf {
    dir.join(format!("{}.timing", stem(uuid)))
}

pub fn input_path(dir: &Path, uuid: &str) -> PathBuf {
    dir.join(format!("{}.input", stem(uuid)))
}

pub fn metadata_path(dir: &Path, uuid: &str) -> PathBuf {
    dir.join(format!("{}.metadata.json", stem(uuid)))
}

/// Build the `script(1)` argv that wraps an assistant command with
/// typescript, timing, and input capture.
pub fn wrap_command(shell_cmd: &str, dir: &Path, uuid: &str, append: bool) -> Vec<String> {
    let mut argv = vec![
        "script".to_owned(),
        "-q".to_owned(),
        "-e".to_owned(),
        "-f".to_owned(),
    ];
    if append {
        argv.push("-a".to_owned());
    }
    argv.extend([
        "-I".to_owned(),
        input_path(dir, uuid).to_string_lossy().into_owned(),
        "-O".to_owned(),
        log_path(dir, uuid).to_string_lossy().into_owned(),
        "-T".to_owned(),
        timing_path(dir, uuid).to_string_lossy().into_owned(),
        "-c".to_owned(),
        shell_cmd.to_owned(),
    ]);
    argv
}

/// Shared handle to one session's recording state.
pub struct RecordingHandle {
    dir: PathBuf,
    meta: Mutex<RecordingMeta>,
}

impl RecordingHandle {
    pub fn new(dir: PathBuf, uuid: String, agent: &str, command: Vec<String>, work_dir: &Path) -> Self {
        let meta = RecordingMeta {
            uuid,
            name: String::new(),
            agent: agent.to_owned(),
            started_at: Utc::now(),
            ended_at: None,
            kept_at: None,
            command,
            visitors: Vec::new(),
            max_cols: 80,
            max_rows: 24,
            playback_cols: 0,
            playback_rows: 0,
            work_dir: work_dir.to_string_lossy().into_owned(),
        };
        Self { dir, meta: Mutex::new(meta) }
    }

    pub async fn uuid(&self) -> String {
        self.meta.lock().await.uuid.clone()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist metadata. IO failures are logged, never fatal.
    pub async fn save(&self) {
        let meta = self.meta.lock().await.clone();
        if let Err(e) = write_metadata(&self.dir, &meta) {
            tracing::warn!(recording = %meta.uuid, err = %e, "failed to save recording metadata");
        }
    }

    pub async fn set_name(&self, name: &str) {
        self.meta.lock().await.name = name.to_owned();
        self.save().await;
    }

    pub async fn visitor_joined(&self) {
        self.meta.lock().await.visitors.push(Utc::now().to_rfc3339());
        self.save().await;
    }

    /// Track the largest terminal ever used; feeds playback sizing hints.
    pub async fn update_max_dims(&self, cols: u16, rows: u16) {
        let mut meta = self.meta.lock().await;
        meta.max_cols = meta.max_cols.max(cols);
        meta.max_rows = meta.max_rows.max(rows);
    }

    /// Set `endedAt` exactly once, compute playback dimensions from the
    /// log, and persist.
    pub async fn finalize(&self) {
        let mut meta = self.meta.lock().await;
        if meta.ended_at.is_some() {
            return;
        }
        meta.ended_at = Some(Utc::now());
        let log = std::fs::read(log_path(&self.dir, &meta.uuid)).unwrap_or_default();
        let (cols, rows) = compute_playback_dims(&log);
        meta.playback_cols = cols;
        meta.playback_rows = rows;
        let snapshot = meta.clone();
        drop(meta);
        if let Err(e) = write_metadata(&self.dir, &snapshot) {
            tracing::warn!(recording = %snapshot.uuid, err = %e, "failed to save final metadata");
        }
    }

    pub async fn snapshot(&self) -> RecordingMeta {
        self.meta.lock().await.clone()
    }
}

fn write_metadata(dir: &Path, meta: &RecordingMeta) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).context("create recordings dir")?;
    let json = serde_json::to_vec_pretty(meta).context("serialize metadata")?;
    std::fs::write(metadata_path(dir, &meta.uuid), json).context("write metadata")?;
    Ok(())
}

// Literal patterns; the unwraps cannot fail.
#[allow(clippy::unwrap_used)]
fn csi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\x1b(?:\[[0-9;?]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)?|[@-Z\\-_])").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn cursor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[(\d+);(\d+)H").unwrap())
}

/// Derive playback terminal dimensions from a raw typescript log.
///
/// Columns come from the longest escape-stripped line, clamped to
/// [80, 240]. Rows come from the highest `ESC [ row ; col H` cursor
/// address or the line count, floored at 24 and capped at 10000.
pub fn compute_playback_dims(log: &[u8]) -> (u16, u16) {
    let text = String::from_utf8_lossy(log);

    let mut max_line_len: usize = 0;
    let mut line_count: usize = 0;
    for line in text.split('\n') {
        line_count += 1;
        let stripped = csi_re().replace_all(line, "");
        let len = stripped.trim_end_matches('\r').chars().count();
        max_line_len = max_line_len.max(len);
    }
    if text.is_empty() {
        line_count = 0;
    }

    let mut max_cursor_row: usize = 0;
    for caps in cursor_re().captures_iter(&text) {
        if let Some(row) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) {
            max_cursor_row = max_cursor_row.max(row);
        }
    }

    let cols = max_line_len.clamp(80, 240) as u16;
    let rows = max_cursor_row.max(line_count + 1).max(24).min(10_000) as u16;
    (cols, rows)
}

/// Read and parse every recording's metadata, newest first.
pub fn list_recordings(dir: &Path) -> Vec<RecordingMeta> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut metas: Vec<RecordingMeta> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".metadata.json"))
        .filter_map(|e| std::fs::read(e.path()).ok())
        .filter_map(|bytes| serde_json::from_slice(&bytes).ok())
        .collect();
    metas.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    metas
}

pub fn load_metadata(dir: &Path, uuid: &str) -> Option<RecordingMeta> {
    let bytes = std::fs::read(metadata_path(dir, uuid)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Pin a recording against retention. Returns the updated metadata.
pub fn mark_kept(dir: &Path, uuid: &str) -> Option<RecordingMeta> {
    let mut meta = load_metadata(dir, uuid)?;
    if meta.kept_at.is_none() {
        meta.kept_at = Some(Utc::now());
    }
    if let Err(e) = write_metadata(dir, &meta) {
        tracing::warn!(recording = %uuid, err = %e, "failed to persist keep flag");
        return None;
    }
    Some(meta)
}

/// Rename a recording on disk. Returns the updated metadata.
pub fn rename_metadata(dir: &Path, uuid: &str, name: &str) -> Option<RecordingMeta> {
    let mut meta = load_metadata(dir, uuid)?;
    meta.name = name.to_owned();
    if let Err(e) = write_metadata(dir, &meta) {
        tracing::warn!(recording = %uuid, err = %e, "failed to persist rename");
        return None;
    }
    Some(meta)
}

/// Delete a recording's files (log, timing, input, metadata).
pub fn delete_recording(dir: &Path, uuid: &str) {
    for path in
        [log_path(dir, uuid), timing_path(dir, uuid), input_path(dir, uuid), metadata_path(dir, uuid)]
    {
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), err = %e, "failed to delete recording file");
            }
        }
    }
}

/// Recent-vs-Kept retention pass.
///
/// Per agent, completed non-kept recordings beyond the [`KEEP_RECENT`]
/// most recent (by log mtime) or older than [`MAX_AGE`] are deleted.
/// Active and kept recordings are never touched.
pub fn run_retention(dir: &Path, active: &HashSet<String>) {
    let mut by_agent: HashMap<String, Vec<(RecordingMeta, SystemTime)>> = HashMap::new();
    for meta in list_recordings(dir) {
        if active.contains(&meta.uuid) || meta.kept_at.is_some() {
            continue;
        }
        let mtime = std::fs::metadata(log_path(dir, &meta.uuid))
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        by_agent.entry(meta.agent.clone()).or_default().push((meta, mtime));
    }

    let now = SystemTime::now();
    for (_agent, mut group) in by_agent {
        group.sort_by(|a, b| b.1.cmp(&a.1));
        for (idx, (meta, mtime)) in group.iter().enumerate() {
            let expired =
                now.duration_since(*mtime).map(|age| age > MAX_AGE).unwrap_or(false);
            if idx >= KEEP_RECENT || expired {
                tracing::info!(recording = %meta.uuid, agent = %meta.agent, "reaping recording");
                delete_recording(dir, &meta.uuid);
            }
        }
    }
}

/// Bundle log, timing, and metadata into a zip archive for download.
pub fn build_download_zip(dir: &Path, uuid: &str) -> anyhow::Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options: zip::write::SimpleFileOptions = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, path) in [
        (format!("{}.log", stem(uuid)), log_path(dir, uuid)),
        (format!("{}.timing", stem(uuid)), timing_path(dir, uuid)),
        (format!("{}.metadata.json", stem(uuid)), metadata_path(dir, uuid)),
    ] {
        let Ok(bytes) = std::fs::read(&path) else { continue };
        writer.start_file(name, options)?;
        writer.write_all(&bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Session/recording display-name rule: length ≤ 256 and a restricted
/// charset.
pub fn valid_display_name(name: &str) -> bool {
    name.len() <= 256
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '/' | '.' | '@'))
}

#[cfg(test)]
#[path = "recording_tests.rs"]
mod tests;
