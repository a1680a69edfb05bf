//! Codex rollout discovery and tailing.
//!
//! Watches `$CODEX_HOME/sessions` recursively with `notify`, keeps a byte
//! offset per rollout, and parses appended JSONL lines through
//! [`RolloutState`](super::parser::RolloutState). A periodic rescan backs up
//! the filesystem notifications, so lost events degrade latency, not
//! correctness.

use super::parser::RolloutState;
use super::paths;
use crate::{AgentEvent, AgentKind};
use notify::{RecursiveMode, Watcher};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::{Notify, broadcast};
use tracing::{debug, info, trace, warn};

/// Replay at most this many trailing events when picking up an existing rollout.
const BOOTSTRAP_REPLAY_MAX_EVENTS: usize = 4;
/// Rollouts older than this are watched passively, not replayed.
const BOOTSTRAP_WINDOW: Duration = Duration::from_secs(10 * 60);
/// Rescan cadence covering dropped filesystem notifications.
const FALLBACK_SCAN_INTERVAL: Duration = Duration::from_secs(2);

fn parse_json_line(path: &Path, line: &str) -> Option<Value> {
    match serde_json::from_str(line) {
        Ok(v) => Some(v),
        Err(e) => {
            // Line content may hold user text; log only the location.
            debug!(path = %path.display(), error = %e, "malformed rollout line skipped");
            None
        }
    }
}

/// Split complete lines out of `buffer`, leaving any partial trailing line.
fn drain_jsonl_lines(buffer: &mut String, mut on_line: impl FnMut(&str)) {
    let mut start = 0usize;
    for (idx, b) in buffer.as_bytes().iter().enumerate() {
        if *b != b'\n' {
            continue;
        }
        let line = buffer[start..idx].trim();
        start = idx + 1;
        if !line.is_empty() {
            on_line(line);
        }
    }
    if start > 0 {
        *buffer = buffer[start..].to_string();
    }
}

#[derive(Debug)]
struct TailedRollout {
    path: PathBuf,
    offset: u64,
    buffer: String,
    state: RolloutState,
}

impl TailedRollout {
    fn new(path: PathBuf, session_id: String, cwd: String) -> Self {
        Self {
            path,
            offset: 0,
            buffer: String::new(),
            state: RolloutState::new(session_id, cwd),
        }
    }
}

fn emit(tx: &broadcast::Sender<AgentEvent>, events: Vec<AgentEvent>) {
    for event in events {
        trace!(?event, "codex rollout event");
        let _ = tx.send(event);
    }
}

/// Read the session identity from the file's `session_meta` line (usually the
/// first line).
async fn read_session_meta(path: &Path) -> Option<(String, String)> {
    let file = tokio::fs::File::open(path).await.ok()?;
    let mut reader = BufReader::new(file);

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        if !line.trim().is_empty() {
            break;
        }
    }

    let value: Value = serde_json::from_str(line.trim()).ok()?;
    if value.get("type").and_then(|v| v.as_str()) != Some("session_meta") {
        return None;
    }

    let payload = value.get("payload")?;
    let id = payload.get("id").and_then(|v| v.as_str())?.to_string();
    let cwd = payload
        .get("cwd")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    Some((id, cwd))
}

async fn file_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

/// Seed the HUD from an existing rollout: announce the session (with any
/// recovered name) and replay a bounded tail of events. The cap keeps the
/// work independent of file size.
async fn bootstrap_rollout(rollout: &mut TailedRollout, tx: &broadcast::Sender<AgentEvent>) {
    // Old rollouts would flood the HUD with dead sessions; pin them to EOF
    // and let an append activate them.
    if !paths::modified_within(&rollout.path, BOOTSTRAP_WINDOW).await {
        rollout.offset = file_len(&rollout.path).await.unwrap_or(rollout.offset);
        rollout.buffer.clear();
        return;
    }

    let mut file = match tokio::fs::File::open(&rollout.path).await {
        Ok(f) => f,
        Err(e) => {
            debug!(path = %rollout.path.display(), error = %e, "failed to open rollout for bootstrap");
            return;
        }
    };

    let mut buf = Vec::new();
    if let Err(e) = file.read_to_end(&mut buf).await {
        debug!(path = %rollout.path.display(), error = %e, "failed to read rollout for bootstrap");
        return;
    }
    rollout.offset = buf.len() as u64;

    let mut scan_state =
        RolloutState::new(rollout.state.session_id.clone(), rollout.state.cwd.clone());
    let mut replay: std::collections::VecDeque<AgentEvent> =
        std::collections::VecDeque::with_capacity(BOOTSTRAP_REPLAY_MAX_EVENTS);
    let mut latest_name: Option<String> = None;

    let path = rollout.path.clone();
    rollout.buffer = String::from_utf8_lossy(&buf).to_string();
    drain_jsonl_lines(&mut rollout.buffer, |line| {
        let Some(value) = parse_json_line(&path, line) else {
            return;
        };
        for event in scan_state.apply_line(&value) {
            match event {
                AgentEvent::SessionStarted { .. } => {}
                AgentEvent::SessionNameUpdated { name, .. } => latest_name = Some(name),
                other => {
                    if replay.len() == BOOTSTRAP_REPLAY_MAX_EVENTS {
                        replay.pop_front();
                    }
                    replay.push_back(other);
                }
            }
        }
    });

    let mut out = Vec::with_capacity(1 + replay.len());
    out.push(AgentEvent::SessionStarted {
        session_id: scan_state.session_id.clone(),
        agent: AgentKind::Codex,
        cwd: scan_state.cwd.clone(),
        name: latest_name,
    });
    out.extend(replay);
    emit(tx, out);

    rollout.state = scan_state;
    rollout.state.session_emitted = true;
}

/// Read from the recorded offset to EOF and parse any complete lines.
async fn tail_rollout(rollout: &mut TailedRollout, tx: &broadcast::Sender<AgentEvent>) {
    loop {
        let Some(len) = file_len(&rollout.path).await else {
            return;
        };

        if len < rollout.offset {
            debug!(path = %rollout.path.display(), "rollout truncated, resetting cursor");
            rollout.offset = 0;
            rollout.buffer.clear();
            rollout.state.session_emitted = false;

            // A truncated file is effectively a new stream. Re-bootstrap so
            // we do not replay its full history.
            bootstrap_rollout(rollout, tx).await;
            continue;
        }

        if len == rollout.offset {
            return;
        }

        let start_offset = rollout.offset;
        let mut file = match tokio::fs::File::open(&rollout.path).await {
            Ok(f) => f,
            Err(e) => {
                debug!(path = %rollout.path.display(), error = %e, "failed to open rollout");
                return;
            }
        };
        if let Err(e) = file.seek(std::io::SeekFrom::Start(start_offset)).await {
            debug!(path = %rollout.path.display(), error = %e, "failed to seek rollout");
            return;
        }

        let mut buf = Vec::new();
        if let Err(e) = file.read_to_end(&mut buf).await {
            debug!(path = %rollout.path.display(), error = %e, "failed to read rollout");
            return;
        }
        rollout.offset = start_offset + buf.len() as u64;
        rollout.buffer.push_str(&String::from_utf8_lossy(&buf));

        let path = rollout.path.clone();
        let state = &mut rollout.state;
        drain_jsonl_lines(&mut rollout.buffer, |line| {
            let Some(value) = parse_json_line(&path, line) else {
                return;
            };
            let events = state.apply_line(&value);
            emit(tx, events);
        });

        return;
    }
}

/// Paths flagged by the notify callback, drained by the tail loop.
#[derive(Debug, Default)]
struct DirtyPaths {
    inner: Mutex<DirtyPathsInner>,
    notify: Notify,
}

#[derive(Debug, Default)]
struct DirtyPathsInner {
    paths: HashSet<PathBuf>,
    rescan: bool,
}

impl DirtyPaths {
    fn mark(&self, path: PathBuf) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.paths.insert(path);
        }
        self.notify.notify_one();
    }

    fn mark_rescan(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.rescan = true;
        }
        self.notify.notify_one();
    }

    fn drain(&self) -> (bool, Vec<PathBuf>) {
        let Ok(mut inner) = self.inner.lock() else {
            return (false, Vec::new());
        };
        let rescan = inner.rescan;
        inner.rescan = false;
        (rescan, inner.paths.drain().collect())
    }
}

pub(super) async fn run(tx: broadcast::Sender<AgentEvent>) {
    let codex_paths = paths::CodexPaths::detect();
    let home = codex_paths.home;
    let root = codex_paths.sessions_root;
    let root_alt = codex_paths.sessions_root_alt;

    info!(path = %root.display(), "watching codex sessions");

    let dirty = Arc::new(DirtyPaths::default());

    let dirty_cb = Arc::clone(&dirty);
    let cb_root = root.clone();
    let cb_root_alt = root_alt.clone();
    let mut watcher =
        match notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            let event = match res {
                Ok(e) => e,
                Err(err) => {
                    debug!(error = %err, "codex file watcher error");
                    dirty_cb.mark_rescan();
                    return;
                }
            };

            // Backends emit `Other` (or path-less events) when their buffers
            // overflow; a rescan is the only safe response.
            if matches!(event.kind, notify::event::EventKind::Other) || event.paths.is_empty() {
                dirty_cb.mark_rescan();
                return;
            }

            for path in event.paths {
                if !path.starts_with(&cb_root) && !path.starts_with(&cb_root_alt) {
                    continue;
                }
                if paths::is_jsonl(&path) {
                    dirty_cb.mark(path);
                } else {
                    // Directory-level changes (new date dirs, renames) may not
                    // name a rollout file.
                    dirty_cb.mark_rescan();
                }
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "failed to initialize codex file watcher");
                return;
            }
        };

    // Watch the sessions root when it exists; otherwise watch the codex home
    // so we notice `sessions/` being created later.
    let mut sessions_watched = false;
    let mut home_watched = false;
    if root.exists() {
        match watcher.watch(&root, RecursiveMode::Recursive) {
            Ok(()) => sessions_watched = true,
            Err(e) => {
                warn!(path = %root.display(), error = %e, "failed to watch codex sessions");
            }
        }
    } else if let Err(e) = watcher.watch(&home, RecursiveMode::NonRecursive) {
        warn!(path = %home.display(), error = %e, "failed to watch codex home");
    } else {
        home_watched = true;
    }

    // Register every existing rollout; recent ones get a bounded replay.
    let mut tailed: HashMap<PathBuf, TailedRollout> = HashMap::new();
    if root.exists() {
        for path in paths::read_dir_recursive(&root) {
            let mut rollout = register_rollout(&path).await;
            if paths::modified_within(&path, BOOTSTRAP_WINDOW).await {
                bootstrap_rollout(&mut rollout, &tx).await;
                // Catch bytes appended during the bootstrap scan.
                tail_rollout(&mut rollout, &tx).await;
            } else {
                rollout.offset = file_len(&path).await.unwrap_or(0);
            }
            tailed.insert(path, rollout);
        }
        debug!("codex rollouts registered: {}", tailed.len());
    }

    let mut scan_tick = tokio::time::interval(FALLBACK_SCAN_INTERVAL);
    scan_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        let mut ticked = false;
        tokio::select! {
            biased;
            _ = scan_tick.tick() => ticked = true,
            _ = dirty.notify.notified() => {},
        }

        let (rescan, mut pending) = dirty.drain();
        if ticked && root.exists() {
            pending.extend(paths::scan_recent_rollouts(&root, BOOTSTRAP_WINDOW).await);
        }

        if (rescan || ticked) && !sessions_watched && root.exists() {
            match watcher.watch(&root, RecursiveMode::Recursive) {
                Ok(()) => {
                    sessions_watched = true;
                    if home_watched {
                        match watcher.unwatch(&home) {
                            Ok(()) => home_watched = false,
                            Err(e) => {
                                warn!(path = %home.display(), error = %e, "failed to unwatch codex home");
                            }
                        }
                    }
                }
                Err(e) => warn!(path = %root.display(), error = %e, "failed to watch codex sessions"),
            }
        }

        if rescan && root.exists() {
            pending.extend(paths::read_dir_recursive(&root));
        }

        // Stable order keeps event interleaving predictable across files.
        pending.sort();
        pending.dedup();

        for path in pending {
            if !tailed.contains_key(&path) {
                info!(path = %path.display(), "discovered new codex rollout");
                tailed.insert(path.clone(), register_rollout(&path).await);
            }

            if let Some(rollout) = tailed.get_mut(&path) {
                if !rollout.state.session_emitted {
                    bootstrap_rollout(rollout, &tx).await;
                }
                if rollout.state.session_emitted {
                    tail_rollout(rollout, &tx).await;
                } else {
                    // Still outside the bootstrap window; keep the cursor at
                    // EOF so old history is never replayed.
                    rollout.offset = file_len(&path).await.unwrap_or(rollout.offset);
                }
            }
        }
    }
}

async fn register_rollout(path: &Path) -> TailedRollout {
    let mut session_id = paths::session_id_from_path(path);
    let mut cwd = String::new();
    if let Some((meta_id, meta_cwd)) = read_session_meta(path).await {
        session_id = meta_id;
        cwd = meta_cwd;
    }
    TailedRollout::new(path.to_path_buf(), session_id, cwd)
}
