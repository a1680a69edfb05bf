//! Filesystem layout of the Codex home: `$CODEX_HOME/sessions/YYYY/MM/DD/
//! rollout-<timestamp>-<uuid>.jsonl`.

use chrono::{Datelike, Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub(super) struct CodexPaths {
    pub(super) home: PathBuf,
    pub(super) sessions_root: PathBuf,
    /// Un-canonicalized sibling of `sessions_root`; notify may report either
    /// spelling when the home sits behind a symlink.
    pub(super) sessions_root_alt: PathBuf,
}

impl CodexPaths {
    pub(super) fn detect() -> Self {
        let raw_home = codex_home();
        let home = std::fs::canonicalize(&raw_home).unwrap_or_else(|_| raw_home.clone());
        Self {
            sessions_root: home.join("sessions"),
            sessions_root_alt: raw_home.join("sessions"),
            home,
        }
    }
}

fn codex_home() -> PathBuf {
    match std::env::var_os("CODEX_HOME") {
        Some(home) => PathBuf::from(home),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".codex"),
    }
}

pub(super) fn is_jsonl(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
}

/// Fallback session id from the filename.
///
/// Common format: `rollout-<timestamp>-<uuid>.jsonl`, where the uuid is the
/// last 5 `-`-separated segments. The `session_meta` line wins when present.
pub(super) fn session_id_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    let segments: Vec<&str> = stem.split('-').collect();
    match segments.len() {
        n if n >= 6 => segments[n - 5..].join("-"),
        _ => stem.to_string(),
    }
}

/// All `*.jsonl` files anywhere under `root`.
pub(super) fn read_dir_recursive(root: &Path) -> Vec<PathBuf> {
    fn visit(dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            match entry.file_type() {
                Ok(t) if t.is_dir() => visit(&path, out),
                Ok(t) if t.is_file() && is_jsonl(&path) => out.push(path),
                _ => {}
            }
        }
    }

    let mut out = Vec::new();
    visit(root, &mut out);
    out
}

fn date_dir(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(format!("{:04}", date.year()))
        .join(format!("{:02}", date.month()))
        .join(format!("{:02}", date.day()))
}

/// The lexicographically greatest all-digit child directory of `parent` with
/// exactly `len` characters (years are 4 digits, months and days 2).
fn max_numeric_child_dir(parent: &Path, len: usize) -> Option<PathBuf> {
    std::fs::read_dir(parent)
        .ok()?
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            (name.len() == len && name.bytes().all(|b| b.is_ascii_digit()))
                .then(|| (name, entry.path()))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, path)| path)
}

fn latest_day_dir(root: &Path) -> Option<PathBuf> {
    let year = max_numeric_child_dir(root, 4)?;
    let month = max_numeric_child_dir(&year, 2)?;
    max_numeric_child_dir(&month, 2)
}

/// Directories worth rescanning for fresh rollouts: root, today, yesterday,
/// and the newest date directory on disk.
fn candidate_scan_dirs(root: &Path) -> Vec<PathBuf> {
    let today = Local::now().date_naive();

    let mut dirs = vec![
        root.to_path_buf(),
        date_dir(root, today),
        date_dir(root, today - chrono::Duration::days(1)),
    ];
    dirs.extend(latest_day_dir(root));
    dirs.sort();
    dirs.dedup();
    dirs
}

pub(super) async fn modified_within(path: &Path, window: Duration) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    meta.modified().is_ok_and(|modified| {
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO)
            <= window
    })
}

/// Rollouts in the candidate directories whose mtime falls inside `window`.
pub(super) async fn scan_recent_rollouts(root: &Path, window: Duration) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for dir in candidate_scan_dirs(root) {
        let Ok(mut rd) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = rd.next_entry().await {
            let path = entry.path();
            if entry.file_type().await.is_ok_and(|t| t.is_file())
                && is_jsonl(&path)
                && modified_within(&path, window).await
            {
                out.push(path);
            }
        }
    }
    out
}
