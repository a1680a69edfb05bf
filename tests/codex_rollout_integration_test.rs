//! End-to-end Codex watcher test: a real rollout tree under a scratch
//! `CODEX_HOME`, the real watcher task, and the broadcast stream a daemon
//! would consume.

use aura::{AgentEvent, AgentKind, agents::codex};
use std::ffi::OsString;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::time::timeout;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> &'static Mutex<()> {
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}

struct EnvVarGuard {
    key: &'static str,
    original: Option<OsString>,
}

impl EnvVarGuard {
    fn set(key: &'static str, value: &Path) -> Self {
        let original = std::env::var_os(key);
        // `set_var` is unsafe on edition 2024; these tests serialize all
        // environment mutation behind `env_lock`.
        unsafe {
            std::env::set_var(key, value);
        }
        Self { key, original }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}

fn write_jsonl(path: &Path, lines: &[serde_json::Value]) {
    let mut out = String::new();
    for line in lines {
        out.push_str(&serde_json::to_string(line).unwrap());
        out.push('\n');
    }
    std::fs::write(path, out).unwrap();
}

fn append_jsonl(path: &Path, lines: &[serde_json::Value]) {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    for line in lines {
        writeln!(file, "{}", serde_json::to_string(line).unwrap()).unwrap();
    }
}

/// Drain events until `quiet` passes with nothing new arriving.
async fn drain_events(rx: &mut codex::CodexEventRx, quiet: Duration) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = timeout(quiet, rx.recv()).await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn bootstrap_announces_recent_session_with_bounded_replay() {
    let _env = env_lock().lock().await;
    let tmp = TempDir::new().unwrap();
    let _guard = EnvVarGuard::set("CODEX_HOME", tmp.path());

    let day_dir = tmp.path().join("sessions").join("2026").join("08").join("02");
    std::fs::create_dir_all(&day_dir).unwrap();
    let rollout = day_dir.join("rollout-2026-08-02T10-00-00-11111111-2222-3333-4444-555555555555.jsonl");

    // A long session history: the bootstrap must stay bounded regardless.
    let mut lines = vec![serde_json::json!({
        "type": "session_meta",
        "payload": { "id": "sess_big", "cwd": "/tmp/project" }
    })];
    for _ in 0..10_000 {
        lines.push(serde_json::json!({
            "type": "event_msg",
            "payload": { "type": "agent_message" }
        }));
    }
    lines.push(serde_json::json!({
        "type": "event_msg",
        "payload": { "type": "task_complete" }
    }));
    write_jsonl(&rollout, &lines);

    let mut rx = codex::spawn().subscribe();

    let first = timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("watcher produced no events")
        .expect("stream closed");

    match &first {
        AgentEvent::SessionStarted {
            session_id,
            cwd,
            agent,
            ..
        } => {
            assert_eq!(session_id, "sess_big");
            assert_eq!(cwd, "/tmp/project");
            assert_eq!(*agent, AgentKind::Codex);
        }
        other => panic!("expected SessionStarted first, got {other:?}"),
    }

    let rest = drain_events(&mut rx, Duration::from_millis(500)).await;
    assert!(
        rest.len() <= 4,
        "replay must be capped at 4 events, got {}: {rest:?}",
        rest.len()
    );
    assert!(
        rest.iter()
            .all(|e| !matches!(e, AgentEvent::SessionStarted { .. })),
        "exactly one session announcement expected: {rest:?}"
    );
    // The file ends on task_complete, so the tail of the replay goes idle.
    assert!(matches!(rest.last(), Some(AgentEvent::Idle { .. })));
}

#[tokio::test]
async fn appended_lines_flow_through_the_tailer() {
    let _env = env_lock().lock().await;
    let tmp = TempDir::new().unwrap();
    let _guard = EnvVarGuard::set("CODEX_HOME", tmp.path());

    let day_dir = tmp.path().join("sessions").join("2026").join("08").join("02");
    std::fs::create_dir_all(&day_dir).unwrap();
    let rollout = day_dir.join("rollout-2026-08-02T11-00-00-aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee.jsonl");

    write_jsonl(
        &rollout,
        &[serde_json::json!({
            "type": "session_meta",
            "payload": { "id": "sess_tail", "cwd": "/tmp/project" }
        })],
    );

    let mut rx = codex::spawn().subscribe();

    let first = timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("watcher produced no events")
        .expect("stream closed");
    assert!(
        matches!(&first, AgentEvent::SessionStarted { session_id, .. } if session_id == "sess_tail")
    );
    drain_events(&mut rx, Duration::from_millis(300)).await;

    let call_args = serde_json::to_string(&serde_json::json!({ "cmd": "cargo test" })).unwrap();
    append_jsonl(
        &rollout,
        &[
            serde_json::json!({ "type": "response_item", "payload": {
                "type": "function_call", "call_id": "call_1",
                "name": "exec_command", "arguments": call_args
            }}),
            serde_json::json!({ "type": "response_item", "payload": {
                "type": "function_call_output", "call_id": "call_1"
            }}),
        ],
    );

    // The fallback rescan (2s) picks this up even if notify drops the event.
    let mut seen_start = false;
    let mut seen_complete = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !(seen_start && seen_complete) {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .expect("timed out waiting for tailed events");
        match timeout(remaining, rx.recv()).await {
            Ok(Some(AgentEvent::ToolStarted {
                session_id,
                tool_id,
                tool_name,
                ..
            })) => {
                assert_eq!(session_id, "sess_tail");
                assert_eq!(tool_id, "call_1");
                assert_eq!(tool_name, "cargo");
                seen_start = true;
            }
            Ok(Some(AgentEvent::ToolCompleted { tool_id, .. })) => {
                assert_eq!(tool_id, "call_1");
                seen_complete = true;
            }
            Ok(Some(_)) => {}
            Ok(None) => panic!("stream closed"),
            Err(_) => panic!("timed out waiting for tailed events"),
        }
    }
}

#[tokio::test]
async fn old_rollouts_are_watched_but_not_replayed() {
    let _env = env_lock().lock().await;
    let tmp = TempDir::new().unwrap();
    let _guard = EnvVarGuard::set("CODEX_HOME", tmp.path());

    let day_dir = tmp.path().join("sessions").join("2026").join("07").join("01");
    std::fs::create_dir_all(&day_dir).unwrap();
    let rollout = day_dir.join("rollout-2026-07-01T09-00-00-99999999-8888-7777-6666-555555555555.jsonl");
    write_jsonl(
        &rollout,
        &[
            serde_json::json!({ "type": "session_meta", "payload": { "id": "sess_old", "cwd": "/tmp" } }),
            serde_json::json!({ "type": "event_msg", "payload": { "type": "task_complete" } }),
        ],
    );
    let old = std::time::SystemTime::now() - Duration::from_secs(30 * 60);
    filetime::set_file_mtime(&rollout, filetime::FileTime::from_system_time(old)).unwrap();

    let mut rx = codex::spawn().subscribe();
    let events = drain_events(&mut rx, Duration::from_secs(3)).await;
    assert!(
        events.is_empty(),
        "stale rollout must not seed the HUD: {events:?}"
    );
}
