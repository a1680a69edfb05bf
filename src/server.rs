//! Unix socket server ingesting adapter events.
//!
//! Listens on the socket from [`ipc::socket_path`] for newline-delimited JSON
//! frames. `ping` frames get a `pong` reply; `event` frames are applied to
//! the registry; undecodable frames are skipped without dropping the
//! connection. The daemon unlinks the socket file on shutdown.

use crate::ipc::{self, IpcMessage, IpcResponse};
use crate::registry::SessionRegistry;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, trace, warn};

/// Bind the default socket and serve forever.
pub async fn run(registry: SessionRegistry) {
    let path = ipc::socket_path();
    if let Err(e) = serve(&path, registry).await {
        warn!(path = %path.display(), error = %e, "IPC server stopped");
    }
}

/// Bind `path` and serve connections until the task is cancelled.
pub async fn serve(path: &Path, registry: SessionRegistry) -> std::io::Result<()> {
    // A previous daemon may have left its socket behind.
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let listener = UnixListener::bind(path)?;
    info!(path = %path.display(), "IPC server listening");

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let registry = registry.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, registry).await {
                        debug!(error = %e, "IPC connection closed with error");
                    }
                });
            }
            Err(e) => warn!(error = %e, "failed to accept socket connection"),
        }
    }
}

/// Remove the socket file (daemon shutdown).
pub fn cleanup_socket(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to unlink socket");
    }
}

async fn handle_connection(
    stream: UnixStream,
    registry: SessionRegistry,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<IpcMessage>(&line) {
            Ok(IpcMessage::Event { event }) => {
                debug!(?event, "ipc event");
                registry.apply(event);
            }
            Ok(IpcMessage::Ping) => {
                let pong =
                    serde_json::to_string(&IpcResponse::Pong).expect("pong serializes");
                writer.write_all(pong.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Err(e) => {
                trace!(error = %e, "undecodable IPC frame skipped");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentKind, SessionState};
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    async fn start_server(registry: SessionRegistry) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("aura-test.sock");
        let serve_path = path.clone();
        tokio::spawn(async move {
            let _ = serve(&serve_path, registry).await;
        });
        // Wait for the listener to come up.
        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        (dir, path)
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn ping_gets_pong() {
        let registry = SessionRegistry::new();
        let (_dir, path) = start_server(registry).await;

        let mut stream = UnixStream::connect(&path).await.unwrap();
        stream.write_all(b"{\"msg\":\"ping\"}\n").await.unwrap();

        let mut reply = vec![0u8; 64];
        let n = stream.read(&mut reply).await.unwrap();
        assert_eq!(&reply[..n], b"{\"msg\":\"pong\"}\n");
    }

    #[tokio::test]
    async fn event_frames_reach_the_registry() {
        let registry = SessionRegistry::new();
        let (_dir, path) = start_server(registry.clone()).await;

        let mut stream = UnixStream::connect(&path).await.unwrap();
        stream
            .write_all(
                b"{\"msg\":\"event\",\"type\":\"session_started\",\"session_id\":\"s1\",\"agent\":\"claude_code\",\"cwd\":\"/u/dev/app\"}\n",
            )
            .await
            .unwrap();

        wait_for(|| registry.len() == 1).await;
        let session = &registry.snapshot()[0];
        assert_eq!(session.session_id, "s1");
        assert_eq!(session.agent, AgentKind::ClaudeCode);
        assert_eq!(session.state, SessionState::Running);
    }

    #[tokio::test]
    async fn bad_frames_keep_the_connection_alive() {
        let registry = SessionRegistry::new();
        let (_dir, path) = start_server(registry.clone()).await;

        let mut stream = UnixStream::connect(&path).await.unwrap();
        stream.write_all(b"this is not json\n").await.unwrap();
        stream
            .write_all(b"{\"msg\":\"event\",\"type\":\"unknown_variant\",\"session_id\":\"x\"}\n")
            .await
            .unwrap();
        stream
            .write_all(
                b"{\"msg\":\"event\",\"type\":\"session_started\",\"session_id\":\"s2\",\"agent\":\"codex\",\"cwd\":\"/p\"}\n",
            )
            .await
            .unwrap();

        wait_for(|| registry.len() == 1).await;
        assert_eq!(registry.snapshot()[0].session_id, "s2");
    }

    #[tokio::test]
    async fn frames_apply_in_order_per_connection() {
        let registry = SessionRegistry::new();
        let (_dir, path) = start_server(registry.clone()).await;

        let mut stream = UnixStream::connect(&path).await.unwrap();
        let frames = concat!(
            "{\"msg\":\"event\",\"type\":\"session_started\",\"session_id\":\"s1\",\"agent\":\"claude_code\",\"cwd\":\"/a\"}\n",
            "{\"msg\":\"event\",\"type\":\"tool_started\",\"session_id\":\"s1\",\"agent\":\"claude_code\",\"tool_id\":\"t1\",\"tool_name\":\"Read\",\"tool_label\":\"main.rs\"}\n",
            "{\"msg\":\"event\",\"type\":\"tool_completed\",\"session_id\":\"s1\",\"agent\":\"claude_code\",\"tool_id\":\"t1\"}\n",
            "{\"msg\":\"event\",\"type\":\"idle\",\"session_id\":\"s1\",\"agent\":\"claude_code\"}\n",
        );
        stream.write_all(frames.as_bytes()).await.unwrap();

        wait_for(|| {
            registry
                .snapshot()
                .first()
                .is_some_and(|s| s.state == SessionState::Idle)
        })
        .await;
        let session = &registry.snapshot()[0];
        assert!(session.running_tools.is_empty());
        assert!(session.stopped_at.is_some());
    }
}
