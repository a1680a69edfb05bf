//! Codex agent integration.
//!
//! Codex writes append-only session rollout JSONL files under
//! `$CODEX_HOME/sessions` (default `~/.codex/sessions`). Watching those files
//! works even when Codex was started externally via the `codex` CLI, so there
//! is no hook process for this agent.

use crate::AgentEvent;
use tokio::sync::broadcast;

mod parser;
mod paths;
mod watcher;

const EVENT_BUFFER: usize = 4096;

/// Handle to the stream of Codex agent events.
#[derive(Debug, Clone)]
pub struct CodexEventStream {
    tx: broadcast::Sender<AgentEvent>,
}

#[derive(Debug)]
pub struct CodexEventRx {
    rx: broadcast::Receiver<AgentEvent>,
}

impl CodexEventStream {
    /// Subscribe to Codex agent events.
    ///
    /// The receiver swallows `Lagged` errors: the integration is best-effort
    /// and missed events are not recovered.
    pub fn subscribe(&self) -> CodexEventRx {
        CodexEventRx {
            rx: self.tx.subscribe(),
        }
    }
}

impl CodexEventRx {
    pub async fn recv(&mut self) -> Option<AgentEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Spawn the rollout watcher and return its event stream.
pub fn spawn() -> CodexEventStream {
    let (tx, _rx) = broadcast::channel(EVENT_BUFFER);
    let watcher_tx = tx.clone();
    tokio::spawn(async move {
        watcher::run(watcher_tx).await;
    });
    CodexEventStream { tx }
}
