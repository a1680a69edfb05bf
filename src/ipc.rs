//! IPC wire protocol between adapters and the daemon.
//!
//! The hook subprocess and the daemon live in the same binary and talk over a
//! Unix socket with newline-delimited JSON frames. Each frame is tagged by a
//! `msg` field; `event` frames carry the [`AgentEvent`] fields inline.

use crate::AgentEvent;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Socket file name, placed under `$XDG_RUNTIME_DIR` (or the temp dir).
pub const SOCKET_FILE: &str = "aura.sock";

/// Resolve the daemon socket path.
pub fn socket_path() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(SOCKET_FILE),
        _ => std::env::temp_dir().join(SOCKET_FILE),
    }
}

/// Frame from an adapter to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum IpcMessage {
    /// Liveness probe; the daemon answers with [`IpcResponse::Pong`].
    Ping,
    /// An agent event to apply to the registry. No reply.
    Event {
        #[serde(flatten)]
        event: AgentEvent,
    },
}

/// Frame from the daemon back to an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum IpcResponse {
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AgentKind;

    #[test]
    fn ping_frame() {
        let json = serde_json::to_string(&IpcMessage::Ping).unwrap();
        assert_eq!(json, r#"{"msg":"ping"}"#);
        assert_eq!(
            serde_json::from_str::<IpcMessage>(&json).unwrap(),
            IpcMessage::Ping
        );
    }

    #[test]
    fn pong_frame() {
        assert_eq!(
            serde_json::to_string(&IpcResponse::Pong).unwrap(),
            r#"{"msg":"pong"}"#
        );
    }

    #[test]
    fn event_frame_flattens_agent_event() {
        let msg = IpcMessage::Event {
            event: AgentEvent::ToolStarted {
                session_id: "s1".into(),
                agent: AgentKind::ClaudeCode,
                tool_id: "t1".into(),
                tool_name: "Bash".into(),
                tool_label: Some("npm test".into()),
            },
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"msg\":\"event\""));
        assert!(json.contains("\"type\":\"tool_started\""));

        let parsed: IpcMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn event_frame_all_variants_decode() {
        let frames = [
            r#"{"msg":"event","type":"session_started","session_id":"s1","agent":"claude_code","cwd":"/u/dev/app"}"#,
            r#"{"msg":"event","type":"tool_started","session_id":"s1","agent":"claude_code","tool_id":"t1","tool_name":"Read"}"#,
            r#"{"msg":"event","type":"tool_completed","session_id":"s1","agent":"claude_code","tool_id":"t1"}"#,
            r#"{"msg":"event","type":"activity","session_id":"s1","agent":"claude_code"}"#,
            r#"{"msg":"event","type":"idle","session_id":"s1","agent":"claude_code"}"#,
            r#"{"msg":"event","type":"needs_attention","session_id":"s1","agent":"claude_code","message":"Bash"}"#,
            r#"{"msg":"event","type":"waiting_for_input","session_id":"s1","agent":"claude_code"}"#,
            r#"{"msg":"event","type":"compacting","session_id":"s1","agent":"codex"}"#,
            r#"{"msg":"event","type":"session_name_updated","session_id":"s1","agent":"claude_code","name":"fix login"}"#,
            r#"{"msg":"event","type":"session_ended","session_id":"s1","agent":"claude_code"}"#,
        ];

        for json in frames {
            let msg: IpcMessage = serde_json::from_str(json).unwrap();
            match msg {
                IpcMessage::Event { event } => assert_eq!(event.session_id(), "s1"),
                other => panic!("expected event frame, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let json = r#"{"msg":"event","type":"mystery","session_id":"s1","agent":"codex"}"#;
        assert!(serde_json::from_str::<IpcMessage>(json).is_err());
    }

    #[test]
    fn socket_path_ends_with_socket_file() {
        assert!(socket_path().ends_with(SOCKET_FILE));
    }
}
