//! Agent-agnostic event types
//!
//! Adapters (Claude Code hooks, Codex rollouts) normalize agent-specific
//! input into these events. The registry consumes them and never sees raw
//! vendor JSON.

use serde::{Deserialize, Serialize};

/// Kind of AI code agent a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    ClaudeCode,
    Codex,
}

/// Normalized event driving the session registry.
///
/// Closed set: producers either emit one of these or drop the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// New session started (or re-announced, e.g. after a cwd change)
    SessionStarted {
        session_id: String,
        agent: AgentKind,
        cwd: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Tool execution started
    ToolStarted {
        session_id: String,
        agent: AgentKind,
        tool_id: String,
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_label: Option<String>,
    },
    /// Tool execution completed (success or failure)
    ToolCompleted {
        session_id: String,
        agent: AgentKind,
        tool_id: String,
    },
    /// Generic liveness signal
    Activity { session_id: String, agent: AgentKind },
    /// Agent finished its turn, waiting for the user
    Idle { session_id: String, agent: AgentKind },
    /// Agent needs a human decision (e.g. permission prompt)
    NeedsAttention {
        session_id: String,
        agent: AgentKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Agent explicitly asked for textual user input
    WaitingForInput { session_id: String, agent: AgentKind },
    /// Context window compaction in progress
    Compacting { session_id: String, agent: AgentKind },
    /// Display name changed (via `aura set-name`)
    SessionNameUpdated {
        session_id: String,
        agent: AgentKind,
        name: String,
    },
    /// Session ended; remove it from the registry
    SessionEnded { session_id: String, agent: AgentKind },
}

impl AgentEvent {
    /// Get session_id from any event
    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::ToolStarted { session_id, .. }
            | Self::ToolCompleted { session_id, .. }
            | Self::Activity { session_id, .. }
            | Self::Idle { session_id, .. }
            | Self::NeedsAttention { session_id, .. }
            | Self::WaitingForInput { session_id, .. }
            | Self::Compacting { session_id, .. }
            | Self::SessionNameUpdated { session_id, .. }
            | Self::SessionEnded { session_id, .. } => session_id,
        }
    }

    /// Get agent kind from any event
    pub fn agent(&self) -> AgentKind {
        match self {
            Self::SessionStarted { agent, .. }
            | Self::ToolStarted { agent, .. }
            | Self::ToolCompleted { agent, .. }
            | Self::Activity { agent, .. }
            | Self::Idle { agent, .. }
            | Self::NeedsAttention { agent, .. }
            | Self::WaitingForInput { agent, .. }
            | Self::Compacting { agent, .. }
            | Self::SessionNameUpdated { agent, .. }
            | Self::SessionEnded { agent, .. } => *agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_extraction() {
        let events = [
            AgentEvent::SessionStarted {
                session_id: "s1".into(),
                agent: AgentKind::ClaudeCode,
                cwd: "/tmp".into(),
                name: None,
            },
            AgentEvent::ToolStarted {
                session_id: "s2".into(),
                agent: AgentKind::ClaudeCode,
                tool_id: "t1".into(),
                tool_name: "Read".into(),
                tool_label: None,
            },
            AgentEvent::ToolCompleted {
                session_id: "s3".into(),
                agent: AgentKind::ClaudeCode,
                tool_id: "t1".into(),
            },
            AgentEvent::Activity {
                session_id: "s4".into(),
                agent: AgentKind::Codex,
            },
            AgentEvent::Idle {
                session_id: "s5".into(),
                agent: AgentKind::Codex,
            },
            AgentEvent::NeedsAttention {
                session_id: "s6".into(),
                agent: AgentKind::ClaudeCode,
                message: Some("Bash".into()),
            },
            AgentEvent::WaitingForInput {
                session_id: "s7".into(),
                agent: AgentKind::ClaudeCode,
            },
            AgentEvent::Compacting {
                session_id: "s8".into(),
                agent: AgentKind::Codex,
            },
            AgentEvent::SessionNameUpdated {
                session_id: "s9".into(),
                agent: AgentKind::ClaudeCode,
                name: "fix login".into(),
            },
            AgentEvent::SessionEnded {
                session_id: "s10".into(),
                agent: AgentKind::ClaudeCode,
            },
        ];

        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.session_id(), format!("s{}", i + 1));
        }
    }

    #[test]
    fn wire_format_roundtrip() {
        let event = AgentEvent::ToolStarted {
            session_id: "abc123".into(),
            agent: AgentKind::ClaudeCode,
            tool_id: "toolu_01".into(),
            tool_name: "Read".into(),
            tool_label: Some("config.rs".into()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tool_started\""));
        assert!(json.contains("\"session_id\":\"abc123\""));

        let parsed: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn optional_fields_omitted_when_absent() {
        let event = AgentEvent::SessionStarted {
            session_id: "s1".into(),
            agent: AgentKind::Codex,
            cwd: "/tmp".into(),
            name: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("\"name\""));
    }

    #[test]
    fn agent_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&AgentKind::ClaudeCode).unwrap(),
            "\"claude_code\""
        );
        assert_eq!(serde_json::to_string(&AgentKind::Codex).unwrap(), "\"codex\"");
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let json = r#"{"type":"telemetry_blob","session_id":"s1","agent":"codex"}"#;
        assert!(serde_json::from_str::<AgentEvent>(json).is_err());
    }
}
