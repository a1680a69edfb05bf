//! Session state and snapshot types shared between the registry and the UI.

use crate::AgentKind;
use serde::{Deserialize, Serialize};

/// A currently running tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningTool {
    pub tool_id: String,
    pub tool_name: String,
    pub tool_label: Option<String>,
}

/// Session state in the HUD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Actively working
    #[default]
    Running,
    /// Agent finished, waiting for user
    Idle,
    /// Needs user attention (permission, etc.)
    Attention,
    /// Waiting for user input (idle_prompt)
    Waiting,
    /// Context window compacting
    Compacting,
    /// No activity for 10min+ while not running
    Stale,
}

/// Point-in-time copy of a session, handed to the renderer each frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub agent: AgentKind,
    pub cwd: String,
    pub state: SessionState,
    pub running_tools: Vec<RunningTool>,
    /// Custom session name (if set by user)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unix timestamp when the session went idle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<u64>,
    /// Unix timestamp when the session went stale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_at: Option<u64>,
    /// Tool requesting permission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_tool: Option<String>,
    /// Labels of recently completed tools (most recent last)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_activity: Vec<String>,
}

/// Placeholder texts displayed while the agent is working without a tool
pub const PLACEHOLDER_TEXTS: &[&str] = &[
    "thinking...",
    "drafting...",
    "building...",
    "planning...",
    "analyzing...",
    "pondering...",
    "processing...",
    "reasoning...",
];
