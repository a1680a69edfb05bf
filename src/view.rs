//! Pure projection functions from registry snapshots to UI-ready values.
//!
//! Nothing here touches the registry or the clock directly; callers pass a
//! snapshot and (where cycling is involved) the current wall-clock millis.
//! The renderer decides pixels, these functions decide content.

use crate::{PLACEHOLDER_TEXTS, RunningTool, SessionInfo, SessionState};
use chrono::{DateTime, Local, Utc};

/// Period of the running-tool ticker.
pub const TOOL_CYCLE_MS: u64 = 2000;

/// Aggregate state for the small draggable indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    /// No sessions tracked
    Idle,
    /// Any session needs a permission decision
    Attention,
    /// Any session waits for user input
    Waiting,
    /// Everything else
    Running,
}

/// Determine the indicator state from a snapshot.
pub fn indicator_state(sessions: &[SessionInfo]) -> IndicatorState {
    if sessions.is_empty() {
        IndicatorState::Idle
    } else if sessions.iter().any(|s| s.state == SessionState::Attention) {
        IndicatorState::Attention
    } else if sessions.iter().any(|s| s.state == SessionState::Waiting) {
        IndicatorState::Waiting
    } else {
        IndicatorState::Running
    }
}

/// Aggregate state for the notch-flanking indicator variant (priority order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateState {
    /// At least one session is running
    Running,
    /// Any session is compacting (and none running)
    Compacting,
    /// All remaining sessions are idle
    #[default]
    Idle,
    /// Only stale sessions left
    Stale,
}

/// Notch-flanking HUD state derived from all sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotchState {
    /// Whether to show the icons at all (false if no sessions)
    pub visible: bool,
    /// Whether any session needs attention
    pub has_attention: bool,
    /// Highest-priority aggregate state
    pub aggregate: AggregateState,
}

/// Compute the notch HUD state from a snapshot.
pub fn notch_state(sessions: &[SessionInfo]) -> NotchState {
    if sessions.is_empty() {
        return NotchState::default();
    }

    let aggregate = if sessions.iter().any(|s| s.state == SessionState::Running) {
        AggregateState::Running
    } else if sessions.iter().any(|s| s.state == SessionState::Compacting) {
        AggregateState::Compacting
    } else if sessions
        .iter()
        .any(|s| s.state != SessionState::Stale)
    {
        AggregateState::Idle
    } else {
        AggregateState::Stale
    };

    NotchState {
        visible: true,
        has_attention: sessions.iter().any(|s| s.state == SessionState::Attention),
        aggregate,
    }
}

/// Row title: custom name, else the last path segment of cwd.
pub fn session_title(session: &SessionInfo) -> String {
    if let Some(name) = &session.name {
        return name.clone();
    }
    std::path::Path::new(&session.cwd)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string()
}

/// Format a Unix timestamp as "Jan 17, 14:30" in local time.
pub fn format_timestamp(unix_ts: u64) -> String {
    let datetime = DateTime::<Utc>::from_timestamp(unix_ts as i64, 0).unwrap_or_else(Utc::now);
    let local: DateTime<Local> = datetime.into();
    local.format("%b %d, %H:%M").to_string()
}

/// Stable placeholder for a Running session without tools.
///
/// Hashes the session_id into the placeholder table so the choice never
/// flickers during the life of the process.
pub fn stable_placeholder(session_id: &str) -> &'static str {
    let hash = session_id
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    PLACEHOLDER_TEXTS[hash % PLACEHOLDER_TEXTS.len()]
}

/// Ticker index into a list of `len` items at wall-clock `now_ms`.
pub fn tool_index(now_ms: u64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    ((now_ms / TOOL_CYCLE_MS) % len as u64) as usize
}

/// Clamp an index held across a list contraction.
pub fn clamp_tool_index(index: usize, len: usize) -> usize {
    if len == 0 { 0 } else { index.min(len - 1) }
}

/// The tool to display at `now_ms`, if any are running.
pub fn current_tool(session: &SessionInfo, now_ms: u64) -> Option<&RunningTool> {
    let tools = &session.running_tools;
    tools.get(tool_index(now_ms, tools.len()))
}

/// Display text for a tool, handling MCP server prefixes.
///
/// `mcp__server__function` renders as "server: label" (falling back to the
/// function name when no label was extracted).
pub fn tool_display_text(tool_name: &str, tool_label: Option<&str>) -> String {
    if tool_name.starts_with("mcp__") {
        let parts: Vec<&str> = tool_name.split("__").collect();
        if parts.len() >= 3 {
            let server = parts[1];
            let label = tool_label.unwrap_or(parts[2]);
            return format!("{server}: {label}");
        }
        return tool_label.unwrap_or(tool_name).to_string();
    }
    if tool_name == "WebFetch" && tool_label.is_none() {
        return "fetching...".to_string();
    }
    tool_label.unwrap_or(tool_name).to_string()
}

/// Row subtitle content, deterministic per state.
pub fn row_subtitle(session: &SessionInfo, now_ms: u64) -> String {
    match session.state {
        SessionState::Idle => match session.stopped_at {
            Some(ts) => format!("waiting since {}", format_timestamp(ts)),
            None => "waiting...".to_string(),
        },
        SessionState::Stale => match session.stale_at {
            Some(ts) => format!("inactive since {}", format_timestamp(ts)),
            None => "inactive".to_string(),
        },
        SessionState::Attention => {
            let tool = session.permission_tool.as_deref().unwrap_or("Tool");
            format!("{tool} needs permission")
        }
        SessionState::Waiting => "waiting for input".to_string(),
        SessionState::Compacting => "compacting context...".to_string(),
        SessionState::Running => match current_tool(session, now_ms) {
            Some(tool) => tool_display_text(&tool.tool_name, tool.tool_label.as_deref()),
            None => stable_placeholder(&session.session_id).to_string(),
        },
    }
}

/// Rotate through recently completed tool labels while no tool is running.
pub fn recent_activity_text(session: &SessionInfo, now_ms: u64) -> Option<String> {
    if !session.running_tools.is_empty() || session.recent_activity.is_empty() {
        return None;
    }
    let idx = tool_index(now_ms, session.recent_activity.len());
    session.recent_activity.get(idx).cloned()
}
