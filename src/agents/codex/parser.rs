//! Rollout line parser: one JSONL line in, zero or more `AgentEvent`s out.
//!
//! Rollouts mix several line shapes (`session_meta`, `response_item`,
//! `event_msg`, plus bare response items in older files). The parser keeps a
//! tiny per-file state: the session identity and whether a session/name event
//! was already emitted.

use crate::{AgentEvent, AgentKind, agents};
use serde_json::Value;
use tracing::warn;

fn string_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn first_shell_token(command: &str) -> Option<String> {
    command.split_whitespace().next().map(ToString::to_string)
}

/// Best-effort tool label from decoded `arguments` JSON.
fn label_from_args(args: &Value) -> Option<String> {
    if let Some(path) = string_field(args, &["path", "file_path", "filePath"]) {
        Some(agents::short_path(path))
    } else {
        string_field(args, &["cmd", "command", "query", "q"])
            .map(|v| agents::truncate(v, 60).to_string())
    }
}

fn decode_args(payload: &Value) -> Option<Value> {
    serde_json::from_str(payload.get("arguments")?.as_str()?).ok()
}

#[derive(Debug, Clone)]
pub(super) struct RolloutState {
    pub(super) session_id: String,
    pub(super) cwd: String,
    pub(super) session_emitted: bool,
    /// A name was emitted (set-name or turn preview); previews stop applying.
    pub(super) name_seen: bool,
    web_search_seq: u64,
}

impl RolloutState {
    pub(super) fn new(session_id: String, cwd: String) -> Self {
        Self {
            session_id,
            cwd,
            session_emitted: false,
            name_seen: false,
            web_search_seq: 0,
        }
    }

    // -- event constructors, all keyed to this rollout's session --

    fn session_started(&self) -> AgentEvent {
        AgentEvent::SessionStarted {
            session_id: self.session_id.clone(),
            agent: AgentKind::Codex,
            cwd: self.cwd.clone(),
            name: None,
        }
    }

    fn activity(&self) -> AgentEvent {
        AgentEvent::Activity {
            session_id: self.session_id.clone(),
            agent: AgentKind::Codex,
        }
    }

    fn idle(&self) -> AgentEvent {
        AgentEvent::Idle {
            session_id: self.session_id.clone(),
            agent: AgentKind::Codex,
        }
    }

    fn compacting(&self) -> AgentEvent {
        AgentEvent::Compacting {
            session_id: self.session_id.clone(),
            agent: AgentKind::Codex,
        }
    }

    fn waiting_for_input(&self) -> AgentEvent {
        AgentEvent::WaitingForInput {
            session_id: self.session_id.clone(),
            agent: AgentKind::Codex,
        }
    }

    fn tool_started(&self, tool_id: &str, tool_name: String, tool_label: Option<String>) -> AgentEvent {
        AgentEvent::ToolStarted {
            session_id: self.session_id.clone(),
            agent: AgentKind::Codex,
            tool_id: tool_id.to_string(),
            tool_name,
            tool_label,
        }
    }

    fn tool_completed(&self, tool_id: &str) -> AgentEvent {
        AgentEvent::ToolCompleted {
            session_id: self.session_id.clone(),
            agent: AgentKind::Codex,
            tool_id: tool_id.to_string(),
        }
    }

    fn name_updated(&mut self, name: String) -> AgentEvent {
        self.name_seen = true;
        AgentEvent::SessionNameUpdated {
            session_id: self.session_id.clone(),
            agent: AgentKind::Codex,
            name,
        }
    }

    pub(super) fn ensure_session_event(&mut self) -> Option<AgentEvent> {
        if self.session_emitted {
            return None;
        }
        self.session_emitted = true;
        Some(self.session_started())
    }

    /// Adopt a new cwd; re-announces the session when it was already emitted.
    fn adopt_cwd(&mut self, next_cwd: &str, events: &mut Vec<AgentEvent>) {
        let next_cwd = next_cwd.trim();
        if next_cwd.is_empty() || next_cwd == self.cwd {
            return;
        }
        self.cwd = next_cwd.to_string();
        if self.session_emitted {
            events.push(self.session_started());
        }
    }

    pub(super) fn apply_line(&mut self, value: &Value) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        let line_type = value.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let timestamp = string_field(value, &["timestamp"]);

        match line_type {
            "session_meta" => {
                if let Some(payload) = value.get("payload").and_then(|v| v.as_object()) {
                    if let Some(id) = payload.get("id").and_then(|v| v.as_str()) {
                        if !self.session_emitted {
                            self.session_id = id.to_string();
                        } else if self.session_id != id {
                            warn!(
                                current = %self.session_id,
                                meta = %id,
                                "rollout session id changed after emission; ignoring"
                            );
                        }
                    }
                    if let Some(cwd) = payload.get("cwd").and_then(|v| v.as_str()) {
                        self.adopt_cwd(cwd, &mut events);
                    }
                }
                events.extend(self.ensure_session_event());
                return events;
            }
            "turn_context" => {
                if let Some(cwd) = value
                    .get("payload")
                    .and_then(|p| p.get("cwd"))
                    .and_then(|v| v.as_str())
                {
                    self.adopt_cwd(cwd, &mut events);
                }
                return events;
            }
            _ => {}
        }

        events.extend(self.ensure_session_event());

        match line_type {
            "event_msg" => {
                let payload = value.get("payload").unwrap_or(&Value::Null);
                let msg_type = payload.get("type").and_then(|v| v.as_str()).unwrap_or("");
                match msg_type {
                    "turn_started" => {
                        if !self.name_seen
                            && let Some(preview) = string_field(payload, &["preview"])
                        {
                            let name = agents::truncate(preview, 60).to_string();
                            let event = self.name_updated(name);
                            events.push(event);
                        }
                        events.push(self.activity());
                    }
                    "task_started" | "user_message" | "agent_message"
                    | "entered_review_mode" | "exited_review_mode" => {
                        events.push(self.activity());
                    }
                    "context_compacted" => events.push(self.compacting()),
                    "task_complete" | "turn_aborted" => events.push(self.idle()),
                    "request_user_input" => events.push(self.waiting_for_input()),
                    // High-frequency lines (token_count, agent_reasoning, ...)
                    // carry nothing the HUD shows.
                    _ => {}
                }
            }
            "compacted" => events.push(self.compacting()),
            "response_item" => {
                let payload = value.get("payload").unwrap_or(&Value::Null);
                self.apply_response_item(payload, timestamp, &mut events);
            }
            // Older rollouts emit response item variants without a `payload` wrapper.
            "function_call" | "function_call_output" | "custom_tool_call"
            | "custom_tool_call_output" | "message" | "reasoning" | "web_search_call" => {
                self.apply_response_item(value, timestamp, &mut events);
            }
            _ => {}
        }

        events
    }

    fn apply_response_item(
        &mut self,
        payload: &Value,
        timestamp: Option<&str>,
        events: &mut Vec<AgentEvent>,
    ) {
        let call_id = || string_field(payload, &["call_id", "callId"]).unwrap_or("unknown");

        match payload.get("type").and_then(|v| v.as_str()).unwrap_or("") {
            "function_call" => {
                let raw_name = string_field(payload, &["name"]).unwrap_or("tool");
                let args = decode_args(payload);

                if raw_name == "exec_command" {
                    let cmd = args
                        .as_ref()
                        .and_then(|v| string_field(v, &["cmd", "command"]))
                        .unwrap_or("");
                    let tool_name = first_shell_token(cmd).unwrap_or_else(|| "exec".to_string());
                    let label = (!cmd.is_empty()).then(|| agents::truncate(cmd, 60).to_string());
                    events.push(self.tool_started(call_id(), tool_name, label));

                    if let Some(name) = agents::parse_set_name_command(cmd) {
                        let event = self.name_updated(name);
                        events.push(event);
                    }
                } else {
                    let label = args.as_ref().and_then(label_from_args);
                    events.push(self.tool_started(call_id(), raw_name.to_string(), label));
                }
            }
            "function_call_output" | "custom_tool_call_output" => {
                events.push(self.tool_completed(call_id()));
            }
            "custom_tool_call" => {
                let tool_name = string_field(payload, &["name"]).unwrap_or("custom_tool");
                events.push(self.tool_started(call_id(), tool_name.to_string(), None));
            }
            "web_search_call" => {
                // Already completed when logged; surface it as a brief
                // start+complete pair so it shows up as recent activity.
                let tool_id = match timestamp {
                    Some(t) => format!("web_search:{t}"),
                    None => {
                        self.web_search_seq += 1;
                        format!("web_search:seq:{}", self.web_search_seq)
                    }
                };
                let query = payload
                    .get("action")
                    .and_then(|v| v.get("query"))
                    .and_then(|v| v.as_str())
                    .map(|q| agents::truncate(q, 60).to_string());

                events.push(self.tool_started(&tool_id, "WebSearch".to_string(), query));
                events.push(self.tool_completed(&tool_id));
            }
            "message" | "reasoning" => events.push(self.activity()),
            _ => {}
        }
    }
}
