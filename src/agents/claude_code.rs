//! Claude Code hook adapter
//!
//! Reads one hook JSON payload from stdin, converts it to `AgentEvent`s, and
//! forwards them to the daemon over the Unix socket. Invoked by Claude Code
//! as a short-lived `aura hook --agent claude-code` process.
//!
//! # Claude Code hooks config:
//! ```json
//! { "type": "command", "command": "aura hook --agent claude-code" }
//! ```

use crate::ipc::{self, IpcMessage};
use crate::{AgentEvent, AgentKind};
use serde_json::Value;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::process::ExitCode;
use thiserror::Error;
use tracing::debug;

/// Agent identifier for the `--agent` CLI flag.
#[derive(Debug, Clone, PartialEq, clap::ValueEnum)]
pub enum HookAgent {
    ClaudeCode,
    Codex,
}

/// Why a hook invocation failed hard (anything else is a silent drop).
#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to read stdin: {0}")]
    Stdin(#[from] std::io::Error),
    #[error("invalid hook JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// All Claude Code hook events the daemon consumes.
const CLAUDE_CODE_HOOK_EVENTS: &[&str] = &[
    "SessionStart",
    "UserPromptSubmit",
    "PreToolUse",
    "PostToolUse",
    "PostToolUseFailure",
    "Notification",
    "PermissionRequest",
    "Stop",
    "SubagentStart",
    "SubagentStop",
    "PreCompact",
    "SessionEnd",
];

/// Print a hooks config block for `~/.claude/settings.json`.
pub fn print_install_config() {
    let hook_obj = serde_json::json!({
        "type": "command",
        "command": "aura hook --agent claude-code"
    });

    let mut hooks = serde_json::Map::new();
    for event in CLAUDE_CODE_HOOK_EVENTS {
        hooks.insert(
            event.to_string(),
            serde_json::json!([{ "hooks": [hook_obj] }]),
        );
    }

    let output = serde_json::to_string_pretty(&Value::Object(hooks))
        .expect("static hook config serializes");
    println!("Add the following to your ~/.claude/settings.json under \"hooks\":\n");
    println!("{output}");
}

/// Entry point for `aura hook`.
///
/// Exit codes: non-zero only when stdin is unreadable or not JSON. A missing
/// daemon, unknown hook, or dropped payload all exit 0 so the host agent is
/// never disturbed.
pub fn run(agent: &HookAgent) -> ExitCode {
    if *agent != HookAgent::ClaudeCode {
        eprintln!("hook handler for {agent:?} is not implemented; Codex is watched via rollouts");
        return ExitCode::SUCCESS;
    }

    match run_claude_code() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("aura hook: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_claude_code() -> Result<(), HookError> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let hook: Value = serde_json::from_str(&input)?;

    let Some(events) = convert_hook(&hook) else {
        return Ok(());
    };

    let path = ipc::socket_path();
    let mut stream = match UnixStream::connect(&path) {
        Ok(s) => s,
        Err(e) => {
            // The daemon is optional; the agent must keep working without it.
            eprintln!("daemon not running ({}): {e}", path.display());
            return Ok(());
        }
    };

    for event in events {
        if let Ok(json) = serde_json::to_string(&IpcMessage::Event { event }) {
            let _ = writeln!(stream, "{json}");
        }
    }
    Ok(())
}

/// Convert one Claude Code hook payload into zero or more agent events.
///
/// Hooks deliver JSON on stdin with a `hook_event_name` discriminator.
/// Unknown hook names and payloads without a session_id are dropped.
/// See: https://docs.anthropic.com/en/docs/claude-code/hooks
fn convert_hook(hook: &Value) -> Option<Vec<AgentEvent>> {
    let event_name = hook.get("hook_event_name")?.as_str()?;
    let Some(session_id) = hook.get("session_id").and_then(|v| v.as_str()) else {
        debug!(%event_name, "hook without session_id dropped");
        return None;
    };
    let session_id = session_id.to_string();
    let agent = AgentKind::ClaudeCode;
    let cwd = hook
        .get("cwd")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let events = match event_name {
        "SessionStart" => vec![AgentEvent::SessionStarted {
            session_id,
            agent,
            cwd,
            name: None,
        }],

        "PreToolUse" => {
            let tool_name = hook
                .get("tool_name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let tool_id = hook
                .get("tool_use_id")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let tool_label = extract_tool_label(hook);

            let mut events = vec![AgentEvent::ToolStarted {
                session_id: session_id.clone(),
                agent,
                tool_id,
                tool_name: tool_name.clone(),
                tool_label,
            }];

            // The set-name command still runs (and shows up) as a normal Bash
            // tool; the rename rides along as a second event.
            if tool_name == "Bash"
                && let Some(command) = hook
                    .get("tool_input")
                    .and_then(|input| input.get("command"))
                    .and_then(|v| v.as_str())
                && let Some(name) = super::parse_set_name_command(command)
            {
                events.push(AgentEvent::SessionNameUpdated {
                    session_id,
                    agent,
                    name,
                });
            }

            events
        }

        "PostToolUse" | "PostToolUseFailure" => {
            let tool_id = hook
                .get("tool_use_id")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            vec![AgentEvent::ToolCompleted {
                session_id,
                agent,
                tool_id,
            }]
        }

        "Notification" => {
            let notification_type = hook
                .get("notification_type")
                .and_then(|v| v.as_str())
                .unwrap_or("");

            match notification_type {
                "permission_prompt" => {
                    let message = hook
                        .get("tool_name")
                        .and_then(|v| v.as_str())
                        .map(String::from);
                    vec![AgentEvent::NeedsAttention {
                        session_id,
                        agent,
                        message,
                    }]
                }
                "idle_prompt" => vec![AgentEvent::WaitingForInput { session_id, agent }],
                _ => {
                    let message = hook
                        .get("message")
                        .and_then(|v| v.as_str())
                        .map(String::from);
                    vec![AgentEvent::NeedsAttention {
                        session_id,
                        agent,
                        message,
                    }]
                }
            }
        }

        "PermissionRequest" => {
            let message = hook
                .get("tool_name")
                .and_then(|v| v.as_str())
                .map(String::from);
            vec![AgentEvent::NeedsAttention {
                session_id,
                agent,
                message,
            }]
        }

        "Stop" => vec![AgentEvent::Idle { session_id, agent }],

        "PreCompact" => vec![AgentEvent::Compacting { session_id, agent }],

        "SessionEnd" => vec![AgentEvent::SessionEnded { session_id, agent }],

        "UserPromptSubmit" | "SubagentStart" | "SubagentStop" => {
            vec![AgentEvent::Activity { session_id, agent }]
        }

        _ => return None,
    };

    Some(events)
}

/// Extract a human-readable label for a tool invocation.
///
/// MCP tools get no label here; the view formats them as "server: function".
fn extract_tool_label(hook: &Value) -> Option<String> {
    let tool_name = hook.get("tool_name")?.as_str()?;
    let input = hook.get("tool_input")?;

    let field = |key: &str| input.get(key).and_then(|v| v.as_str()).map(String::from);

    match tool_name {
        "Bash" => field("description").or_else(|| field("command")),
        "Read" | "Write" | "Edit" => input
            .get("file_path")
            .and_then(|v| v.as_str())
            .map(super::short_path),
        "NotebookEdit" => input
            .get("notebook_path")
            .and_then(|v| v.as_str())
            .map(super::short_path),
        "Glob" | "Grep" => field("pattern"),
        "WebFetch" => field("url"),
        "WebSearch" => field("query"),
        "Task" => field("description"),
        "Skill" => field("skill"),
        "AskUserQuestion" => Some("AskUserQuestion".to_string()),
        "EnterPlanMode" => Some("EnterPlanMode".to_string()),
        _ => None,
    }
}
