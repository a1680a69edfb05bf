//! Session registry - the authoritative state machine over sessions.
//!
//! All mutation goes through [`SessionRegistry::apply`] (and
//! [`SessionRegistry::remove`]), which serialize on an internal lock. The
//! render loop takes point-in-time snapshots via
//! [`SessionRegistry::snapshot`].
//!
//! The registry also owns the per-session stale timers: after every event the
//! session's pending timer is cancelled and re-armed unless the session is
//! Running (running sessions never go stale) or already Stale.

use crate::{AgentEvent, AgentKind, RunningTool, SessionInfo, SessionState};
use std::collections::{HashMap, VecDeque, hash_map::Entry};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Mark a session stale after this long without events (unless Running).
pub const STALE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Maximum number of recent activity labels to keep per session
const RECENT_ACTIVITY_MAX: usize = 6;

fn unix_timestamp(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Session data tracked by the daemon
#[derive(Debug)]
struct Session {
    session_id: String,
    agent: AgentKind,
    cwd: String,
    state: SessionState,
    running_tools: Vec<RunningTool>,
    recent_activity: VecDeque<String>,
    /// Custom session name (if set by user via `aura set-name`)
    name: Option<String>,
    /// When the session went idle
    stopped_at: Option<SystemTime>,
    /// When the session went stale
    stale_at: Option<SystemTime>,
    /// Tool requesting permission (from NeedsAttention message)
    permission_tool: Option<String>,
    /// Instant of the most recent event for this session
    last_event_at: Instant,
}

impl Session {
    fn new(session_id: String, agent: AgentKind, cwd: String, name: Option<String>) -> Self {
        Self {
            session_id,
            agent,
            cwd,
            state: SessionState::Running,
            running_tools: Vec::new(),
            recent_activity: VecDeque::new(),
            name,
            stopped_at: None,
            stale_at: None,
            permission_tool: None,
            last_event_at: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_event_at = Instant::now();
    }

    /// Move to `next`, maintaining the timestamp and permission bookkeeping
    /// tied to entering and leaving each state.
    fn enter(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        match self.state {
            SessionState::Idle => self.stopped_at = None,
            SessionState::Stale => self.stale_at = None,
            SessionState::Attention => self.permission_tool = None,
            _ => {}
        }
        self.state = next;
        match next {
            SessionState::Idle => {
                self.running_tools.clear();
                self.stopped_at = Some(SystemTime::now());
            }
            SessionState::Stale => self.stale_at = Some(SystemTime::now()),
            _ => {}
        }
    }

    /// Insert a tool, deduplicating by `tool_id`; insertion order is kept.
    fn add_tool(&mut self, tool: RunningTool) {
        if self.running_tools.iter().any(|t| t.tool_id == tool.tool_id) {
            trace!(tool_id = %tool.tool_id, "duplicate tool_id ignored");
            return;
        }
        self.running_tools.push(tool);
    }

    /// Remove a tool by id. Unknown ids are a no-op; neither case changes state.
    fn complete_tool(&mut self, tool_id: &str) {
        if let Some(pos) = self.running_tools.iter().position(|t| t.tool_id == tool_id) {
            let tool = self.running_tools.remove(pos);
            if let Some(label) = tool.tool_label {
                self.push_recent_activity(label);
            }
        }
    }

    fn push_recent_activity(&mut self, label: String) {
        if label.is_empty() || self.recent_activity.back() == Some(&label) {
            return;
        }
        self.recent_activity.push_back(label);
        while self.recent_activity.len() > RECENT_ACTIVITY_MAX {
            self.recent_activity.pop_front();
        }
    }

    fn to_info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            agent: self.agent,
            cwd: self.cwd.clone(),
            state: self.state,
            running_tools: self.running_tools.clone(),
            name: self.name.clone(),
            stopped_at: self.stopped_at.map(unix_timestamp),
            stale_at: self.stale_at.map(unix_timestamp),
            permission_tool: self.permission_tool.clone(),
            recent_activity: self.recent_activity.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    sessions: HashMap<String, Session>,
    timers: HashMap<String, JoinHandle<()>>,
}

impl RegistryInner {
    fn with_session<F>(&mut self, session_id: &str, f: F)
    where
        F: FnOnce(&mut Session),
    {
        match self.sessions.get_mut(session_id) {
            Some(session) => {
                session.touch();
                f(session);
            }
            // Sessions are created by adapters via SessionStarted only (never
            // fabricated here), so anything else for an unknown id is dropped.
            None => trace!(%session_id, "event for unknown session dropped"),
        }
    }

    fn apply_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::SessionStarted {
                session_id,
                agent,
                cwd,
                name,
            } => match self.sessions.entry(session_id) {
                Entry::Occupied(mut entry) => {
                    let session = entry.get_mut();
                    trace!(session_id = %session.session_id, "session re-announced");
                    session.enter(SessionState::Running);
                    session.running_tools.clear();
                    session.agent = agent;
                    if !cwd.is_empty() {
                        session.cwd = cwd;
                    }
                    if name.is_some() {
                        session.name = name;
                    }
                    session.touch();
                }
                Entry::Vacant(entry) => {
                    info!(session_id = %entry.key(), %cwd, ?agent, "session started");
                    let id = entry.key().clone();
                    entry.insert(Session::new(id, agent, cwd, name));
                    debug!("{} total session(s)", self.sessions.len());
                }
            },

            AgentEvent::ToolStarted {
                session_id,
                tool_id,
                tool_name,
                tool_label,
                ..
            } => {
                debug!(%session_id, %tool_name, "tool started");
                self.with_session(&session_id, |session| {
                    session.enter(SessionState::Running);
                    session.add_tool(RunningTool {
                        tool_id,
                        tool_name,
                        tool_label,
                    });
                });
            }

            AgentEvent::ToolCompleted {
                session_id,
                tool_id,
                ..
            } => {
                debug!(%session_id, %tool_id, "tool completed");
                self.with_session(&session_id, |session| {
                    session.complete_tool(&tool_id);
                });
            }

            AgentEvent::Activity { session_id, .. } => {
                trace!(%session_id, "activity");
                self.with_session(&session_id, |session| {
                    session.enter(SessionState::Running);
                });
            }

            AgentEvent::Idle { session_id, .. } => {
                debug!(%session_id, "idle");
                self.with_session(&session_id, |session| {
                    session.enter(SessionState::Idle);
                });
            }

            AgentEvent::NeedsAttention {
                session_id,
                message,
                ..
            } => {
                info!(%session_id, "needs attention");
                self.with_session(&session_id, |session| {
                    session.enter(SessionState::Attention);
                    session.permission_tool = message;
                });
            }

            AgentEvent::WaitingForInput { session_id, .. } => {
                info!(%session_id, "waiting for input");
                self.with_session(&session_id, |session| {
                    session.enter(SessionState::Waiting);
                });
            }

            AgentEvent::Compacting { session_id, .. } => {
                info!(%session_id, "compacting");
                self.with_session(&session_id, |session| {
                    session.enter(SessionState::Compacting);
                });
            }

            AgentEvent::SessionNameUpdated {
                session_id, name, ..
            } => {
                info!(%session_id, %name, "session name updated");
                self.with_session(&session_id, |session| {
                    session.name = Some(name);
                });
            }

            AgentEvent::SessionEnded { session_id, .. } => {
                if self.sessions.remove(&session_id).is_some() {
                    info!(%session_id, "session ended");
                    debug!("{} total session(s)", self.sessions.len());
                } else {
                    trace!(%session_id, "end for unknown session dropped");
                }
            }
        }
    }
}

/// Shared handle to the registry. Cheap to clone; all clones see the same
/// sessions.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    stale_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// New empty registry with the standard stale timeout.
    pub fn new() -> Self {
        Self::with_stale_timeout(STALE_TIMEOUT)
    }

    /// New empty registry with a custom stale timeout (tests).
    pub fn with_stale_timeout(stale_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            stale_timeout,
        }
    }

    /// Apply an event and re-arm the session's stale timer.
    pub fn apply(&self, event: AgentEvent) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let session_id = event.session_id().to_string();
        inner.apply_event(event);
        self.rearm_stale_timer(&mut inner, &session_id);
    }

    /// Cancel the session's pending timer, then re-arm unless the session is
    /// gone, Running, or already Stale.
    fn rearm_stale_timer(&self, inner: &mut RegistryInner, session_id: &str) {
        if let Some(task) = inner.timers.remove(session_id) {
            task.abort();
        }

        let Some(session) = inner.sessions.get(session_id) else {
            return;
        };
        if session.state == SessionState::Running || session.state == SessionState::Stale {
            return;
        }

        // Timers need the async runtime. Without one (sync unit tests), stale
        // detection is simply off.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            trace!(%session_id, "no async runtime, stale timer not armed");
            return;
        };

        let armed_at = session.last_event_at;
        let timeout = self.stale_timeout;
        let registry = self.clone();
        let id = session_id.to_string();
        let task = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            registry.fire_stale(&id, armed_at);
        });
        inner.timers.insert(session_id.to_string(), task);
    }

    /// Timer body: transition to Stale unless an event superseded the arming.
    fn fire_stale(&self, session_id: &str, armed_at: Instant) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.timers.remove(session_id);

        let Some(session) = inner.sessions.get_mut(session_id) else {
            return;
        };
        if session.last_event_at > armed_at
            || session.state == SessionState::Running
            || session.state == SessionState::Stale
        {
            return;
        }
        info!(%session_id, "session went stale");
        session.enter(SessionState::Stale);
    }

    /// Remove a session regardless of state (the session list's remove button).
    pub fn remove(&self, session_id: &str) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if let Some(task) = inner.timers.remove(session_id) {
            task.abort();
        }
        if inner.sessions.remove(session_id).is_some() {
            info!(%session_id, "session removed");
        }
    }

    /// Snapshot every session for rendering.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        match self.inner.lock() {
            Ok(inner) => inner.sessions.values().map(Session::to_info).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.sessions.len()).unwrap_or(0)
    }

    /// True when no sessions are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
