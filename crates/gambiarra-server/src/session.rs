//! Server-side sessions and the cross-connection session table.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use gambiarra_context::ConversationMemory;
use gambiarra_core::{ExecutionId, RequestId, SessionConfig, SessionId};
use gambiarra_tools::ParsedToolCall;

/// A tool execution dispatched to the client, awaiting its result.
#[derive(Debug, Clone)]
pub struct PendingExecution {
    /// Correlation id.
    pub execution_id: ExecutionId,
    /// Tool name.
    pub tool_name: String,
    /// Flat parameters as dispatched.
    pub parameters: Map<String, Value>,
    /// When the `execute_tool` frame was sent.
    pub started_at: DateTime<Utc>,
}

/// A server-side session, owned by exactly one connection task.
#[derive(Debug)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Configuration from `create_session`.
    pub config: SessionConfig,
    /// Source of truth for model input.
    pub memory: ConversationMemory,
    /// The generated system prompt.
    pub system_prompt: String,
    /// Approvals awaiting a client verdict.
    pub pending_approvals: HashMap<RequestId, ParsedToolCall>,
    /// Executions awaiting a client result.
    pub pending_executions: HashMap<ExecutionId, PendingExecution>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last frame activity.
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Create a session.
    #[must_use]
    pub fn new(config: SessionConfig, system_prompt: String, max_tokens: usize) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            config,
            memory: ConversationMemory::new(max_tokens, gambiarra_context::memory::DEFAULT_WINDOW_RATIO),
            system_prompt,
            pending_approvals: HashMap::new(),
            pending_executions: HashMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Mark frame activity.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Count of assistant messages among the last ten whose content starts
    /// with `Tool result:` - the safety-budget counter for the agentic
    /// loop.
    #[must_use]
    pub fn recent_tool_result_count(&self) -> usize {
        self.memory
            .messages()
            .iter()
            .rev()
            .take(10)
            .filter(|m| {
                m.role == gambiarra_context::MessageRole::Assistant
                    && m.content.starts_with("Tool result:")
            })
            .count()
    }
}

/// Metadata about a live session, for limits and listings.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Workspace the session operates on.
    pub working_directory: String,
}

/// Cross-connection registry of live sessions.
///
/// Sessions themselves are owned by their connection task; the manager
/// only tracks existence for the max-sessions cap and listings.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<SessionId, SessionInfo>,
    max_sessions: usize,
}

impl SessionManager {
    /// Create a manager with a session cap.
    #[must_use]
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_sessions,
        }
    }

    /// Register a session. Fails when the cap is reached.
    ///
    /// # Errors
    ///
    /// Returns the current count when the cap is reached.
    pub fn register(&self, session: &Session) -> Result<(), usize> {
        if self.sessions.len() >= self.max_sessions {
            return Err(self.sessions.len());
        }
        self.sessions.insert(
            session.id.clone(),
            SessionInfo {
                created_at: session.created_at,
                working_directory: session.config.working_directory.display().to_string(),
            },
        );
        info!(session_id = %session.id, active = self.sessions.len(), "session registered");
        Ok(())
    }

    /// Remove a session (channel closed or idle-expired).
    pub fn remove(&self, session_id: &SessionId) {
        if self.sessions.remove(session_id).is_some() {
            debug!(%session_id, "session removed");
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of live session ids.
    #[must_use]
    pub fn list(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}

/// Shared handle used by connection tasks.
pub type SharedSessionManager = Arc<SessionManager>;

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionConfig::new("/tmp/w"), "prompt".into(), 32_000)
    }

    #[test]
    fn test_register_and_cap() {
        let manager = SessionManager::new(2);
        let a = session();
        let b = session();
        let c = session();

        assert!(manager.register(&a).is_ok());
        assert!(manager.register(&b).is_ok());
        assert_eq!(manager.register(&c).unwrap_err(), 2);

        manager.remove(&a.id);
        assert!(manager.register(&c).is_ok());
        assert_eq!(manager.active_count(), 2);
    }

    #[test]
    fn test_safety_budget_counter() {
        let mut s = session();
        s.memory.add_user("go");
        for i in 0..12 {
            s.memory
                .add_assistant(format!("Tool result: Read f{i}.txt (3 chars). Content: abc..."));
        }
        // Only the last 10 messages are inspected
        assert_eq!(s.recent_tool_result_count(), 10);

        let mut s = session();
        s.memory.add_assistant("Tool result: ok");
        s.memory.add_assistant("plain prose");
        assert_eq!(s.recent_tool_result_count(), 1);
    }
}
