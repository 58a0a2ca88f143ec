//! Session lifecycle types

use serde::{Deserialize, Serialize};

/// Key identifying the one live session a user may have per agent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub agent_id: String,
}

impl SessionKey {
    /// Build a key from its parts
    pub fn new(user_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            agent_id: agent_id.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user_id, self.agent_id)
    }
}

/// What a resolution request hands back to the caller
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Id of the live session for this (user, agent) pair
    pub session_id: String,
    /// When the session was created
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Whether an existing session was reused rather than created
    pub reused: bool,
}

/// Snapshot of one live session's bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_activity: chrono::DateTime<chrono::Utc>,
    pub message_count: u64,
}

/// Aggregate statistics over all live sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_users: usize,
    pub total_active_sessions: usize,
    pub total_messages: u64,
    pub session_timeout_secs: u64,
}

/// Internal bookkeeping entry for one live session
#[derive(Debug, Clone)]
pub(crate) struct LiveSession {
    pub session_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_activity: chrono::DateTime<chrono::Utc>,
    pub message_count: u64,
}

impl LiveSession {
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            message_count: self.message_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality() {
        let a = SessionKey::new("u1", "agent");
        let b = SessionKey::new("u1", "agent");
        let c = SessionKey::new("u2", "agent");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "u1/agent");
    }
}
