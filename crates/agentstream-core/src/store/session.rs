//! Session store seam and in-memory implementation

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A session as persisted by a [`SessionStore`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Opaque session id
    pub id: String,
    /// Application namespace
    pub app_name: String,
    /// Owning user
    pub user_id: String,
    /// Initial/accumulated session state
    pub state: Value,
    /// Recorded run events, in order
    pub events: Vec<Value>,
    /// Creation time
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl StoredSession {
    /// Number of recorded events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Persistence seam for sessions
///
/// Implementations must support concurrent use by independent keys;
/// the lifecycle manager serializes calls for any single key itself.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create and persist a new session
    async fn create(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
        state: Value,
    ) -> Result<StoredSession>;

    /// Fetch a session, or `None` if absent
    async fn get(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<StoredSession>>;

    /// Remove a session
    async fn delete(&self, app_name: &str, user_id: &str, session_id: &str) -> Result<()>;

    /// Record one run event against a session
    async fn append_event(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
        event: Value,
    ) -> Result<()>;
}

type SessionKey = (String, String, String);

/// Process-local session store
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, StoredSession>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn key(app_name: &str, user_id: &str, session_id: &str) -> SessionKey {
        (app_name.to_string(), user_id.to_string(), session_id.to_string())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
        state: Value,
    ) -> Result<StoredSession> {
        let session = StoredSession {
            id: session_id.to_string(),
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            state,
            events: Vec::new(),
            created_at: chrono::Utc::now(),
        };
        self.sessions
            .write()
            .insert(Self::key(app_name, user_id, session_id), session.clone());
        Ok(session)
    }

    async fn get(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<StoredSession>> {
        Ok(self
            .sessions
            .read()
            .get(&Self::key(app_name, user_id, session_id))
            .cloned())
    }

    async fn delete(&self, app_name: &str, user_id: &str, session_id: &str) -> Result<()> {
        self.sessions
            .write()
            .remove(&Self::key(app_name, user_id, session_id));
        Ok(())
    }

    async fn append_event(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
        event: Value,
    ) -> Result<()> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&Self::key(app_name, user_id, session_id))
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        session.events.push(event);
        Ok(())
    }
}
