//! Session lifecycle manager
//!
//! Owns the mapping from (user, agent) to the single live session for
//! that pair: eager reuse within the timeout window, teardown with an
//! optional flush into long-term memory afterwards. Create-or-reuse
//! is serialized per key; unrelated keys proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tracing::{debug, info, warn};

use super::types::{LiveSession, SessionHandle, SessionInfo, SessionKey, SessionStats};
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::store::{MemoryStore, SessionStore};

/// Manages session lifecycle for all (user, agent) pairs
pub struct SessionLifecycleManager {
    config: RelayConfig,
    store: Arc<dyn SessionStore>,
    memory: Arc<dyn MemoryStore>,
    /// Live-session bookkeeping; short non-async critical sections only
    live: RwLock<HashMap<SessionKey, LiveSession>>,
    /// Per-key async locks serializing create-or-reuse and teardown
    locks: Mutex<HashMap<SessionKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLifecycleManager {
    /// Create a manager over the given stores
    pub fn new(config: RelayConfig, store: Arc<dyn SessionStore>, memory: Arc<dyn MemoryStore>) -> Self {
        Self {
            config,
            store,
            memory,
            live: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the live session for a (user, agent) pair
    ///
    /// Reuses the existing session while it is younger than the
    /// configured timeout; otherwise tears the old one down and
    /// creates a fresh session via the store. After using the session
    /// the caller should invoke [`touch`](Self::touch).
    pub async fn resolve(&self, user_id: &str, agent_id: &str) -> Result<SessionHandle> {
        let key = SessionKey::new(user_id, agent_id);
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let expired = {
            let live = self.live.read();
            match live.get(&key) {
                Some(entry) if !self.is_expired(entry) => {
                    debug!(session_id = %entry.session_id, key = %key, "Reusing live session");
                    return Ok(SessionHandle {
                        session_id: entry.session_id.clone(),
                        created_at: entry.created_at,
                        reused: true,
                    });
                }
                Some(entry) => Some(entry.clone()),
                None => None,
            }
        };

        if let Some(entry) = expired {
            info!(session_id = %entry.session_id, key = %key, "Session expired, tearing down");
            self.teardown(&key, &entry).await;
        }

        let now = chrono::Utc::now();
        let session_id = format!("{}_{}_{}", user_id, agent_id, now.timestamp_millis());
        let state = json!({
            "user:agent_preference": agent_id,
            "session_start_time": now.to_rfc3339(),
            "conversation_count": 0,
        });
        self.store
            .create(&self.config.app_name, user_id, &session_id, state)
            .await?;

        self.live.write().insert(
            key.clone(),
            LiveSession {
                session_id: session_id.clone(),
                created_at: now,
                last_activity: now,
                message_count: 0,
            },
        );
        info!(session_id = %session_id, key = %key, "Created new session");

        Ok(SessionHandle {
            session_id,
            created_at: now,
            reused: false,
        })
    }

    /// Record activity on a live session
    pub fn touch(&self, user_id: &str, agent_id: &str) {
        let key = SessionKey::new(user_id, agent_id);
        if let Some(entry) = self.live.write().get_mut(&key) {
            entry.last_activity = chrono::Utc::now();
            entry.message_count += 1;
        }
    }

    /// End the live session for a (user, agent) pair
    ///
    /// Returns the ended session's id, or `SessionNotFound` when the
    /// pair has no live session.
    pub async fn end_session(&self, user_id: &str, agent_id: &str) -> Result<String> {
        let key = SessionKey::new(user_id, agent_id);
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let entry = self
            .live
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))?;

        self.teardown(&key, &entry).await;
        Ok(entry.session_id)
    }

    /// Tear down every expired session; returns how many were removed
    pub async fn sweep_expired(&self) -> usize {
        let expired: Vec<(SessionKey, LiveSession)> = {
            let live = self.live.read();
            live.iter()
                .filter(|(_, entry)| self.is_expired(entry))
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect()
        };

        let mut removed = 0;
        for (key, entry) in expired {
            let lock = self.key_lock(&key);
            let _guard = lock.lock().await;
            // Re-check under the key lock; a racing resolve may have
            // replaced the entry already
            let still_there = self
                .live
                .read()
                .get(&key)
                .map(|e| e.session_id == entry.session_id)
                .unwrap_or(false);
            if still_there {
                self.teardown(&key, &entry).await;
                removed += 1;
            }
        }
        removed
    }

    /// Active sessions for a user, keyed by agent id
    pub fn user_sessions(&self, user_id: &str) -> HashMap<String, SessionInfo> {
        self.live
            .read()
            .iter()
            .filter(|(key, _)| key.user_id == user_id)
            .map(|(key, entry)| (key.agent_id.clone(), entry.info()))
            .collect()
    }

    /// Aggregate statistics over all live sessions
    pub fn stats(&self) -> SessionStats {
        let live = self.live.read();
        SessionStats {
            total_users: live
                .keys()
                .map(|k| k.user_id.as_str())
                .collect::<std::collections::HashSet<_>>()
                .len(),
            total_active_sessions: live.len(),
            total_messages: live.values().map(|e| e.message_count).sum(),
            session_timeout_secs: self.config.session_timeout.as_secs(),
        }
    }

    /// Number of live sessions
    pub fn live_count(&self) -> usize {
        self.live.read().len()
    }

    /// Flush-then-delete an ended session
    ///
    /// Store and memory failures are logged, never propagated: the
    /// bookkeeping entry is removed regardless so a broken backend
    /// cannot leak live-session slots.
    async fn teardown(&self, key: &SessionKey, entry: &LiveSession) {
        match self
            .store
            .get(&self.config.app_name, &key.user_id, &entry.session_id)
            .await
        {
            Ok(Some(stored)) => {
                if stored.event_count() > self.config.memory_threshold_events {
                    match self.memory.flush(&stored).await {
                        Ok(()) => {
                            info!(session_id = %entry.session_id, events = stored.event_count(), "Flushed session to memory")
                        }
                        Err(e) => {
                            warn!(session_id = %entry.session_id, "Memory flush failed: {}", e)
                        }
                    }
                }
            }
            Ok(None) => {
                debug!(session_id = %entry.session_id, "Session already gone from store")
            }
            Err(e) => warn!(session_id = %entry.session_id, "Failed to fetch session for teardown: {}", e),
        }

        if let Err(e) = self
            .store
            .delete(&self.config.app_name, &key.user_id, &entry.session_id)
            .await
        {
            warn!(session_id = %entry.session_id, "Failed to delete session: {}", e);
        }

        self.live.write().remove(key);
    }

    fn is_expired(&self, entry: &LiveSession) -> bool {
        chrono::Utc::now()
            .signed_duration_since(entry.created_at)
            .to_std()
            .map(|age| age >= self.config.session_timeout)
            .unwrap_or(false)
    }

    fn key_lock(&self, key: &SessionKey) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(key.clone())
            .or_default()
            .clone()
    }
}
