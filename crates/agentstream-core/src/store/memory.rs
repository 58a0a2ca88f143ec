//! Long-term memory seam and in-memory implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::store::StoredSession;

/// One ranked memory search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    /// Text recovered from a past conversation
    pub content: String,
    /// Where the text came from (session id, timestamp)
    pub metadata: Value,
    /// Match score in `[0, 1]`
    pub relevance_score: f64,
}

/// Long-term memory seam
///
/// Expired sessions worth keeping are flushed here; `search` is a
/// pass-through for callers that want to query past conversations.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Absorb an ended session into memory
    async fn flush(&self, session: &StoredSession) -> Result<()>;

    /// Search memory for past conversations, best matches first
    async fn search(&self, app_name: &str, user_id: &str, query: &str) -> Result<Vec<MemoryHit>>;
}

/// Process-local memory store with naive keyword ranking
#[derive(Default)]
pub struct InMemoryMemoryStore {
    sessions: RwLock<HashMap<(String, String), Vec<StoredSession>>>,
    flush_count: AtomicUsize,
}

impl InMemoryMemoryStore {
    /// Create an empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flush calls seen so far
    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn flush(&self, session: &StoredSession) -> Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .write()
            .entry((session.app_name.clone(), session.user_id.clone()))
            .or_default()
            .push(session.clone());
        Ok(())
    }

    async fn search(&self, app_name: &str, user_id: &str, query: &str) -> Result<Vec<MemoryHit>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let sessions = self.sessions.read();
        let Some(flushed) = sessions.get(&(app_name.to_string(), user_id.to_string())) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for session in flushed {
            for event in &session.events {
                let Some(content) = event.get("content").and_then(|v| v.as_str()) else {
                    continue;
                };
                if content.is_empty() {
                    continue;
                }
                let haystack = content.to_lowercase();
                let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                if matched == 0 {
                    continue;
                }
                hits.push(MemoryHit {
                    content: content.to_string(),
                    metadata: json!({
                        "session_id": session.id,
                        "timestamp": event.get("timestamp").cloned().unwrap_or(Value::Null),
                    }),
                    relevance_score: matched as f64 / terms.len() as f64,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_events(id: &str, events: Vec<Value>) -> StoredSession {
        StoredSession {
            id: id.to_string(),
            app_name: "app".to_string(),
            user_id: "u1".to_string(),
            state: json!({}),
            events,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_flush_and_search() {
        let store = InMemoryMemoryStore::new();
        store
            .flush(&session_with_events(
                "s1",
                vec![
                    json!({"content": "The capital of France is Paris", "timestamp": 1.0}),
                    json!({"content": "Rust has fearless concurrency", "timestamp": 2.0}),
                ],
            ))
            .await
            .unwrap();

        let hits = store.search("app", "u1", "rust concurrency").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("fearless"));
        assert!((hits[0].relevance_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(hits[0].metadata["session_id"], "s1");
    }

    #[tokio::test]
    async fn test_search_ranks_by_term_coverage() {
        let store = InMemoryMemoryStore::new();
        store
            .flush(&session_with_events(
                "s1",
                vec![
                    json!({"content": "green apples"}),
                    json!({"content": "green apples and oranges"}),
                ],
            ))
            .await
            .unwrap();

        let hits = store.search("app", "u1", "green oranges").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].content.contains("oranges"));
        assert!(hits[0].relevance_score > hits[1].relevance_score);
    }

    #[tokio::test]
    async fn test_search_unknown_user_is_empty() {
        let store = InMemoryMemoryStore::new();
        let hits = store.search("app", "stranger", "anything").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_flush_count() {
        let store = InMemoryMemoryStore::new();
        assert_eq!(store.flush_count(), 0);
        store
            .flush(&session_with_events("s1", vec![]))
            .await
            .unwrap();
        assert_eq!(store.flush_count(), 1);
    }
}
