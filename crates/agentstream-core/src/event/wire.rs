//! Wire events delivered to the stream consumer
//!
//! A wire event is the normalized, classified, deduplicated unit the
//! relay emits. Within one run exactly one `start` comes first and
//! exactly one `complete` (or `error`) comes last.

use serde::{Deserialize, Serialize};

/// Metadata attached to a wire event (kind-specific keys)
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Kind of a wire event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireEventKind {
    Start,
    Content,
    ToolCall,
    ToolResponse,
    Thinking,
    Error,
    Complete,
}

impl WireEventKind {
    /// The wire-protocol string for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Content => "content",
            Self::ToolCall => "tool_call",
            Self::ToolResponse => "tool_response",
            Self::Thinking => "thinking",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }

    /// Whether this kind terminates a run (sub-agent completions,
    /// which carry `is_sub_agent_event` metadata, do not)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// One event on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    /// Event kind
    pub kind: WireEventKind,
    /// Text payload; empty for non-text kinds
    #[serde(default)]
    pub content: String,
    /// Kind-specific metadata (tool_name, chunk_id, is_partial, ...)
    #[serde(default)]
    pub metadata: Metadata,
    /// Session this event belongs to
    pub session_id: String,
    /// Agent that produced the run
    pub agent_id: String,
    /// Seconds since the Unix epoch, fractional
    pub timestamp: f64,
}

/// Current time as fractional epoch seconds
pub(crate) fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

impl WireEvent {
    /// Create an event of the given kind with empty content
    pub fn new(kind: WireEventKind, session_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            kind,
            content: String::new(),
            metadata: Metadata::new(),
            session_id: session_id.into(),
            agent_id: agent_id.into(),
            timestamp: now_timestamp(),
        }
    }

    /// Set the text payload
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Attach one metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Create a run-start event
    pub fn start(session_id: &str, agent_id: &str, user_id: &str) -> Self {
        Self::new(WireEventKind::Start, session_id, agent_id)
            .with_meta("user_id", user_id)
            .with_meta("started_at", chrono::Utc::now().to_rfc3339())
    }

    /// Create a content event
    pub fn content(session_id: &str, agent_id: &str, text: impl Into<String>) -> Self {
        Self::new(WireEventKind::Content, session_id, agent_id).with_content(text)
    }

    /// Create a tool-call event
    pub fn tool_call(session_id: &str, agent_id: &str, tool_name: &str, args: serde_json::Value) -> Self {
        Self::new(WireEventKind::ToolCall, session_id, agent_id)
            .with_content(format!("Calling tool: {}", tool_name))
            .with_meta("tool_name", tool_name)
            .with_meta("tool_args", args)
    }

    /// Create a tool-response event
    pub fn tool_response(session_id: &str, agent_id: &str, tool_name: &str) -> Self {
        Self::new(WireEventKind::ToolResponse, session_id, agent_id)
            .with_content(format!("Tool '{}' completed", tool_name))
            .with_meta("tool_name", tool_name)
    }

    /// Create a thinking event
    pub fn thinking(session_id: &str, agent_id: &str, text: impl Into<String>) -> Self {
        Self::new(WireEventKind::Thinking, session_id, agent_id).with_content(text)
    }

    /// Create a run-error event
    pub fn error(session_id: &str, agent_id: &str, message: impl Into<String>) -> Self {
        Self::new(WireEventKind::Error, session_id, agent_id)
            .with_content(message)
            .with_meta("error_type", "processing_error")
    }

    /// Create a run-complete event
    pub fn complete(session_id: &str, agent_id: &str, total_events: u64, duration_seconds: f64) -> Self {
        Self::new(WireEventKind::Complete, session_id, agent_id)
            .with_meta("total_events", total_events)
            .with_meta("duration_seconds", duration_seconds)
            .with_meta("completed_at", chrono::Utc::now().to_rfc3339())
    }

    /// Create a sub-agent start event (does not open a new run)
    pub fn sub_agent_start(session_id: &str, agent_id: &str, sub_agent: &str) -> Self {
        Self::new(WireEventKind::Start, session_id, agent_id)
            .with_content(format!("Starting sub-agent: {}", sub_agent))
            .with_meta("sub_agent_name", sub_agent)
            .with_meta("is_sub_agent_event", true)
            .with_meta("event_type", "sub_agent_start")
    }

    /// Create a sub-agent complete event (does not close the parent run)
    pub fn sub_agent_complete(session_id: &str, agent_id: &str, sub_agent: &str) -> Self {
        Self::new(WireEventKind::Complete, session_id, agent_id)
            .with_content(format!("Completed sub-agent: {}", sub_agent))
            .with_meta("sub_agent_name", sub_agent)
            .with_meta("is_sub_agent_event", true)
            .with_meta("event_type", "sub_agent_complete")
    }

    /// Whether this is a sub-agent boundary event rather than a
    /// run-level lifecycle event
    pub fn is_sub_agent_event(&self) -> bool {
        self.metadata
            .get("is_sub_agent_event")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}
