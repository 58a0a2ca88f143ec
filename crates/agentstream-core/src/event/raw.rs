//! Raw run events as produced by an upstream agent run
//!
//! The upstream feed is heterogeneous: a single event may carry text
//! fragments, tool invocations, tool results, free-standing thinking
//! text, or a sub-agent boundary marker, in any combination. Instead
//! of probing attributes at runtime, every optional facet is an
//! explicit field the classifier can match on.

use serde::{Deserialize, Serialize};

/// Marker for a nested agent beginning or ending inside a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SubAgentBoundary {
    /// A nested agent started producing events
    Started { name: String },
    /// A nested agent finished; the parent run continues
    Completed { name: String },
}

impl SubAgentBoundary {
    /// Name of the sub-agent this boundary refers to
    pub fn agent_name(&self) -> &str {
        match self {
            Self::Started { name } | Self::Completed { name } => name,
        }
    }
}

/// One typed part of a raw run event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawPart {
    /// Plain text fragment (incremental delta or cumulative snapshot)
    Text { text: String },
    /// A function/tool invocation request
    ToolCall {
        name: String,
        #[serde(default)]
        args: serde_json::Value,
        #[serde(default)]
        call_id: Option<String>,
    },
    /// A function/tool result
    ToolResult {
        name: String,
        #[serde(default)]
        response: serde_json::Value,
        #[serde(default)]
        response_id: Option<String>,
    },
}

/// One raw event pulled from a [`RunEventSource`](crate::relay::RunEventSource)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRunEvent {
    /// Agent that authored this event, when the run involves sub-agents
    #[serde(default)]
    pub author: Option<String>,
    /// `Some(true)` for incremental streaming deltas; `Some(false)` or
    /// `None` for cumulative or unmarked emissions
    #[serde(default)]
    pub partial: Option<bool>,
    /// Whether the source marked this as the terminal response snapshot
    #[serde(default)]
    pub final_response: bool,
    /// Sub-agent start/complete marker, if any
    #[serde(default)]
    pub boundary: Option<SubAgentBoundary>,
    /// Free-standing reasoning text, if any
    #[serde(default)]
    pub thinking: Option<String>,
    /// Content parts, in source order
    #[serde(default)]
    pub parts: Vec<RawPart>,
}

impl RawRunEvent {
    /// An event carrying a single incremental text delta
    pub fn text_delta(text: impl Into<String>) -> Self {
        Self {
            partial: Some(true),
            parts: vec![RawPart::Text { text: text.into() }],
            ..Default::default()
        }
    }

    /// An event carrying the terminal cumulative response snapshot
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            partial: Some(false),
            final_response: true,
            parts: vec![RawPart::Text { text: text.into() }],
            ..Default::default()
        }
    }

    /// An event carrying a single tool invocation
    pub fn tool_call(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            parts: vec![RawPart::ToolCall {
                name: name.into(),
                args,
                call_id: None,
            }],
            ..Default::default()
        }
    }

    /// An event carrying a single tool result
    pub fn tool_result(name: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            parts: vec![RawPart::ToolResult {
                name: name.into(),
                response,
                response_id: None,
            }],
            ..Default::default()
        }
    }

    /// An event carrying only a sub-agent boundary marker
    pub fn sub_agent(boundary: SubAgentBoundary) -> Self {
        Self {
            boundary: Some(boundary),
            ..Default::default()
        }
    }

    /// An event carrying only free-standing thinking text
    pub fn thinking(text: impl Into<String>) -> Self {
        Self {
            thinking: Some(text.into()),
            ..Default::default()
        }
    }

    /// Attribute the event to a named (sub-)agent
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}
