//! SSE frame encoding
//!
//! One wire event becomes one `data: <json>\n\n` frame. The payload
//! shape is fixed by the wire protocol: `type`, `content`, `metadata`
//! and `timestamp`, in that order, with the session and agent ids
//! folded into metadata.

use serde::Serialize;

use agentstream_core::{Metadata, WireEvent};

use crate::error::Result;

/// Stream-termination sentinel, always the last frame of a response
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// JSON payload of one SSE data frame
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    /// Wire event kind string (`start`, `content`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub metadata: Metadata,
    pub timestamp: f64,
}

impl Frame {
    /// Project a wire event into its frame payload
    pub fn from_event(event: &WireEvent) -> Self {
        let mut metadata = event.metadata.clone();
        metadata.insert("session_id".to_string(), event.session_id.clone().into());
        metadata.insert("agent_id".to_string(), event.agent_id.clone().into());
        Self {
            kind: event.kind.as_str().to_string(),
            content: event.content.clone(),
            metadata,
            timestamp: event.timestamp,
        }
    }
}

/// Encode one wire event as a complete SSE frame
pub fn format_frame(event: &WireEvent) -> Result<String> {
    let payload = serde_json::to_string(&Frame::from_event(event))?;
    Ok(format!("data: {}\n\n", payload))
}
