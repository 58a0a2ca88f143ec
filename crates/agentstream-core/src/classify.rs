//! Event classifier
//!
//! Inspects one raw run event and produces zero or more wire events.
//! A single raw event may carry several parts; each part becomes its
//! own candidate. Malformed parts are logged and skipped so one bad
//! part never aborts an otherwise-healthy run.

use serde_json::Value;
use tracing::{debug, warn};

use crate::dedup::StreamingRunContext;
use crate::event::{RawPart, RawRunEvent, SubAgentBoundary, WireEvent};

/// Best-effort parse result for a tool response payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPayload {
    /// The embedded result string parsed as JSON
    Structured(Value),
    /// The payload passed through unchanged
    Raw(Value),
}

impl ToolPayload {
    /// Unwrap into a plain JSON value for metadata embedding
    pub fn into_value(self) -> Value {
        match self {
            Self::Structured(v) | Self::Raw(v) => v,
        }
    }

    /// Whether the structured parse succeeded
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

/// Attempt a structured parse of a tool result payload
///
/// Sources wrap tool output as `{"result": "<string>"}` where the
/// string is often JSON itself. When it is, return the parsed value;
/// in every other case pass the original payload through. Never
/// errors.
pub fn try_parse_structured(response: &Value) -> ToolPayload {
    if let Some(result) = response.get("result").and_then(|v| v.as_str()) {
        let trimmed = result.trim();
        if trimmed.starts_with('{') {
            match serde_json::from_str(trimmed) {
                Ok(parsed) => return ToolPayload::Structured(parsed),
                Err(e) => {
                    debug!("Could not parse tool result as JSON: {}", e);
                    return ToolPayload::Raw(response.clone());
                }
            }
        }
    }
    ToolPayload::Raw(response.clone())
}

/// Classify one raw event into wire events, in emission order
///
/// Tool boundaries reset the accumulator; text parts are admitted
/// through it before emission.
pub fn classify_event(event: &RawRunEvent, ctx: &mut StreamingRunContext) -> Vec<WireEvent> {
    let session_id = ctx.session_id().to_string();
    let agent_id = ctx.agent_id().to_string();
    let mut out = Vec::new();

    if let Some(boundary) = &event.boundary {
        out.push(match boundary {
            SubAgentBoundary::Started { name } => {
                WireEvent::sub_agent_start(&session_id, &agent_id, name)
            }
            SubAgentBoundary::Completed { name } => {
                WireEvent::sub_agent_complete(&session_id, &agent_id, name)
            }
        });
    }

    if let Some(thinking) = event.thinking.as_deref()
        && !thinking.trim().is_empty()
    {
        out.push(WireEvent::thinking(&session_id, &agent_id, thinking));
    }

    for (part_index, part) in event.parts.iter().enumerate() {
        match part {
            RawPart::ToolCall { name, args, call_id } => {
                if name.trim().is_empty() {
                    warn!(
                        session_id = %session_id,
                        part_index,
                        "Skipping malformed tool call part (empty name)"
                    );
                    continue;
                }
                // A new answer segment follows the tool turn
                ctx.reset_accumulated();
                out.push(
                    WireEvent::tool_call(&session_id, &agent_id, name, args.clone())
                        .with_meta("call_id", call_id.as_deref().unwrap_or("unknown")),
                );
            }
            RawPart::ToolResult { name, response, response_id } => {
                if name.trim().is_empty() {
                    warn!(
                        session_id = %session_id,
                        part_index,
                        "Skipping malformed tool result part (empty name)"
                    );
                    continue;
                }
                let payload = try_parse_structured(response);
                ctx.reset_accumulated();
                out.push(
                    WireEvent::tool_response(&session_id, &agent_id, name)
                        .with_meta("response_id", response_id.as_deref().unwrap_or("unknown"))
                        .with_meta("is_structured", payload.is_structured())
                        .with_meta("tool_result", payload.into_value())
                        .with_meta("raw_response", response.clone()),
                );
            }
            RawPart::Text { text } => {
                if text.trim().is_empty() {
                    continue;
                }
                let Some(chunk) = ctx.admit(text, event.partial, event.final_response) else {
                    continue;
                };

                let mut content = WireEvent::content(&session_id, &agent_id, text)
                    .with_meta("event_count", ctx.events_sent())
                    .with_meta("chunk_size", chunk.chunk_size as u64)
                    .with_meta("chunk_id", chunk.chunk_id.as_str())
                    .with_meta("part_index", part_index as u64)
                    .with_meta("accumulated_size", chunk.accumulated_size as u64)
                    .with_meta("is_streaming", true)
                    .with_meta(
                        "is_partial",
                        event.partial.map(Value::Bool).unwrap_or(Value::Null),
                    )
                    .with_meta("is_final_response", event.final_response);
                if let Some(author) = &event.author {
                    content = content
                        .with_meta("sub_agent_name", author.as_str())
                        .with_meta("is_sub_agent", true);
                }
                out.push(content);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RawRunEvent, WireEventKind};
    use serde_json::json;

    fn ctx() -> StreamingRunContext {
        StreamingRunContext::new("sess", "agent")
    }

    #[test]
    fn test_text_delta_classified_as_content() {
        let mut ctx = ctx();
        let events = classify_event(&RawRunEvent::text_delta("Hello"), &mut ctx);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, WireEventKind::Content);
        assert_eq!(events[0].content, "Hello");
        assert_eq!(events[0].metadata["chunk_id"], "sess_chunk_1");
        assert_eq!(events[0].metadata["is_partial"], true);
    }

    #[test]
    fn test_duplicate_final_snapshot_suppressed() {
        let mut ctx = ctx();
        classify_event(&RawRunEvent::text_delta("4"), &mut ctx);
        let events = classify_event(&RawRunEvent::final_text("4"), &mut ctx);
        assert!(events.is_empty());
    }

    #[test]
    fn test_tool_call_resets_accumulator() {
        let mut ctx = ctx();
        classify_event(&RawRunEvent::text_delta("Answer part 1"), &mut ctx);

        let call = classify_event(
            &RawRunEvent::tool_call("joke_tool", json!({"topic": "math"})),
            &mut ctx,
        );
        assert_eq!(call.len(), 1);
        assert_eq!(call[0].kind, WireEventKind::ToolCall);
        assert_eq!(call[0].metadata["tool_name"], "joke_tool");

        // Post-tool text overlapping the pre-tool segment still flows
        let after = classify_event(&RawRunEvent::text_delta("Answer part 2"), &mut ctx);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].content, "Answer part 2");
    }

    #[test]
    fn test_tool_result_structured_parse() {
        let mut ctx = ctx();
        let response = json!({"result": "{\"joke\": \"Why did...\"}"});
        let events = classify_event(&RawRunEvent::tool_result("joke_tool", response), &mut ctx);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, WireEventKind::ToolResponse);
        assert_eq!(events[0].metadata["is_structured"], true);
        assert_eq!(events[0].metadata["tool_result"]["joke"], "Why did...");
    }

    #[test]
    fn test_tool_result_unparseable_passes_raw() {
        let response = json!({"result": "{not json at all"});
        let payload = try_parse_structured(&response);
        assert!(!payload.is_structured());
        assert_eq!(payload.into_value(), response);
    }

    #[test]
    fn test_tool_result_plain_string_passes_raw() {
        let response = json!({"result": "all done"});
        assert!(!try_parse_structured(&response).is_structured());
    }

    #[test]
    fn test_sub_agent_boundary_pair() {
        let mut ctx = ctx();
        let start = classify_event(
            &RawRunEvent::sub_agent(SubAgentBoundary::Started {
                name: "planner".to_string(),
            }),
            &mut ctx,
        );
        assert_eq!(start[0].kind, WireEventKind::Start);
        assert!(start[0].is_sub_agent_event());

        let done = classify_event(
            &RawRunEvent::sub_agent(SubAgentBoundary::Completed {
                name: "planner".to_string(),
            }),
            &mut ctx,
        );
        assert_eq!(done[0].kind, WireEventKind::Complete);
        assert_eq!(done[0].metadata["sub_agent_name"], "planner");
    }

    #[test]
    fn test_thinking_emitted_verbatim() {
        let mut ctx = ctx();
        let events = classify_event(&RawRunEvent::thinking("pondering..."), &mut ctx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, WireEventKind::Thinking);
        assert_eq!(events[0].content, "pondering...");
    }

    #[test]
    fn test_malformed_part_skipped_others_survive() {
        let mut ctx = ctx();
        let event = RawRunEvent {
            partial: Some(true),
            parts: vec![
                RawPart::Text {
                    text: "before".to_string(),
                },
                RawPart::ToolCall {
                    name: "  ".to_string(),
                    args: json!({}),
                    call_id: None,
                },
                RawPart::Text {
                    text: " after".to_string(),
                },
            ],
            ..Default::default()
        };

        let events = classify_event(&event, &mut ctx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].content, "before");
        assert_eq!(events[1].content, " after");
    }

    #[test]
    fn test_author_tagged_on_content() {
        let mut ctx = ctx();
        let events = classify_event(
            &RawRunEvent::text_delta("from a sub-agent").with_author("researcher"),
            &mut ctx,
        );
        assert_eq!(events[0].metadata["sub_agent_name"], "researcher");
        assert_eq!(events[0].metadata["is_sub_agent"], true);
    }

    #[test]
    fn test_empty_text_ignored() {
        let mut ctx = ctx();
        let events = classify_event(&RawRunEvent::text_delta("   "), &mut ctx);
        assert!(events.is_empty());
    }
}
