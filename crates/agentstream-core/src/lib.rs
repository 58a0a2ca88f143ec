//! Agentstream Core - Streaming session relay between agent runtimes
//! and stream consumers
//!
//! This crate provides the core functionality of the relay:
//! - Event model for raw run events and normalized wire events
//! - Classification of raw events into ordered wire events
//! - Deduplicating accumulator for streamed text
//! - Session lifecycle with expiry and memory flush
//! - Relay loop and multi-run fan-out

pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod event;
pub mod relay;
pub mod session;
pub mod store;

pub use classify::{classify_event, try_parse_structured, ToolPayload};
pub use config::RelayConfig;
pub use dedup::{AcceptedChunk, StreamingRunContext};
pub use error::{Error, Result};
pub use event::{Metadata, RawPart, RawRunEvent, SubAgentBoundary, WireEvent, WireEventKind};
pub use relay::{
    RelayLoop, RunEventSource, RunOutcome, RunSummary, ScriptedSource, StreamRelay, StreamSource,
};
pub use session::{SessionHandle, SessionInfo, SessionKey, SessionLifecycleManager, SessionStats};
pub use store::{
    InMemoryMemoryStore, InMemorySessionStore, MemoryHit, MemoryStore, SessionStore, StoredSession,
};
