//! Agentstream SSE - Server-Sent Events delivery for wire events
//!
//! Encodes relay wire events as SSE `data:` frames and pumps a run's
//! event channel into any frame sink. Every stream, successful or
//! not, ends with the `[DONE]` sentinel.

pub mod error;
pub mod frame;
pub mod pump;

pub use error::{Error, Result};
pub use frame::{format_frame, Frame, DONE_FRAME};
pub use pump::{pump, BufferSink, FrameSink};
