//! Event model
//!
//! `RawRunEvent` is what the upstream run source produces;
//! `WireEvent` is what the relay delivers downstream after
//! classification and deduplication.

mod raw;
mod wire;

pub use raw::{RawPart, RawRunEvent, SubAgentBoundary};
pub use wire::{Metadata, WireEvent, WireEventKind};
