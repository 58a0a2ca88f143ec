//! Storage seams
//!
//! The relay core never assumes its backing services are in-process.
//! `SessionStore` and `MemoryStore` are narrow async traits; the
//! in-memory implementations here are the defaults and the test
//! doubles in one.

mod memory;
mod session;

pub use memory::{InMemoryMemoryStore, MemoryHit, MemoryStore};
pub use session::{InMemorySessionStore, SessionStore, StoredSession};
