//! Session lifecycle
//!
//! At most one live session exists per (user, agent) pair. A request
//! inside the timeout window reuses it; a request after expiry tears
//! it down (flushing to long-term memory when it earned it) and
//! starts fresh.

mod manager;
mod types;

pub use manager::SessionLifecycleManager;
pub use types::{SessionHandle, SessionInfo, SessionKey, SessionStats};
