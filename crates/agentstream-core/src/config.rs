//! Relay configuration
//!
//! All tunables for the relay core live here and are passed by
//! reference into the lifecycle manager and relay constructors.
//! There is no process-wide state.

use std::time::Duration;

/// Default idle lifetime of a session before it is torn down
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Minimum number of recorded events for a session to be worth
/// flushing into long-term memory at teardown
pub const DEFAULT_MEMORY_THRESHOLD_EVENTS: usize = 2;

/// Configuration for the streaming relay core
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Logical application name used as the session store namespace
    pub app_name: String,
    /// User id assumed when the caller provides none
    pub default_user_id: String,
    /// Sessions older than this (measured from creation) are expired
    pub session_timeout: Duration,
    /// Sessions with more recorded events than this are flushed to
    /// memory before deletion
    pub memory_threshold_events: usize,
    /// Capacity of the bounded wire-event channel handed to consumers
    pub output_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            app_name: "agentstream".to_string(),
            default_user_id: "default_user".to_string(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            memory_threshold_events: DEFAULT_MEMORY_THRESHOLD_EVENTS,
            output_buffer: 256,
        }
    }
}

impl RelayConfig {
    /// Create a config with the given application name
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Set the session timeout
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the memory flush threshold
    pub fn with_memory_threshold(mut self, events: usize) -> Self {
        self.memory_threshold_events = events;
        self
    }

    /// Set the output channel capacity
    pub fn with_output_buffer(mut self, capacity: usize) -> Self {
        self.output_buffer = capacity;
        self
    }

    /// Set the default user id
    pub fn with_default_user(mut self, user_id: impl Into<String>) -> Self {
        self.default_user_id = user_id.into();
        self
    }
}
