//! Error types for Agentstream Core

use thiserror::Error;

/// Result type alias using Agentstream Error
pub type Result<T> = std::result::Result<T, Error>;

/// Agentstream error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Run source error: {0}")]
    Source(String),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Memory store error: {0}")]
    Memory(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
