use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineError;
use crate::event::EventPayload;
use crate::handler::FetchError;

/// Result type for account operations
pub type AccountResult<T> = Result<T, AccountError>;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("No event received within {0:?}")]
    Timeout(Duration),

    #[error("{name}({data1},{data2})")]
    Event {
        name: String,
        data1: EventPayload,
        data2: EventPayload,
    },

    #[error("Invalid event name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Could not open store {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    #[error("Account is not configured")]
    NotConfigured,

    #[error("Could not build HTTP client: {0}")]
    HttpClient(#[from] FetchError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl AccountError {
    /// True for failures that carry an engine-reported error event.
    pub fn is_event(&self) -> bool {
        matches!(self, AccountError::Event { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AccountError::Timeout(_))
    }
}
