use thiserror::Error;

use super::types::{ContactId, MessageId};

/// Result type for engine calls
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Open error: {0}")]
    Open(String),

    #[error("Store not opened")]
    NotOpen,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown contact: {0}")]
    UnknownContact(ContactId),

    #[error("Unknown message: {0}")]
    UnknownMessage(MessageId),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Storage(err.to_string())
    }
}
