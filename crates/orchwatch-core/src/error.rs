//! Error types for the orchestrator watcher.

use thiserror::Error;

/// Errors raised while resolving or decoding a single log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No known event for topic {topic}")]
    UnknownEvent { topic: String },

    #[error("Log emitted by {address}, not the watched contract")]
    WrongContract { address: String },

    #[error("Log has no topic at index {index}")]
    MissingTopic { index: usize },

    #[error("ABI decode failed: {reason}")]
    AbiDecodeFailed { reason: String },
}

/// Errors surfaced by the watcher and its collaborators.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Chain query error: {0}")]
    Chain(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WatcherError {
    /// Returns `true` if the error came from decoding a log.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
