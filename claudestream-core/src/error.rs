//! Error types for claudestream-core

use thiserror::Error;

/// Main error type for the claudestream-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A stream line could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A transcript mutation was rejected
    #[error("transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    /// The display side of the update channel hung up
    #[error("update channel closed")]
    ChannelClosed,
}

/// Failure to decode one stream line into an envelope.
///
/// Never fatal to the stream: the pipeline reports it and moves on.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Line was blank after trimming
    #[error("empty line")]
    Empty,

    /// Line is not valid JSON
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Line is valid JSON but not an object
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

/// Rejected in-place transcript mutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    /// No entry with this id
    #[error("no transcript entry with id {0}")]
    UnknownMessage(String),

    /// Entry exists but has a different content kind
    #[error("transcript entry {id} is not a {expected}")]
    WrongKind { id: String, expected: &'static str },

    /// Permission request already reached a terminal status
    #[error("permission request {0} is already resolved")]
    AlreadyResolved(String),

    /// Resolution must move to a terminal status
    #[error("cannot resolve a permission request back to pending")]
    PendingResolution,
}

/// Result type alias for claudestream-core
pub type Result<T> = std::result::Result<T, Error>;
