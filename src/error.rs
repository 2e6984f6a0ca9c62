//! Crate-wide error types for the replay engine.
//!
//! Per-record decode problems are not represented here: the decoder drops
//! malformed records and keeps going. These variants cover failures that a
//! caller can actually act on (missing files, structurally broken logs,
//! store failures).

use thiserror::Error;

/// Comprehensive error type for log decoding, scanning and playback wiring.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// I/O error when reading media or log files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural XML error (the file is not a parsable chat log at all)
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// JSON parsing error with the context it occurred in
    #[error("JSON parsing error in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A file name that does not follow the recording naming grammar
    #[error("Invalid recording file name: {name}")]
    InvalidName { name: String },

    /// Invalid log structure
    #[error("Invalid log format: {reason}")]
    InvalidFormat { reason: String },

    /// Empty or unusable data
    #[error("No valid data found: {context}")]
    NoData { context: String },

    /// Segment index outside the session
    #[error("Segment index {index} out of range ({count} segments)")]
    SegmentOutOfRange { index: usize, count: usize },

    /// Persistence layer failure
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Generic error with context
    #[error("Error in {context}: {message}")]
    Generic { context: String, message: String },
}

impl ReplayError {
    /// Create a new generic error with context
    pub fn generic(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generic {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an invalid format error
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }

    /// Create a no data error
    pub fn no_data(context: impl Into<String>) -> Self {
        Self::NoData {
            context: context.into(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }

    /// Wrap a JSON error with its parse context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type ReplayResult<T> = Result<T, ReplayError>;
