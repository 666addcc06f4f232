//! Error types for metadata operations.

use thiserror::Error;

/// The error type for metadata operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A key was given without a value to store under it.
    #[error("No value provided for key '{key}'")]
    MissingValue {
        /// The key that had no value.
        key: String,
    },

    /// The metadata marker in the issue body could not be decoded.
    #[error(transparent)]
    Marker(#[from] issue_metadata_marker::Error),

    /// The request to the issue host could not be completed.
    #[error("Issue host request failed ({operation}): {message}")]
    RemoteTransport {
        /// The operation being performed, e.g. `get_issue`.
        operation: &'static str,
        /// Description of the transport failure.
        message: String,
    },

    /// The issue host answered with a non-success status.
    #[error("Issue host returned HTTP {status} ({operation}): {body}")]
    RemoteStatus {
        /// The operation being performed.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },

    /// A storage backend could not be constructed.
    #[error("Backend initialization failed: {0}")]
    BackendInitialization(String),

    /// A document store object that was being created already exists.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// What was being created ("collection" or "index").
        kind: &'static str,
        /// Name of the existing object.
        name: String,
    },

    /// The document store rejected a query.
    #[error("Document store error: {0}")]
    DocumentStore(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for metadata operations.
pub type Result<T> = std::result::Result<T, Error>;
