//! Error types for marker encoding and decoding.

use thiserror::Error;

/// The error type for marker operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The marker was found but its payload is not valid JSON.
    #[error("Malformed metadata marker: {0}")]
    MalformedMetadata(#[source] serde_json::Error),

    /// The marker payload is valid JSON but not a JSON object.
    #[error("Metadata payload must be a JSON object, found {found}")]
    InvalidPayload {
        /// JSON type name of the value that was found.
        found: &'static str,
    },

    /// A tenant entry exists in the table but is not a JSON object.
    #[error("Metadata for tenant '{tenant}' is not a JSON object")]
    NotAnObject {
        /// The tenant whose entry has the wrong shape.
        tenant: String,
    },

    /// The table could not be serialized back into a payload.
    #[error("Failed to encode metadata: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A specialized Result type for marker operations.
pub type Result<T> = std::result::Result<T, Error>;
