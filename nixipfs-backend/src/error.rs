//! Error types for nixipfs-backend.

use thiserror::Error;

/// All errors a backend call can return. None of them are retried.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced an HTTP response (connection refused,
    /// timeout, DNS failure).
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// The API answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The API answered 2xx but the body was not the expected JSON.
    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading the content being added failed.
    #[error("failed to read content for {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no such remote path: {path}")]
    NotFound { path: String },

    #[error("remote path already exists: {path}")]
    AlreadyExists { path: String },

    #[error("not a remote directory: {path}")]
    NotADirectory { path: String },

    #[error("unknown content hash: {hash}")]
    UnknownHash { hash: String },
}
