//! Error types for nixipfs-sync.

use std::path::PathBuf;

use thiserror::Error;

use nixipfs_backend::BackendError;
use nixipfs_core::CoreError;

/// All errors that can arise from sync operations. Every one aborts the run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from hash cache or layout handling.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A backend call other than a file upload failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Uploading one file failed.
    #[error("upload of {path} failed: {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A selected file ended up with no hash. Indicates a selector whose
    /// cacheable set does not agree with what was uploaded.
    #[error("no hash resolved for {file} in {dir}")]
    UnresolvedHash { dir: PathBuf, file: String },

    /// Fewer upload results arrived than uploads were started.
    #[error("upload fan-in for {dir} received {received} of {expected} results")]
    FanIn {
        dir: PathBuf,
        expected: usize,
        received: usize,
    },

    /// The runtime driving concurrent uploads could not be started.
    #[error("failed to start upload runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// A publish marker that does not hold a single hash.
    #[error("invalid publish marker at {path}")]
    InvalidMarker { path: PathBuf },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn runtime_error_keeps_cause_without_a_path() {
        let err = SyncError::Runtime(std::io::Error::new(
            std::io::ErrorKind::Other,
            "thread limit reached",
        ));
        assert_eq!(
            err.to_string(),
            "failed to start upload runtime: thread limit reached"
        );
        assert!(err.source().is_some());
    }
}
