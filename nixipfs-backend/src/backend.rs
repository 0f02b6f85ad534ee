use std::io::Read;

use nixipfs_core::{ContentHash, PublishedName, RemotePath};

use crate::error::BackendError;

/// Content handed to [`Backend::add`]. Owned so it can be streamed from
/// another thread.
pub type Content = Box<dyn Read + Send>;

/// Capability set of a content-addressed store with a mutable file tree.
///
/// Implementations must be shareable across upload threads; every method
/// blocks until the backend has answered.
pub trait Backend: Send + Sync {
    /// Store raw content (no directory wrapping, no pin) and return its hash.
    fn add(&self, name: &str, content: Content) -> Result<ContentHash, BackendError>;

    /// Create a directory in the mutable tree.
    fn mkdir(&self, path: &RemotePath, parents: bool) -> Result<(), BackendError>;

    /// Place existing content at `dest` without re-uploading it. Fails if
    /// `dest` exists and `overwrite` is false.
    fn copy(
        &self,
        source: &ContentHash,
        dest: &RemotePath,
        overwrite: bool,
    ) -> Result<(), BackendError>;

    /// Hash of the subtree at `path`.
    fn stat(&self, path: &RemotePath) -> Result<ContentHash, BackendError>;

    /// Commit buffered changes below `path`.
    fn flush(&self, path: &RemotePath) -> Result<(), BackendError>;

    /// Protect `hash` from garbage collection.
    fn pin(&self, hash: &ContentHash) -> Result<(), BackendError>;

    /// Bind the backend's mutable name to `hash`.
    fn publish(&self, hash: &ContentHash) -> Result<PublishedName, BackendError>;
}
