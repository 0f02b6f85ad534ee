//! Release and channel synchronisation.
//!
//! A release directory is either:
//!
//! - **published**: `ipfs_hash` exists. Its hash is copied straight into the
//!   new tree; local content is not inspected and nothing is uploaded.
//! - **unpublished**: its artifacts and binary cache are uploaded and
//!   assembled under the remote directory, which is then stat'ed and the
//!   resulting hash written to `ipfs_hash`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nixipfs_core::{layout, policy::RELEASE_FILES, ContentHash, HashCache, RemotePath};

use crate::assembler::assemble_binary_cache;
use crate::error::{io_err, SyncError};
use crate::uploader::Uploader;

/// Outcome of synchronising one release or channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Content was uploaded and a marker written.
    Uploaded { hash: ContentHash, files: usize },
    /// A marker existed; its hash was copied into the tree.
    Republished { hash: ContentHash },
}

impl ReleaseOutcome {
    pub fn hash(&self) -> &ContentHash {
        match self {
            ReleaseOutcome::Uploaded { hash, .. } | ReleaseOutcome::Republished { hash } => hash,
        }
    }
}

/// Mirror `local_dir` to `remote_dir`.
pub fn sync_release(
    uploader: &Uploader,
    cache: &mut HashCache,
    local_dir: &Path,
    remote_dir: &RemotePath,
) -> Result<ReleaseOutcome, SyncError> {
    let backend = uploader.backend();

    if let Some(hash) = read_marker(local_dir)? {
        tracing::debug!("{} already published as {hash}", local_dir.display());
        backend.mkdir(&remote_dir.parent(), true)?;
        backend.copy(&hash, remote_dir, false)?;
        backend.flush(remote_dir)?;
        return Ok(ReleaseOutcome::Republished { hash });
    }

    backend.mkdir(remote_dir, true)?;
    let artifacts = uploader.upload_dir(cache, local_dir, remote_dir, &RELEASE_FILES)?;
    let binary_cache = assemble_binary_cache(uploader, cache, local_dir, remote_dir)?;
    backend.flush(remote_dir)?;

    let hash = backend.stat(remote_dir)?;
    write_marker(local_dir, &hash)?;
    tracing::debug!("{} published as {hash}", local_dir.display());

    Ok(ReleaseOutcome::Uploaded {
        hash,
        files: artifacts.len() + binary_cache.map(|s| s.files()).unwrap_or(0),
    })
}

/// Hash recorded in `<release>/ipfs_hash`, or `None` if there is no marker.
pub fn read_marker(release_dir: &Path) -> Result<Option<ContentHash>, SyncError> {
    let path = layout::marker_path(release_dir);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&path, err)),
    };
    let hash = contents.trim();
    if hash.is_empty() || hash.contains(char::is_whitespace) {
        return Err(SyncError::InvalidMarker { path });
    }
    Ok(Some(ContentHash::from(hash)))
}

/// Record `hash` in `<release>/ipfs_hash`.
///
/// Writes to `ipfs_hash.tmp` then renames to `ipfs_hash`.
pub fn write_marker(release_dir: &Path, hash: &ContentHash) -> Result<(), SyncError> {
    let path = layout::marker_path(release_dir);
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, hash.as_str()).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}
