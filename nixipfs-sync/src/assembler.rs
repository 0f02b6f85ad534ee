//! Binary cache tree assembly.
//!
//! Builds `<remote>/binary_cache/{*.narinfo, nar/*}` from a local
//! `binary_cache/` directory, entirely by copy-by-hash.

use std::path::Path;

use nixipfs_core::{
    layout::{self, BINARY_CACHE_DIR, NAR_DIR},
    policy::{NARINFO_FILES, NAR_FILES},
    HashCache, RemotePath,
};

use crate::error::SyncError;
use crate::lister;
use crate::uploader::Uploader;

/// What went into one assembled binary cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BinaryCacheSummary {
    pub narinfos: usize,
    pub nars: usize,
}

impl BinaryCacheSummary {
    pub fn files(&self) -> usize {
        self.narinfos + self.nars
    }
}

/// Assemble the binary cache found under `local_dir` into `remote_dir`.
///
/// Returns `None` without touching the backend when `local_dir` has no
/// `binary_cache/` directory. `remote_dir` must already exist.
pub fn assemble_binary_cache(
    uploader: &Uploader,
    cache: &mut HashCache,
    local_dir: &Path,
    remote_dir: &RemotePath,
) -> Result<Option<BinaryCacheSummary>, SyncError> {
    let local_cache = layout::binary_cache_dir(local_dir);
    if !lister::exists(&local_cache)? {
        tracing::debug!("no binary cache under {}", local_dir.display());
        return Ok(None);
    }
    let local_nar = layout::nar_dir(local_dir);

    let remote_cache = remote_dir.join(BINARY_CACHE_DIR);
    let remote_nar = remote_cache.join(NAR_DIR);
    let backend = uploader.backend();
    backend.mkdir(&remote_cache, false)?;
    backend.mkdir(&remote_nar, false)?;

    let narinfos = uploader.upload_dir(cache, &local_cache, &remote_cache, &NARINFO_FILES)?;
    let nars = if lister::exists(&local_nar)? {
        uploader.upload_dir(cache, &local_nar, &remote_nar, &NAR_FILES)?
    } else {
        tracing::warn!("{} does not exist, skipping", local_nar.display());
        Default::default()
    };
    backend.flush(&remote_cache)?;

    let summary = BinaryCacheSummary {
        narinfos: narinfos.len(),
        nars: nars.len(),
    };
    tracing::debug!(
        "binary cache {remote_cache}: {} narinfo, {} nar",
        summary.narinfos,
        summary.nars
    );
    Ok(Some(summary))
}
