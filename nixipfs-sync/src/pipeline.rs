//! Run orchestration: one merged, pinned, published tree per run.
//!
//! 1. Load the hash cache.
//! 2. Create `<ns>/releases` and `<ns>/channels`.
//! 3. Assemble the global binary cache under `<ns>`.
//! 4. Sync every `releases/<family>/<release>` to `<ns>/releases/<family>/<release>`.
//! 5. Sync every `channels/<channel>` to `<ns>/channels/<channel>`.
//! 6. Flush, stat, pin and publish `<ns>`, then persist the hash cache.
//!
//! Releases and channels are processed one at a time; only the uploads
//! inside one directory run in parallel.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use nixipfs_backend::Backend;
use nixipfs_core::{
    layout::{CHANNELS_DIR, RELEASES_DIR},
    policy::NAMESPACE_PREFIX,
    ContentHash, HashCache, LocalLayout, PublishedName, RemotePath,
};

use crate::assembler::{assemble_binary_cache, BinaryCacheSummary};
use crate::error::SyncError;
use crate::lister::{self, dir_name};
use crate::release::{sync_release, ReleaseOutcome};
use crate::uploader::{Uploader, DEFAULT_UPLOAD_CONCURRENCY};

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Top-level remote directory the merged tree is built in.
    pub namespace: RemotePath,
    /// Maximum uploads in flight at once.
    pub concurrency: usize,
}

impl RunOptions {
    /// Options for a run started at `unix_seconds`.
    pub fn at(unix_seconds: i64) -> Self {
        Self {
            namespace: namespace_for(unix_seconds),
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }
}

/// `/nixfs_<unix_seconds>`
pub fn namespace_for(unix_seconds: i64) -> RemotePath {
    RemotePath::new(format!("{NAMESPACE_PREFIX}{unix_seconds}"))
}

/// What a synchronised directory is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    GlobalCache,
    Release,
    Channel,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::GlobalCache => write!(f, "binary cache"),
            TargetKind::Release => write!(f, "release"),
            TargetKind::Channel => write!(f, "channel"),
        }
    }
}

/// Outcome for one release or channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub kind: TargetKind,
    /// `<family>/<release>` for releases, `<channel>` for channels.
    pub name: String,
    pub remote: RemotePath,
    pub outcome: ReleaseOutcome,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub namespace: RemotePath,
    pub root_hash: ContentHash,
    pub published: PublishedName,
    pub global_cache: Option<BinaryCacheSummary>,
    pub releases: Vec<ReleaseReport>,
}

/// Mirror everything under `layout` and publish the merged tree.
pub fn run(
    layout: &LocalLayout,
    backend: Arc<dyn Backend>,
    options: &RunOptions,
) -> Result<RunSummary, SyncError> {
    let cache_path = layout.hash_cache_path();
    let mut cache = HashCache::load_at(&cache_path)?;
    tracing::debug!("loaded {} hash cache entries", cache.len());

    let uploader = Uploader::new(backend, options.concurrency)?;
    let backend = uploader.backend();
    let ns = &options.namespace;

    backend.mkdir(&ns.join(CHANNELS_DIR), true)?;
    backend.mkdir(&ns.join(RELEASES_DIR), true)?;

    tracing::info!("adding global binary cache");
    let global_cache = assemble_binary_cache(&uploader, &mut cache, layout.root(), ns)?;
    if global_cache.is_none() {
        tracing::warn!("no global binary cache under {}", layout.root().display());
    }

    let mut releases = Vec::new();
    for family in lister::list_dirs_if_present(&layout.releases_dir())? {
        let family_name = dir_name(&family);
        for release in lister::list_dirs(&family)? {
            let name = format!("{family_name}/{}", dir_name(&release));
            tracing::info!("adding release: {name}");
            let remote = ns
                .join(RELEASES_DIR)
                .join(&family_name)
                .join(dir_name(&release));
            releases.push(sync_target(
                &uploader,
                &mut cache,
                TargetKind::Release,
                name,
                &release,
                remote,
            )?);
        }
    }

    for channel in lister::list_dirs_if_present(&layout.channels_dir())? {
        let name = dir_name(&channel);
        tracing::info!("adding channel: {name}");
        let remote = ns.join(CHANNELS_DIR).join(&name);
        releases.push(sync_target(
            &uploader,
            &mut cache,
            TargetKind::Channel,
            name,
            &channel,
            remote,
        )?);
    }

    tracing::info!("flushing {ns}");
    backend.flush(ns)?;
    let root_hash = backend.stat(ns)?;

    tracing::info!("pinning {root_hash}");
    backend.pin(&root_hash)?;

    let published = backend.publish(&root_hash)?;
    tracing::info!("published {} to /ipns/{}", published.value, published.name);

    cache.persist_at(&cache_path)?;

    Ok(RunSummary {
        namespace: ns.clone(),
        root_hash,
        published,
        global_cache,
        releases,
    })
}

fn sync_target(
    uploader: &Uploader,
    cache: &mut HashCache,
    kind: TargetKind,
    name: String,
    local: &Path,
    remote: RemotePath,
) -> Result<ReleaseReport, SyncError> {
    let outcome = sync_release(uploader, cache, local, &remote)?;
    Ok(ReleaseReport {
        kind,
        name,
        remote,
        outcome,
    })
}
