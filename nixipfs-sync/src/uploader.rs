//! Concurrent uploader.
//!
//! ## `upload` protocol
//!
//! 1. List the directory and keep the files the selector selects.
//! 2. Skip cacheable files that already have a hash cache entry.
//! 3. Upload every other file on the blocking pool, at most `concurrency`
//!    at a time.
//! 4. Fan every result back in over one channel; the first failure aborts
//!    the call and stops uploads that have not started yet.
//! 5. Record cacheable results in the hash cache, the rest in a call-local map.
//! 6. Resolve a hash for every selected file, or fail.
//!
//! [`Uploader::upload_dir`] then copies each resolved hash into the remote
//! directory. All uploads for a directory finish before the first copy.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use nixipfs_backend::Backend;
use nixipfs_core::{ContentHash, FileSelector, HashCache, RemotePath, UploadResult};

use crate::error::{io_err, SyncError};
use crate::lister;

/// Default number of uploads in flight at once.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 16;

/// Selected filename → resolved hash, ordered by filename.
pub type ResolvedFiles = BTreeMap<String, ContentHash>;

/// Uploads directories to a backend with bounded parallelism.
pub struct Uploader {
    backend: Arc<dyn Backend>,
    runtime: tokio::runtime::Runtime,
    concurrency: usize,
}

impl Uploader {
    /// `concurrency` is clamped to at least 1.
    pub fn new(backend: Arc<dyn Backend>, concurrency: usize) -> Result<Self, SyncError> {
        let concurrency = concurrency.max(1);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(concurrency)
            .build()
            .map_err(SyncError::Runtime)?;
        Ok(Self {
            backend,
            runtime,
            concurrency,
        })
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Upload the selected files of `dir` and resolve a hash for each.
    pub fn upload(
        &self,
        cache: &mut HashCache,
        dir: &Path,
        selector: &FileSelector,
    ) -> Result<ResolvedFiles, SyncError> {
        let selected = lister::select_files(dir, selector)?;

        let pending: Vec<String> = selected
            .iter()
            .filter(|name| {
                let cached = selector.is_cacheable(name) && cache.contains(name);
                if cached {
                    tracing::debug!("cache hit: {name}");
                }
                !cached
            })
            .cloned()
            .collect();

        let results = self.runtime.block_on(fan_out(
            Arc::clone(&self.backend),
            dir,
            pending,
            self.concurrency,
        ))?;

        // Single-threaded fan-in: the only place the cache is written.
        let mut local = HashMap::new();
        for UploadResult { filename, hash } in results {
            if selector.is_cacheable(&filename) {
                cache.insert(filename, hash);
            } else {
                local.insert(filename, hash);
            }
        }

        let mut resolved = ResolvedFiles::new();
        for name in selected {
            let hash = if selector.is_cacheable(&name) {
                cache.get(&name)
            } else {
                local.get(&name)
            };
            let Some(hash) = hash.cloned() else {
                return Err(SyncError::UnresolvedHash {
                    dir: dir.to_path_buf(),
                    file: name,
                });
            };
            resolved.insert(name, hash);
        }
        Ok(resolved)
    }

    /// Copy every resolved file into `remote_dir`. Existing entries are an
    /// error, never overwritten.
    pub fn copy_into(
        &self,
        resolved: &ResolvedFiles,
        remote_dir: &RemotePath,
    ) -> Result<(), SyncError> {
        for (name, hash) in resolved {
            let dest = remote_dir.join(name);
            tracing::debug!("cp {} -> {dest}", hash.ipfs_path());
            self.backend.copy(hash, &dest, false)?;
        }
        Ok(())
    }

    /// [`Self::upload`] followed by [`Self::copy_into`].
    pub fn upload_dir(
        &self,
        cache: &mut HashCache,
        dir: &Path,
        remote_dir: &RemotePath,
        selector: &FileSelector,
    ) -> Result<ResolvedFiles, SyncError> {
        let resolved = self.upload(cache, dir, selector)?;
        self.copy_into(&resolved, remote_dir)?;
        Ok(resolved)
    }
}

async fn fan_out(
    backend: Arc<dyn Backend>,
    dir: &Path,
    files: Vec<String>,
    concurrency: usize,
) -> Result<Vec<UploadResult>, SyncError> {
    let expected = files.len();
    if expected == 0 {
        return Ok(Vec::new());
    }

    let (tx, mut rx) = mpsc::channel::<Result<UploadResult, SyncError>>(expected);
    let permits = Arc::new(Semaphore::new(concurrency));
    let aborted = Arc::new(AtomicBool::new(false));

    for filename in files {
        if aborted.load(Ordering::Acquire) {
            break;
        }
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let tx = tx.clone();
        let backend = Arc::clone(&backend);
        let aborted = Arc::clone(&aborted);
        let path = dir.join(&filename);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            if aborted.load(Ordering::Acquire) {
                return;
            }
            let result = add_file(backend.as_ref(), path, filename);
            if result.is_err() {
                aborted.store(true, Ordering::Release);
            }
            let _ = tx.blocking_send(result);
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(expected);
    while let Some(result) = rx.recv().await {
        results.push(result?);
    }
    if results.len() != expected {
        return Err(SyncError::FanIn {
            dir: dir.to_path_buf(),
            expected,
            received: results.len(),
        });
    }
    Ok(results)
}

fn add_file(
    backend: &dyn Backend,
    path: PathBuf,
    filename: String,
) -> Result<UploadResult, SyncError> {
    let file = File::open(&path).map_err(|e| io_err(&path, e))?;
    tracing::debug!("uploading {}", path.display());
    let hash = backend
        .add(&filename, Box::new(file))
        .map_err(|source| SyncError::Upload { path, source })?;
    Ok(UploadResult { filename, hash })
}
