//! Hash cache: cross-run memory of which filenames were already uploaded.
//!
//! Persisted as `<root>/ipfs_hashes`, one `filename:hash` record per line.
//! The whole file is rewritten once per run, using the same `.tmp` + rename
//! pattern as marker files so an interrupted write never truncates the cache.
//!
//! Keys are bare filenames. Two directories holding different content under
//! the same name would collide; only names whose content never changes
//! (see [`crate::policy`]) are ever inserted.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{io_err, CoreError};
use crate::types::ContentHash;

/// Field delimiter between filename and hash.
pub const DELIMITER: char = ':';

/// In-memory filename → hash mapping, owned by the run and passed by `&mut`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashCache {
    entries: HashMap<String, ContentHash>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache from `path`.
    ///
    /// Returns an empty cache if the file does not yet exist.
    pub fn load_at(path: &Path) -> Result<Self, CoreError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => return Err(io_err(path, err)),
        };

        let mut entries = HashMap::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            // Hashes never contain the delimiter, so split on the last one.
            let Some((filename, hash)) = line.rsplit_once(DELIMITER) else {
                return Err(CoreError::CacheParse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                });
            };
            if filename.is_empty() || hash.is_empty() {
                return Err(CoreError::CacheParse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                });
            }
            entries.insert(filename.to_string(), ContentHash::from(hash));
        }
        Ok(Self { entries })
    }

    /// Persist every entry to `path`, replacing the previous file wholesale.
    ///
    /// Writes to `<path>.tmp` then renames to `<path>`.
    pub fn persist_at(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }

        let sorted: BTreeMap<&String, &ContentHash> = self.entries.iter().collect();
        let mut body = String::new();
        for (filename, hash) in sorted {
            body.push_str(filename);
            body.push(DELIMITER);
            body.push_str(hash.as_str());
            body.push('\n');
        }

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, body).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(path, e));
        }
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Option<&ContentHash> {
        self.entries.get(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    pub fn insert(&mut self, filename: impl Into<String>, hash: ContentHash) {
        self.entries.insert(filename.into(), hash);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
