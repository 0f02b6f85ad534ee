//! Local directory layout of a mirror root.
//!
//! ```text
//! <root>/
//!   ipfs_hashes                 (hash cache)
//!   binary_cache/               (global binary cache)
//!     *.narinfo
//!     nar/
//!   releases/<family>/<release>/
//!     ipfs_hash                 (publish marker, written after first sync)
//!     binary_cache/nar/
//!   channels/<channel>/
//! ```

use std::path::{Path, PathBuf};

pub const HASH_CACHE_FILE: &str = "ipfs_hashes";
pub const MARKER_FILE: &str = "ipfs_hash";
pub const RELEASES_DIR: &str = "releases";
pub const CHANNELS_DIR: &str = "channels";
pub const BINARY_CACHE_DIR: &str = "binary_cache";
pub const NAR_DIR: &str = "nar";

/// Paths derived from the mirror root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLayout {
    root: PathBuf,
}

impl LocalLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hash_cache_path(&self) -> PathBuf {
        self.root.join(HASH_CACHE_FILE)
    }

    pub fn releases_dir(&self) -> PathBuf {
        self.root.join(RELEASES_DIR)
    }

    pub fn channels_dir(&self) -> PathBuf {
        self.root.join(CHANNELS_DIR)
    }
}

/// `<release>/ipfs_hash`
pub fn marker_path(release_dir: &Path) -> PathBuf {
    release_dir.join(MARKER_FILE)
}

/// `<dir>/binary_cache`
pub fn binary_cache_dir(dir: &Path) -> PathBuf {
    dir.join(BINARY_CACHE_DIR)
}

/// `<dir>/binary_cache/nar`
pub fn nar_dir(dir: &Path) -> PathBuf {
    binary_cache_dir(dir).join(NAR_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_root() {
        let layout = LocalLayout::new("/srv/mirror");
        assert_eq!(layout.hash_cache_path(), PathBuf::from("/srv/mirror/ipfs_hashes"));
        assert_eq!(layout.releases_dir(), PathBuf::from("/srv/mirror/releases"));
        assert_eq!(layout.channels_dir(), PathBuf::from("/srv/mirror/channels"));
    }

    #[test]
    fn release_relative_paths() {
        let release = Path::new("/srv/mirror/releases/21.05/x86_64");
        assert_eq!(marker_path(release), release.join("ipfs_hash"));
        assert_eq!(nar_dir(release), release.join("binary_cache").join("nar"));
    }
}
