//! Fixed file-selection policy.
//!
//! Selection is a *substring* match, not a suffix match: an entry selects any
//! filename that contains it anywhere. `nixexprs.tar.xz` therefore also
//! selects `nixexprs.tar.xz.tmp`, and a single entry like `binary-cache-url`
//! works for names that carry no extension at all.

/// Which files of a directory to upload, and which of those may be remembered
/// in the persistent hash cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSelector {
    pub include: &'static [&'static str],
    pub cacheable: &'static [&'static str],
}

impl FileSelector {
    /// True if `filename` contains any allow-list entry.
    pub fn selects(&self, filename: &str) -> bool {
        contains_any(filename, self.include)
    }

    /// True if `filename`'s content may be assumed stable across runs.
    pub fn is_cacheable(&self, filename: &str) -> bool {
        contains_any(filename, self.cacheable)
    }
}

fn contains_any(filename: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| filename.contains(p))
}

/// Release and channel artifacts. Only the large images are cacheable; the
/// index files keep their names while their content changes between runs.
pub const RELEASE_FILES: FileSelector = FileSelector {
    include: &[
        "binary-cache-url",
        "git-revision",
        "nixexprs.tar.xz",
        ".ova",
        ".iso",
        "src-url",
        "store-paths.xz",
    ],
    cacheable: &[".iso", ".ova"],
};

/// Binary cache metadata. A narinfo is named after its store path hash, so
/// its content never changes.
pub const NARINFO_FILES: FileSelector = FileSelector {
    include: &[".narinfo"],
    cacheable: &[".narinfo"],
};

/// Binary cache archives. `nar-cache-info` is regenerated per run.
pub const NAR_FILES: FileSelector = FileSelector {
    include: &[".nar", "nar-cache-info"],
    cacheable: &[".nar"],
};

/// Prefix of the per-run top-level remote directory, `/nixfs_<unix-seconds>`.
pub const NAMESPACE_PREFIX: &str = "nixfs_";
