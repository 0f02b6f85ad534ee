//! Local directory enumeration.
//!
//! All listings are sorted by name so runs visit releases in a stable order.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nixipfs_core::FileSelector;

use crate::error::{io_err, SyncError};

/// Immediate subdirectories of `path`, including symlinks (which are assumed
/// to point at directories).
pub fn list_dirs(path: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(path).map_err(|e| io_err(path, e))? {
        let entry = entry.map_err(|e| io_err(path, e))?;
        let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if file_type.is_dir() || file_type.is_symlink() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// [`list_dirs`], except that a missing `path` yields no entries.
pub fn list_dirs_if_present(path: &Path) -> Result<Vec<PathBuf>, SyncError> {
    if !exists(path)? {
        tracing::warn!("{} does not exist, skipping", path.display());
        return Ok(Vec::new());
    }
    list_dirs(path)
}

/// Names of the regular files in `path`, following symlinks.
///
/// Dangling symlinks and names that are not valid UTF-8 are skipped.
pub fn list_files(path: &Path) -> Result<Vec<String>, SyncError> {
    let mut files = Vec::new();
    for name in entry_names(path)? {
        if is_file(&path.join(&name))? {
            files.push(name);
        }
    }
    Ok(files)
}

/// Names of the files in `path` that `selector` selects, each exactly once.
///
/// Only selected names are stat'ed, so unrelated entries (a stale `result`
/// link, say) never fail the listing.
pub fn select_files(path: &Path, selector: &FileSelector) -> Result<Vec<String>, SyncError> {
    let mut selected = Vec::new();
    for name in entry_names(path)? {
        if selector.selects(&name) && is_file(&path.join(&name))? {
            selected.push(name);
        }
    }
    Ok(selected)
}

fn entry_names(path: &Path) -> Result<Vec<String>, SyncError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(path).map_err(|e| io_err(path, e))? {
        let entry = entry.map_err(|e| io_err(path, e))?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => tracing::warn!(
                "skipping non-UTF-8 entry {:?} in {}",
                raw,
                path.display()
            ),
        }
    }
    names.sort();
    Ok(names)
}

/// Regular file after following symlinks; a dangling symlink is not.
fn is_file(path: &Path) -> Result<bool, SyncError> {
    match std::fs::metadata(path) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!("{} is a dangling symlink, skipping", path.display());
            Ok(false)
        }
        Err(err) => Err(io_err(path, err)),
    }
}

pub(crate) fn exists(path: &Path) -> Result<bool, SyncError> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Final path component as an owned string.
pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nixipfs_core::policy::RELEASE_FILES;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn list_dirs_returns_sorted_subdirectories_only() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("b")).unwrap();
        fs::create_dir(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("file"), "x").unwrap();

        let dirs = list_dirs(tmp.path()).unwrap();
        assert_eq!(dirs, vec![tmp.path().join("a"), tmp.path().join("b")]);
    }

    #[test]
    #[cfg(unix)]
    fn list_dirs_includes_symlinks() {
        let tmp = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        std::os::unix::fs::symlink(target.path(), tmp.path().join("latest")).unwrap();

        let dirs = list_dirs(tmp.path()).unwrap();
        assert_eq!(dirs, vec![tmp.path().join("latest")]);
    }

    #[test]
    fn list_dirs_missing_path_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = list_dirs(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn list_dirs_if_present_tolerates_missing_path() {
        let tmp = TempDir::new().unwrap();
        assert!(list_dirs_if_present(&tmp.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn list_files_skips_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("binary_cache")).unwrap();
        fs::write(tmp.path().join("git-revision"), "abc").unwrap();

        assert_eq!(list_files(tmp.path()).unwrap(), vec!["git-revision"]);
    }

    #[test]
    fn select_files_matches_substrings_once() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("nixexprs.tar.xz.tmp"), "x").unwrap();
        // Matches both ".iso" and ".ova"; must still be selected once.
        fs::write(tmp.path().join("odd.iso.ova"), "x").unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let selected = select_files(tmp.path(), &RELEASE_FILES).unwrap();
        assert_eq!(selected, vec!["nixexprs.tar.xz.tmp", "odd.iso.ova"]);
    }

    #[test]
    #[cfg(unix)]
    fn select_files_ignores_dangling_unselected_symlink() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("git-revision"), "0123abcd").unwrap();
        std::os::unix::fs::symlink("/nonexistent/target", tmp.path().join("result")).unwrap();

        let selected = select_files(tmp.path(), &RELEASE_FILES).unwrap();
        assert_eq!(selected, vec!["git-revision"]);
    }

    #[test]
    #[cfg(unix)]
    fn dangling_selected_symlink_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("git-revision"), "0123abcd").unwrap();
        std::os::unix::fs::symlink("/nonexistent/image", tmp.path().join("nixos.iso")).unwrap();

        assert_eq!(
            select_files(tmp.path(), &RELEASE_FILES).unwrap(),
            vec!["git-revision"]
        );
        assert_eq!(list_files(tmp.path()).unwrap(), vec!["git-revision"]);
    }

    #[test]
    #[cfg(unix)]
    fn symlinked_files_are_followed() {
        let tmp = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        fs::write(store.path().join("image"), "iso").unwrap();
        std::os::unix::fs::symlink(store.path().join("image"), tmp.path().join("nixos.iso"))
            .unwrap();

        assert_eq!(
            select_files(tmp.path(), &RELEASE_FILES).unwrap(),
            vec!["nixos.iso"]
        );
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("git-revision"), "0123abcd").unwrap();
        fs::write(tmp.path().join(OsStr::from_bytes(b"bad\xff.iso")), "iso").unwrap();

        assert_eq!(
            select_files(tmp.path(), &RELEASE_FILES).unwrap(),
            vec!["git-revision"]
        );
    }
}
