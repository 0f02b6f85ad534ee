//! Hash cache load/persist contract and error-message tests.

use assert_fs::prelude::*;
use nixipfs_core::{ContentHash, CoreError, HashCache, LocalLayout};
use predicates::prelude::*;

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

#[test]
fn load_reads_existing_two_column_file() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("ipfs_hashes")
        .write_str("nixos-minimal-21.05.iso:QmIso\nsha256-abc.narinfo:QmInfo\n")
        .expect("write");

    let layout = LocalLayout::new(root.path());
    let cache = HashCache::load_at(&layout.hash_cache_path()).expect("load");
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("nixos-minimal-21.05.iso"), Some(&ContentHash::from("QmIso")));
    assert_eq!(cache.get("sha256-abc.narinfo"), Some(&ContentHash::from("QmInfo")));
}

#[test]
fn load_malformed_record_reports_path_and_line() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("ipfs_hashes")
        .write_str("a.nar:QmA\nno-delimiter-here\n")
        .expect("write");

    let err = HashCache::load_at(&root.path().join("ipfs_hashes")).unwrap_err();
    assert!(matches!(err, CoreError::CacheParse { line: 2, .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("ipfs_hashes:2"), "must contain path and line, got: {msg}");
}

#[test]
fn load_directory_in_place_of_file_is_io_error() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("ipfs_hashes").create_dir_all().expect("mkdir");

    let err = HashCache::load_at(&root.path().join("ipfs_hashes")).unwrap_err();
    assert!(matches!(err, CoreError::Io { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Persist
// ---------------------------------------------------------------------------

#[test]
fn persist_overwrites_previous_file_wholesale() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let file = root.child("ipfs_hashes");
    file.write_str("stale.nar:QmStale\n").expect("write");

    let mut cache = HashCache::new();
    cache.insert("fresh.nar", ContentHash::from("QmFresh"));
    cache.persist_at(file.path()).expect("persist");

    let disk = std::fs::read_to_string(file.path()).expect("read");
    assert_eq!(disk, "fresh.nar:QmFresh\n");
}

#[test]
fn persist_writes_each_entry_exactly_once() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let file = root.child("ipfs_hashes");

    let mut cache = HashCache::new();
    cache.insert("a.narinfo", ContentHash::from("QmOld"));
    cache.insert("a.narinfo", ContentHash::from("QmNew"));
    cache.insert("b.narinfo", ContentHash::from("QmB"));
    cache.persist_at(file.path()).expect("persist");

    let disk = std::fs::read_to_string(file.path()).expect("read");
    assert_eq!(disk.lines().count(), 2);
    assert_eq!(disk.matches("a.narinfo").count(), 1);
    assert!(disk.contains("a.narinfo:QmNew"));
}

#[test]
fn persist_creates_missing_parent_directory() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let nested = root.child("not").child("yet").child("ipfs_hashes");

    HashCache::new().persist_at(nested.path()).expect("persist");
    nested.assert(predicate::path::exists());
}
