//! In-process content-addressed backend.
//!
//! Blobs and directories are addressed by SHA-256, so identical content or
//! identical trees always get identical hashes. The mutable tree follows the
//! same rules as the IPFS files API: `mkdir` without `parents` needs an
//! existing parent, and `copy` without `overwrite` refuses an existing
//! destination. Every call is counted for tests that assert on backend
//! traffic.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::sync::{Mutex, MutexGuard};

use sha2::{Digest, Sha256};

use nixipfs_core::{ContentHash, PublishedName, RemotePath};

use crate::backend::{Backend, Content};
use crate::error::BackendError;

/// Name returned by [`MemoryBackend::publish`].
pub const MEMORY_PUBLISH_NAME: &str = "k51memorybackend";

/// Number of calls made per capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub add: usize,
    pub mkdir: usize,
    pub copy: usize,
    pub stat: usize,
    pub flush: usize,
    pub pin: usize,
    pub publish: usize,
}

#[derive(Debug, Clone)]
enum Object {
    Blob(Vec<u8>),
    Dir(BTreeMap<String, ContentHash>),
}

#[derive(Debug, Clone)]
enum Node {
    File(ContentHash),
    Dir(BTreeMap<String, Node>),
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ContentHash, Object>,
    root: BTreeMap<String, Node>,
    pins: HashSet<ContentHash>,
    published: Option<ContentHash>,
    copies: Vec<(ContentHash, RemotePath)>,
    added: Vec<String>,
    counts: CallCounts,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn counts(&self) -> CallCounts {
        self.lock().counts.clone()
    }

    /// Zero the call counters, keeping all stored content.
    pub fn reset_counts(&self) {
        let mut state = self.lock();
        state.counts = CallCounts::default();
        state.copies.clear();
        state.added.clear();
    }

    /// Every `(source, dest)` pair passed to `copy`, in call order.
    pub fn copies(&self) -> Vec<(ContentHash, RemotePath)> {
        self.lock().copies.clone()
    }

    /// Names passed to `add`, in call order.
    pub fn added(&self) -> Vec<String> {
        self.lock().added.clone()
    }

    pub fn is_pinned(&self, hash: &ContentHash) -> bool {
        self.lock().pins.contains(hash)
    }

    pub fn published(&self) -> Option<ContentHash> {
        self.lock().published.clone()
    }

    /// Content of the file at `path` in the mutable tree.
    pub fn read_file(&self, path: &RemotePath) -> Option<Vec<u8>> {
        let state = self.lock();
        match node_at(&state.root, &path.segments())? {
            NodeRef::File(hash) => match state.objects.get(hash) {
                Some(Object::Blob(data)) => Some(data.clone()),
                _ => None,
            },
            NodeRef::Dir(_) => None,
        }
    }

    /// Sorted entry names of the directory at `path`.
    pub fn list(&self, path: &RemotePath) -> Option<Vec<String>> {
        let state = self.lock();
        match node_at(&state.root, &path.segments())? {
            NodeRef::Dir(children) => Some(children.keys().cloned().collect()),
            NodeRef::File(_) => None,
        }
    }
}

impl Backend for MemoryBackend {
    fn add(&self, name: &str, mut content: Content) -> Result<ContentHash, BackendError> {
        let mut data = Vec::new();
        content
            .read_to_end(&mut data)
            .map_err(|source| BackendError::Read {
                name: name.to_string(),
                source,
            })?;
        let hash = blob_hash(&data);

        let mut state = self.lock();
        state.counts.add += 1;
        state.added.push(name.to_string());
        state.objects.insert(hash.clone(), Object::Blob(data));
        Ok(hash)
    }

    fn mkdir(&self, path: &RemotePath, parents: bool) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.counts.mkdir += 1;

        let segments = path.segments();
        let Some((last, ancestors)) = segments.split_last() else {
            return if parents {
                Ok(())
            } else {
                Err(already_exists(path))
            };
        };

        let mut dir = &mut state.root;
        for seg in ancestors {
            if !dir.contains_key(*seg) {
                if !parents {
                    return Err(not_found(&path.parent()));
                }
                dir.insert(seg.to_string(), Node::Dir(BTreeMap::new()));
            }
            dir = match dir.get_mut(*seg) {
                Some(Node::Dir(children)) => children,
                _ => return Err(not_a_directory(path)),
            };
        }

        if let Some(existing) = dir.get(*last) {
            return match existing {
                Node::Dir(_) if parents => Ok(()),
                _ => Err(already_exists(path)),
            };
        }
        dir.insert(last.to_string(), Node::Dir(BTreeMap::new()));
        Ok(())
    }

    fn copy(
        &self,
        source: &ContentHash,
        dest: &RemotePath,
        overwrite: bool,
    ) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.counts.copy += 1;
        state.copies.push((source.clone(), dest.clone()));

        let node = materialize(&state.objects, source)?;
        let segments = dest.segments();
        let Some((last, ancestors)) = segments.split_last() else {
            return Err(already_exists(dest));
        };
        let dir = dir_mut(&mut state.root, ancestors, &dest.parent())?;
        if dir.contains_key(*last) && !overwrite {
            return Err(already_exists(dest));
        }
        dir.insert(last.to_string(), node);
        Ok(())
    }

    fn stat(&self, path: &RemotePath) -> Result<ContentHash, BackendError> {
        let mut guard = self.lock();
        guard.counts.stat += 1;

        let state = &mut *guard;
        let segments = path.segments();
        match node_at(&state.root, &segments).ok_or_else(|| not_found(path))? {
            NodeRef::File(hash) => Ok(hash.clone()),
            NodeRef::Dir(children) => Ok(store_dir(&mut state.objects, children)),
        }
    }

    fn flush(&self, path: &RemotePath) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.counts.flush += 1;
        node_at(&state.root, &path.segments())
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn pin(&self, hash: &ContentHash) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.counts.pin += 1;
        if !state.objects.contains_key(hash) {
            return Err(unknown_hash(hash));
        }
        state.pins.insert(hash.clone());
        Ok(())
    }

    fn publish(&self, hash: &ContentHash) -> Result<PublishedName, BackendError> {
        let mut state = self.lock();
        state.counts.publish += 1;
        if !state.objects.contains_key(hash) {
            return Err(unknown_hash(hash));
        }
        state.published = Some(hash.clone());
        Ok(PublishedName {
            name: MEMORY_PUBLISH_NAME.to_string(),
            value: hash.ipfs_path(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tree helpers
// ---------------------------------------------------------------------------

enum NodeRef<'a> {
    File(&'a ContentHash),
    Dir(&'a BTreeMap<String, Node>),
}

fn node_at<'a>(root: &'a BTreeMap<String, Node>, segments: &[&str]) -> Option<NodeRef<'a>> {
    let mut current = NodeRef::Dir(root);
    for seg in segments {
        current = match current {
            NodeRef::Dir(children) => match children.get(*seg)? {
                Node::File(hash) => NodeRef::File(hash),
                Node::Dir(grandchildren) => NodeRef::Dir(grandchildren),
            },
            NodeRef::File(_) => return None,
        };
    }
    Some(current)
}

fn dir_mut<'a>(
    mut dir: &'a mut BTreeMap<String, Node>,
    segments: &[&str],
    full: &RemotePath,
) -> Result<&'a mut BTreeMap<String, Node>, BackendError> {
    for seg in segments {
        dir = match dir.get_mut(*seg) {
            Some(Node::Dir(children)) => children,
            Some(Node::File(_)) => return Err(not_a_directory(full)),
            None => return Err(not_found(full)),
        };
    }
    Ok(dir)
}

/// Rebuild a mutable node from stored content.
fn materialize(
    objects: &HashMap<ContentHash, Object>,
    hash: &ContentHash,
) -> Result<Node, BackendError> {
    match objects.get(hash) {
        Some(Object::Blob(_)) => Ok(Node::File(hash.clone())),
        Some(Object::Dir(entries)) => {
            let mut children = BTreeMap::new();
            for (name, child) in entries {
                children.insert(name.clone(), materialize(objects, child)?);
            }
            Ok(Node::Dir(children))
        }
        None => Err(unknown_hash(hash)),
    }
}

/// Hash a mutable directory, storing it (and every subdirectory) as content.
fn store_dir(
    objects: &mut HashMap<ContentHash, Object>,
    children: &BTreeMap<String, Node>,
) -> ContentHash {
    let mut entries = BTreeMap::new();
    for (name, node) in children {
        let hash = match node {
            Node::File(hash) => hash.clone(),
            Node::Dir(grandchildren) => store_dir(objects, grandchildren),
        };
        entries.insert(name.clone(), hash);
    }
    let hash = dir_hash(&entries);
    objects.insert(hash.clone(), Object::Dir(entries));
    hash
}

fn blob_hash(data: &[u8]) -> ContentHash {
    let mut h = Sha256::new();
    h.update(b"blob\0");
    h.update(data);
    ContentHash::from(format!("mem-{}", hex::encode(h.finalize())))
}

fn dir_hash(entries: &BTreeMap<String, ContentHash>) -> ContentHash {
    let mut h = Sha256::new();
    h.update(b"dir\0");
    for (name, hash) in entries {
        h.update(name.as_bytes());
        h.update(b"\0");
        h.update(hash.as_str().as_bytes());
        h.update(b"\n");
    }
    ContentHash::from(format!("mem-{}", hex::encode(h.finalize())))
}

fn not_found(path: &RemotePath) -> BackendError {
    BackendError::NotFound {
        path: path.to_string(),
    }
}

fn already_exists(path: &RemotePath) -> BackendError {
    BackendError::AlreadyExists {
        path: path.to_string(),
    }
}

fn not_a_directory(path: &RemotePath) -> BackendError {
    BackendError::NotADirectory {
        path: path.to_string(),
    }
}

fn unknown_hash(hash: &ContentHash) -> BackendError {
    BackendError::UnknownHash {
        hash: hash.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(backend: &MemoryBackend, name: &str, data: &str) -> ContentHash {
        backend
            .add(name, Box::new(std::io::Cursor::new(data.to_string())))
            .unwrap()
    }

    #[test]
    fn identical_content_gets_identical_hash() {
        let backend = MemoryBackend::new();
        let a = add(&backend, "a", "same");
        let b = add(&backend, "b", "same");
        let c = add(&backend, "c", "different");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(backend.counts().add, 3);
    }

    #[test]
    fn mkdir_without_parents_requires_parent() {
        let backend = MemoryBackend::new();
        let err = backend
            .mkdir(&RemotePath::new("/a/b"), false)
            .expect_err("parent missing");
        assert!(matches!(err, BackendError::NotFound { .. }));

        backend.mkdir(&RemotePath::new("/a/b"), true).unwrap();
        backend.mkdir(&RemotePath::new("/a/b/c"), false).unwrap();
        assert_eq!(backend.list(&RemotePath::new("/a/b")).unwrap(), vec!["c"]);
    }

    #[test]
    fn mkdir_existing_is_error_only_without_parents() {
        let backend = MemoryBackend::new();
        backend.mkdir(&RemotePath::new("/a"), false).unwrap();
        backend.mkdir(&RemotePath::new("/a"), true).unwrap();
        let err = backend.mkdir(&RemotePath::new("/a"), false).unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists { .. }));
    }

    #[test]
    fn copy_refuses_existing_destination_without_overwrite() {
        let backend = MemoryBackend::new();
        let hash = add(&backend, "f", "content");
        let dest = RemotePath::new("/f");
        backend.copy(&hash, &dest, false).unwrap();
        let err = backend.copy(&hash, &dest, false).unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists { .. }));
        backend.copy(&hash, &dest, true).unwrap();
        assert_eq!(backend.read_file(&dest).unwrap(), b"content");
    }

    #[test]
    fn copy_of_unknown_hash_fails() {
        let backend = MemoryBackend::new();
        let err = backend
            .copy(&ContentHash::from("QmMissing"), &RemotePath::new("/x"), false)
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownHash { .. }));
    }

    #[test]
    fn stat_of_copied_directory_matches_original() {
        let backend = MemoryBackend::new();
        let hash = add(&backend, "f", "content");
        backend.mkdir(&RemotePath::new("/src/dir"), true).unwrap();
        backend
            .copy(&hash, &RemotePath::new("/src/dir/f"), false)
            .unwrap();
        let dir_hash = backend.stat(&RemotePath::new("/src")).unwrap();

        backend.copy(&dir_hash, &RemotePath::new("/dst"), false).unwrap();
        assert_eq!(backend.stat(&RemotePath::new("/dst")).unwrap(), dir_hash);
        assert_eq!(
            backend.read_file(&RemotePath::new("/dst/dir/f")).unwrap(),
            b"content"
        );
    }

    #[test]
    fn empty_directories_share_a_hash() {
        let backend = MemoryBackend::new();
        backend.mkdir(&RemotePath::new("/a"), false).unwrap();
        backend.mkdir(&RemotePath::new("/b"), false).unwrap();
        assert_eq!(
            backend.stat(&RemotePath::new("/a")).unwrap(),
            backend.stat(&RemotePath::new("/b")).unwrap()
        );
    }

    #[test]
    fn pin_and_publish_require_known_content() {
        let backend = MemoryBackend::new();
        assert!(backend.pin(&ContentHash::from("nope")).is_err());

        backend.mkdir(&RemotePath::new("/root"), false).unwrap();
        let hash = backend.stat(&RemotePath::new("/root")).unwrap();
        backend.pin(&hash).unwrap();
        let published = backend.publish(&hash).unwrap();
        assert!(backend.is_pinned(&hash));
        assert_eq!(backend.published(), Some(hash.clone()));
        assert_eq!(published.value, hash.ipfs_path());
        assert_eq!(published.name, MEMORY_PUBLISH_NAME);
    }

    #[test]
    fn flush_of_missing_path_fails() {
        let backend = MemoryBackend::new();
        assert!(backend.flush(&RemotePath::root()).is_ok());
        assert!(backend.flush(&RemotePath::new("/missing")).is_err());
    }
}
