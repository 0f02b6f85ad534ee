//! Read-only run planning.
//!
//! Reports, per global cache, release and channel, what the next run would
//! do, using only the local tree and the hash cache.

use std::path::{Path, PathBuf};

use nixipfs_core::{
    layout::{self, CHANNELS_DIR, RELEASES_DIR},
    policy::{NARINFO_FILES, NAR_FILES, RELEASE_FILES},
    ContentHash, FileSelector, HashCache, LocalLayout, RemotePath,
};

use crate::error::SyncError;
use crate::lister::{self, dir_name};
use crate::pipeline::TargetKind;
use crate::release::read_marker;

/// What the next run does with a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanState {
    /// Files will be uploaded (or taken from the cache) and assembled.
    Upload,
    /// A publish marker exists; the recorded hash will be copied.
    Republish { hash: ContentHash },
}

/// Plan for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlan {
    pub kind: TargetKind,
    pub name: String,
    pub local: PathBuf,
    /// Destination relative to the run namespace.
    pub remote: RemotePath,
    pub state: PlanState,
    /// Files the allow-lists select.
    pub selected: usize,
    /// Selected files whose hash is already in the hash cache.
    pub cached: usize,
}

impl TargetPlan {
    /// Files that would actually be sent to the backend.
    pub fn pending_uploads(&self) -> usize {
        match self.state {
            PlanState::Upload => self.selected - self.cached,
            PlanState::Republish { .. } => 0,
        }
    }
}

/// Plan a run over `layout`.
pub fn plan_at(layout: &LocalLayout, cache: &HashCache) -> Result<Vec<TargetPlan>, SyncError> {
    let mut plans = Vec::new();

    if lister::exists(&layout::binary_cache_dir(layout.root()))? {
        let (selected, cached) = count_binary_cache(layout.root(), cache)?;
        plans.push(TargetPlan {
            kind: TargetKind::GlobalCache,
            name: layout::BINARY_CACHE_DIR.to_string(),
            local: layout::binary_cache_dir(layout.root()),
            remote: RemotePath::new(layout::BINARY_CACHE_DIR),
            state: PlanState::Upload,
            selected,
            cached,
        });
    }

    for family in lister::list_dirs_if_present(&layout.releases_dir())? {
        let family_name = dir_name(&family);
        for release in lister::list_dirs(&family)? {
            let release_name = dir_name(&release);
            let remote = RemotePath::new(RELEASES_DIR)
                .join(&family_name)
                .join(&release_name);
            plans.push(plan_target(
                TargetKind::Release,
                format!("{family_name}/{release_name}"),
                &release,
                remote,
                cache,
            )?);
        }
    }

    for channel in lister::list_dirs_if_present(&layout.channels_dir())? {
        let name = dir_name(&channel);
        let remote = RemotePath::new(CHANNELS_DIR).join(&name);
        plans.push(plan_target(TargetKind::Channel, name, &channel, remote, cache)?);
    }

    Ok(plans)
}

fn plan_target(
    kind: TargetKind,
    name: String,
    local: &Path,
    remote: RemotePath,
    cache: &HashCache,
) -> Result<TargetPlan, SyncError> {
    let state = match read_marker(local)? {
        Some(hash) => PlanState::Republish { hash },
        None => PlanState::Upload,
    };
    let (mut selected, mut cached) = count_selected(local, &RELEASE_FILES, cache)?;
    let (cache_selected, cache_cached) = count_binary_cache(local, cache)?;
    selected += cache_selected;
    cached += cache_cached;

    Ok(TargetPlan {
        kind,
        name,
        local: local.to_path_buf(),
        remote,
        state,
        selected,
        cached,
    })
}

fn count_binary_cache(dir: &Path, cache: &HashCache) -> Result<(usize, usize), SyncError> {
    let (narinfo_selected, narinfo_cached) =
        count_selected(&layout::binary_cache_dir(dir), &NARINFO_FILES, cache)?;
    let (nar_selected, nar_cached) = count_selected(&layout::nar_dir(dir), &NAR_FILES, cache)?;
    Ok((narinfo_selected + nar_selected, narinfo_cached + nar_cached))
}

/// `(selected, cached)` for one directory; a missing directory counts as empty.
fn count_selected(
    dir: &Path,
    selector: &FileSelector,
    cache: &HashCache,
) -> Result<(usize, usize), SyncError> {
    if !lister::exists(dir)? {
        return Ok((0, 0));
    }
    let selected = lister::select_files(dir, selector)?;
    let cached = selected
        .iter()
        .filter(|name| selector.is_cacheable(name) && cache.contains(name))
        .count();
    Ok((selected.len(), cached))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::write_marker;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn plans_global_cache_releases_and_channels() {
        let root = TempDir::new().unwrap();
        let layout = LocalLayout::new(root.path());
        let nar = layout::nar_dir(root.path());
        fs::create_dir_all(&nar).unwrap();
        fs::write(nar.join("a.nar.xz"), "a").unwrap();
        fs::write(nar.join("b.nar.xz"), "b").unwrap();

        let release = layout.releases_dir().join("21.05").join("x86_64");
        fs::create_dir_all(&release).unwrap();
        fs::write(release.join("git-revision"), "abc").unwrap();
        fs::write(release.join("nixos.iso"), "iso").unwrap();

        let channel = layout.channels_dir().join("nixos-unstable");
        fs::create_dir_all(&channel).unwrap();
        write_marker(&channel, &ContentHash::from("QmChannel")).unwrap();

        let mut cache = HashCache::new();
        cache.insert("a.nar.xz", ContentHash::from("QmA"));
        cache.insert("nixos.iso", ContentHash::from("QmIso"));

        let plans = plan_at(&layout, &cache).unwrap();
        assert_eq!(plans.len(), 3);

        assert_eq!(plans[0].kind, TargetKind::GlobalCache);
        assert_eq!((plans[0].selected, plans[0].cached), (2, 1));
        assert_eq!(plans[0].pending_uploads(), 1);

        assert_eq!(plans[1].name, "21.05/x86_64");
        assert_eq!(plans[1].remote.as_str(), "/releases/21.05/x86_64");
        assert_eq!(plans[1].state, PlanState::Upload);
        assert_eq!((plans[1].selected, plans[1].cached), (2, 1));

        assert_eq!(plans[2].kind, TargetKind::Channel);
        assert_eq!(
            plans[2].state,
            PlanState::Republish {
                hash: ContentHash::from("QmChannel")
            }
        );
        assert_eq!(plans[2].pending_uploads(), 0);
    }

    #[test]
    fn empty_root_has_empty_plan() {
        let root = TempDir::new().unwrap();
        let plans = plan_at(&LocalLayout::new(root.path()), &HashCache::new()).unwrap();
        assert!(plans.is_empty());
    }
}
