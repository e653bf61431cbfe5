//! Applying filtered changes to the mirror working tree

use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::backend::Backend;
use crate::error::MirrorError;
use crate::filter::AllowList;
use crate::types::{ChangeKind, DiffEntry};

/// Counts of working-tree mutations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub written: usize,
    pub removed: usize,
}

/// Copies standard content into the mirror working tree
pub struct ChangeApplier<'a> {
    standard: &'a dyn Backend,
    mirror_root: &'a Path,
    allow: &'a AllowList,
}

impl<'a> ChangeApplier<'a> {
    pub fn new(standard: &'a dyn Backend, mirror_root: &'a Path, allow: &'a AllowList) -> Self {
        Self {
            standard,
            mirror_root,
            allow,
        }
    }

    /// Apply in-scope entries of `commit` to the mirror working tree.
    /// Endpoints outside the allow-list are never touched.
    pub fn apply(&self, commit: &str, entries: &[DiffEntry]) -> Result<ApplyStats, MirrorError> {
        let mut stats = ApplyStats::default();

        for entry in entries {
            debug!(
                kind = entry.kind.as_str(),
                old = %entry.old_path,
                new = %entry.new_path,
                "applying change"
            );
            match entry.kind {
                ChangeKind::Add | ChangeKind::Modify | ChangeKind::Copy => {
                    if self.allow.contains(&entry.new_path) {
                        self.copy_from_standard(commit, &entry.new_path)?;
                        stats.written += 1;
                    }
                }
                ChangeKind::Delete => {
                    if self.allow.contains(&entry.old_path) {
                        remove_file(self.mirror_root, &entry.old_path)?;
                        stats.removed += 1;
                    }
                }
                ChangeKind::Rename => {
                    if self.allow.contains(&entry.new_path) {
                        self.copy_from_standard(commit, &entry.new_path)?;
                        stats.written += 1;
                    }
                    if entry.old_path != entry.new_path && self.allow.contains(&entry.old_path) {
                        remove_file(self.mirror_root, &entry.old_path)?;
                        stats.removed += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    fn copy_from_standard(&self, commit: &str, path: &str) -> Result<(), MirrorError> {
        let content = self.standard.read_file(commit, path)?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist at standard commit {}", path, commit),
            )
        })?;
        write_file(self.mirror_root, path, &content)
    }
}

/// Join a repository-relative path onto a root, refusing to escape it
pub fn repo_path(root: &Path, rel: &str) -> Result<PathBuf, MirrorError> {
    let rel_path = Path::new(rel);
    let escapes = rel.is_empty()
        || rel_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing path outside the repository: '{}'", rel),
        )
        .into());
    }
    Ok(root.join(rel_path))
}

/// Write a file, replacing whatever occupies the path or its parents
pub fn write_file(root: &Path, rel: &str, content: &[u8]) -> Result<(), MirrorError> {
    let target = repo_path(root, rel)?;

    // A file may stand where a directory is now needed, and vice versa.
    let mut ancestor = target.parent();
    while let Some(dir) = ancestor {
        if dir == root {
            break;
        }
        if dir.is_file() {
            std::fs::remove_file(dir)?;
        }
        ancestor = dir.parent();
    }
    if target.is_dir() {
        std::fs::remove_dir_all(&target)?;
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, content)?;
    Ok(())
}

/// Remove a file and prune directories it leaves empty
pub fn remove_file(root: &Path, rel: &str) -> Result<(), MirrorError> {
    let target = repo_path(root, rel)?;

    if target.is_dir() {
        std::fs::remove_dir_all(&target)?;
    } else {
        match std::fs::remove_file(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    let mut dir = target.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        let is_empty = match std::fs::read_dir(current) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => break,
        };
        if !is_empty {
            break;
        }
        std::fs::remove_dir(current)?;
        dir = current.parent();
    }
    Ok(())
}
