//! Version-control capabilities the engine consumes
//!
//! The engine never talks to a VCS library directly. Everything it needs from
//! a repository goes through [`Backend`]; `libgitmirror-git` provides the
//! `git2` implementation.

use std::path::Path;

use crate::error::MirrorError;
use crate::types::{BranchInfo, CommitInfo, DiffEntry, Signature};

/// Metadata preserved on a replayed commit
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

/// Result of merging a branch into the checked-out branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The branch is already contained in HEAD; nothing was changed
    UpToDate,
    /// A merge is in progress; listed paths are left in conflict
    Merged { conflicts: Vec<String> },
}

/// Repository operations used by the replication engine
pub trait Backend {
    /// Root of the working tree
    fn root(&self) -> &Path;

    /// Resolve a revision (hash, branch, `HEAD`) to a full commit hash
    fn resolve(&self, rev: &str) -> Result<String, MirrorError>;

    /// Look up a commit by full hash; `CommitNotFound` if absent
    fn commit(&self, hash: &str) -> Result<CommitInfo, MirrorError>;

    /// All local branches, sorted by name
    fn branches(&self) -> Result<Vec<BranchInfo>, MirrorError>;

    /// Commit HEAD points to; `None` on an unborn branch
    fn head(&self) -> Result<Option<String>, MirrorError>;

    /// Branch HEAD points to, if HEAD is attached
    fn head_branch(&self) -> Result<Option<String>, MirrorError>;

    /// Changes from `parent` (or the empty tree) to `hash`
    fn diff(&self, hash: &str, parent: Option<&str>) -> Result<Vec<DiffEntry>, MirrorError>;

    /// File content at a commit; `None` if the path does not exist there
    fn read_file(&self, hash: &str, path: &str) -> Result<Option<Vec<u8>>, MirrorError>;

    /// Point HEAD at a branch and update the working tree. A missing branch
    /// leaves HEAD on an unborn branch of that name.
    fn checkout_branch(&self, name: &str) -> Result<(), MirrorError>;

    /// Point HEAD at an unborn branch with an empty index, removing tracked
    /// files from the working tree. An existing branch of that name is
    /// deleted.
    fn start_orphan(&self, name: &str) -> Result<(), MirrorError>;

    /// Reset index and working tree to a commit, moving the current branch
    fn reset_hard(&self, hash: &str) -> Result<(), MirrorError>;

    /// Create a branch at a commit, moving it if it already exists
    fn create_branch(&self, name: &str, hash: &str) -> Result<(), MirrorError>;

    fn delete_branch(&self, name: &str) -> Result<(), MirrorError>;

    fn branch_exists(&self, name: &str) -> Result<bool, MirrorError>;

    /// Branches whose tip is the commit or one of its descendants
    fn branches_containing(&self, hash: &str) -> Result<Vec<String>, MirrorError>;

    /// Commit the working tree onto HEAD, completing any merge in progress.
    /// Returns `None` when nothing changed.
    fn commit_worktree(&self, request: &CommitRequest) -> Result<Option<String>, MirrorError>;

    /// Merge a local branch into the checked-out branch
    fn merge_branch(&self, name: &str) -> Result<MergeOutcome, MirrorError>;

    /// Push every local branch to a remote
    fn push_all(&self, remote: &str) -> Result<(), MirrorError>;
}
