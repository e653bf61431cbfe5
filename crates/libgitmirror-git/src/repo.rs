//! `git2` implementation of the engine's backend
//!
//! `GitRepo` wraps a non-bare repository. Inherent methods speak
//! [`GitError`]; the [`Backend`] impl at the bottom converts at the boundary.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Commit, Cred, CredentialType, Delta, DiffFindOptions, DiffOptions, ErrorCode,
    FileMode, Index, IndexAddOption, MergeOptions, Oid, PushOptions, RemoteCallbacks,
    Repository, RepositoryState, ResetType,
};
use libgitmirror_core::backend::{Backend, CommitRequest, MergeOutcome};
use libgitmirror_core::types::{BranchInfo, ChangeKind, CommitInfo, DiffEntry, Signature};
use libgitmirror_core::MirrorError;
use tracing::debug;

use crate::GitError;

/// Reflog message for branch updates made by the engine
const REFLOG_MESSAGE: &str = "gitmirror: position branch";

/// Credential attempts before a push gives up
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// A repository with a working tree
pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
}

impl GitRepo {
    /// Open the repository at `path`
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = Repository::open(path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                GitError::NotARepo
            } else {
                GitError::Git(e)
            }
        })?;
        Self::from_repository(repo)
    }

    /// Wrap an already opened repository
    pub fn from_repository(repo: Repository) -> Result<Self, GitError> {
        let root = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepo(repo.path().display().to_string()))?
            .to_path_buf();
        Ok(Self { repo, root })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn find_commit(&self, rev: &str) -> Result<Commit<'_>, GitError> {
        let object = self
            .repo
            .revparse_single(rev)
            .map_err(|e| revision_error(e, rev))?;
        object.peel_to_commit().map_err(|e| revision_error(e, rev))
    }

    fn commit_info(&self, rev: &str) -> Result<CommitInfo, GitError> {
        let commit = self.find_commit(rev)?;
        let author = commit.author();
        let committer = commit.committer();
        Ok(CommitInfo {
            hash: commit.id().to_string(),
            parents: commit.parent_ids().map(|oid| oid.to_string()).collect(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            author: from_git_signature(&author),
            committer: from_git_signature(&committer),
        })
    }

    fn list_branches(&self) -> Result<Vec<BranchInfo>, GitError> {
        let mut branches = Vec::new();
        for item in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = item?;
            let Some(name) = branch.name()? else { continue };
            if let Some(oid) = branch.get().target() {
                branches.push(BranchInfo {
                    name: name.to_string(),
                    tip: oid.to_string(),
                });
            }
        }
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    fn head_commit(&self) -> Result<Option<Commit<'_>>, GitError> {
        match self.repo.head() {
            Ok(reference) => Ok(Some(reference.peel_to_commit()?)),
            Err(e) if is_unborn(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn current_branch(&self) -> Result<Option<String>, GitError> {
        match self.repo.head() {
            Ok(reference) if reference.is_branch() => {
                Ok(reference.shorthand().map(str::to_string))
            }
            Ok(_) => Ok(None),
            Err(e) if is_unborn(&e) => {
                let head = self.repo.find_reference("HEAD")?;
                Ok(head
                    .symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .map(str::to_string))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn diff_entries(&self, rev: &str, parent: Option<&str>) -> Result<Vec<DiffEntry>, GitError> {
        let tree = self.find_commit(rev)?.tree()?;
        let parent_tree = match parent {
            Some(p) => Some(self.find_commit(p)?.tree()?),
            None => None,
        };

        let mut opts = DiffOptions::new();
        opts.include_typechange(true);
        let mut diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;

        let mut find = DiffFindOptions::new();
        find.renames(true).copies(true);
        diff.find_similar(Some(&mut find))?;

        let mut entries = Vec::new();
        for delta in diff.deltas() {
            let kind = match delta.status() {
                Delta::Added => ChangeKind::Add,
                Delta::Deleted => ChangeKind::Delete,
                Delta::Modified | Delta::Typechange => ChangeKind::Modify,
                Delta::Renamed => ChangeKind::Rename,
                Delta::Copied => ChangeKind::Copy,
                _ => continue,
            };
            // Submodule pointers have no content to copy
            if delta.old_file().mode() == FileMode::Commit || delta.new_file().mode() == FileMode::Commit {
                continue;
            }
            let old = delta.old_file().path();
            let new = delta.new_file().path();
            entries.push(DiffEntry {
                old_path: path_string(old.or(new))?,
                new_path: path_string(new.or(old))?,
                kind,
            });
        }

        debug!(rev = %rev, parent = ?parent, entries = entries.len(), "computed diff");
        Ok(entries)
    }

    fn file_at(&self, rev: &str, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        let tree = self.find_commit(rev)?.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = entry.to_object(&self.repo)?;
        Ok(object.as_blob().map(|blob| blob.content().to_vec()))
    }

    fn switch_branch(&self, name: &str) -> Result<(), GitError> {
        let refname = branch_ref(name);
        self.repo.set_head(&refname)?;
        if self.repo.find_reference(&refname).is_ok() {
            let mut checkout = CheckoutBuilder::new();
            checkout.force();
            self.repo.checkout_head(Some(&mut checkout))?;
        }
        debug!(branch = %name, "checked out branch");
        Ok(())
    }

    fn orphan_branch(&self, name: &str) -> Result<(), GitError> {
        let refname = branch_ref(name);
        self.repo.set_head(&refname)?;
        if let Ok(mut reference) = self.repo.find_reference(&refname) {
            reference.delete()?;
        }

        let mut index = self.repo.index()?;
        let tracked: Vec<String> = index
            .iter()
            .filter_map(|entry| String::from_utf8(entry.path).ok())
            .collect();
        for path in &tracked {
            remove_worktree_file(&self.root, path)?;
        }
        index.clear()?;
        index.write()?;

        debug!(branch = %name, removed = tracked.len(), "started orphan branch");
        Ok(())
    }

    fn hard_reset(&self, rev: &str) -> Result<(), GitError> {
        let commit = self.find_commit(rev)?;
        self.repo.reset(commit.as_object(), ResetType::Hard, None)?;
        Ok(())
    }

    fn set_branch(&self, name: &str, rev: &str) -> Result<(), GitError> {
        let oid = self.find_commit(rev)?.id();
        // A raw ref update also moves the checked-out branch, which
        // `Repository::branch` refuses to do.
        self.repo.reference(&branch_ref(name), oid, true, REFLOG_MESSAGE)?;
        Ok(())
    }

    fn remove_branch(&self, name: &str) -> Result<(), GitError> {
        let mut branch = self.repo.find_branch(name, BranchType::Local)?;
        branch.delete()?;
        debug!(branch = %name, "deleted branch");
        Ok(())
    }

    fn has_branch(&self, name: &str) -> Result<bool, GitError> {
        match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn containing_branches(&self, rev: &str) -> Result<Vec<String>, GitError> {
        let oid = self.find_commit(rev)?.id();
        let mut names = Vec::new();
        for branch in self.list_branches()? {
            let tip = Oid::from_str(&branch.tip)?;
            if tip == oid || self.repo.graph_descendant_of(tip, oid)? {
                names.push(branch.name);
            }
        }
        Ok(names)
    }

    fn commit_all(&self, request: &CommitRequest) -> Result<Option<String>, GitError> {
        let mut index = self.repo.index()?;

        // Conflicted paths are staged from whatever the working tree holds now.
        for path in conflict_paths(&index)? {
            let rel = Path::new(&path);
            if self.root.join(rel).exists() {
                index.add_path(rel)?;
            } else {
                index.remove_path(rel)?;
            }
        }
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        let head = self.head_commit()?;
        let merge_heads = self.merge_heads()?;

        if merge_heads.is_empty() {
            let unchanged = match &head {
                Some(commit) => commit.tree_id() == tree_oid,
                None => tree.is_empty(),
            };
            if unchanged {
                debug!("working tree unchanged, no commit");
                return Ok(None);
            }
        }

        let mut parents: Vec<Commit<'_>> = head.into_iter().collect();
        for oid in merge_heads {
            parents.push(self.repo.find_commit(oid)?);
        }
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();

        let author = to_git_signature(&request.author)?;
        let committer = to_git_signature(&request.committer)?;
        let oid = self.repo.commit(
            Some("HEAD"),
            &author,
            &committer,
            &request.message,
            &tree,
            &parent_refs,
        )?;
        self.repo.cleanup_state()?;

        debug!(commit = %oid, parents = parent_refs.len(), "created commit");
        Ok(Some(oid.to_string()))
    }

    /// Commits recorded in MERGE_HEAD; empty when no merge is in progress
    fn merge_heads(&self) -> Result<Vec<Oid>, GitError> {
        let mut heads = Vec::new();
        if self.repo.state() != RepositoryState::Merge {
            return Ok(heads);
        }
        // `mergehead_foreach` needs a mutable handle
        let mut handle = Repository::open(self.repo.path())?;
        handle.mergehead_foreach(|oid| {
            heads.push(*oid);
            true
        })?;
        Ok(heads)
    }

    fn merge_into_head(&self, name: &str) -> Result<MergeOutcome, GitError> {
        let branch = self.repo.find_branch(name, BranchType::Local)?;
        let annotated = self.repo.reference_to_annotated_commit(branch.get())?;

        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;
        if analysis.is_up_to_date() {
            return Ok(MergeOutcome::UpToDate);
        }

        let mut merge_opts = MergeOptions::new();
        let mut checkout = CheckoutBuilder::new();
        checkout.allow_conflicts(true).conflict_style_merge(true);
        self.repo
            .merge(&[&annotated], Some(&mut merge_opts), Some(&mut checkout))?;

        let conflicts = conflict_paths(&self.repo.index()?)?;
        debug!(branch = %name, conflicts = conflicts.len(), "merged branch");
        Ok(MergeOutcome::Merged { conflicts })
    }

    fn push_branches(&self, remote_name: &str) -> Result<(), GitError> {
        let refspecs: Vec<String> = self
            .list_branches()?
            .iter()
            .map(|b| format!("{0}:{0}", branch_ref(&b.name)))
            .collect();
        if refspecs.is_empty() {
            return Ok(());
        }

        let mut remote = self.repo.find_remote(remote_name)?;
        let config = self.repo.config()?;

        let push_error: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let push_error_clone = Rc::clone(&push_error);
        let attempts = Cell::new(0usize);

        let mut callbacks = RemoteCallbacks::new();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                *push_error_clone.borrow_mut() = Some(format!("{}: {}", refname, msg));
            }
            Ok(())
        });
        callbacks.credentials(move |url, username, allowed| {
            attempts.set(attempts.get() + 1);
            if attempts.get() > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }
            if allowed.contains(CredentialType::SSH_KEY) {
                if let Some(user) = username {
                    return Cred::ssh_key_from_agent(user);
                }
            }
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                return Cred::credential_helper(&config, url, username);
            }
            Cred::default()
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        remote.push(&refspecs, Some(&mut push_options))?;

        let error = push_error.borrow().clone();
        if let Some(error_msg) = error {
            return Err(GitError::Push(error_msg));
        }
        debug!(remote = %remote_name, branches = refspecs.len(), "pushed branches");
        Ok(())
    }
}

impl Backend for GitRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, rev: &str) -> Result<String, MirrorError> {
        Ok(self.find_commit(rev)?.id().to_string())
    }

    fn commit(&self, hash: &str) -> Result<CommitInfo, MirrorError> {
        Ok(self.commit_info(hash)?)
    }

    fn branches(&self) -> Result<Vec<BranchInfo>, MirrorError> {
        Ok(self.list_branches()?)
    }

    fn head(&self) -> Result<Option<String>, MirrorError> {
        Ok(self.head_commit()?.map(|c| c.id().to_string()))
    }

    fn head_branch(&self) -> Result<Option<String>, MirrorError> {
        Ok(self.current_branch()?)
    }

    fn diff(&self, hash: &str, parent: Option<&str>) -> Result<Vec<DiffEntry>, MirrorError> {
        Ok(self.diff_entries(hash, parent)?)
    }

    fn read_file(&self, hash: &str, path: &str) -> Result<Option<Vec<u8>>, MirrorError> {
        Ok(self.file_at(hash, path)?)
    }

    fn checkout_branch(&self, name: &str) -> Result<(), MirrorError> {
        Ok(self.switch_branch(name)?)
    }

    fn start_orphan(&self, name: &str) -> Result<(), MirrorError> {
        Ok(self.orphan_branch(name)?)
    }

    fn reset_hard(&self, hash: &str) -> Result<(), MirrorError> {
        Ok(self.hard_reset(hash)?)
    }

    fn create_branch(&self, name: &str, hash: &str) -> Result<(), MirrorError> {
        Ok(self.set_branch(name, hash)?)
    }

    fn delete_branch(&self, name: &str) -> Result<(), MirrorError> {
        Ok(self.remove_branch(name)?)
    }

    fn branch_exists(&self, name: &str) -> Result<bool, MirrorError> {
        Ok(self.has_branch(name)?)
    }

    fn branches_containing(&self, hash: &str) -> Result<Vec<String>, MirrorError> {
        Ok(self.containing_branches(hash)?)
    }

    fn commit_worktree(&self, request: &CommitRequest) -> Result<Option<String>, MirrorError> {
        Ok(self.commit_all(request)?)
    }

    fn merge_branch(&self, name: &str) -> Result<MergeOutcome, MirrorError> {
        Ok(self.merge_into_head(name)?)
    }

    fn push_all(&self, remote: &str) -> Result<(), MirrorError> {
        Ok(self.push_branches(remote)?)
    }
}

fn branch_ref(name: &str) -> String {
    format!("refs/heads/{}", name)
}

fn is_unborn(err: &git2::Error) -> bool {
    matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound)
}

fn revision_error(err: git2::Error, rev: &str) -> GitError {
    match err.code() {
        ErrorCode::NotFound | ErrorCode::InvalidSpec | ErrorCode::Ambiguous | ErrorCode::Peel => {
            GitError::RevisionNotFound(rev.to_string())
        }
        _ => GitError::Git(err),
    }
}

fn path_string(path: Option<&Path>) -> Result<String, GitError> {
    let path = path.ok_or_else(|| GitError::InvalidPath("<missing>".to_string()))?;
    path.to_str()
        .map(|s| s.replace('\\', "/"))
        .ok_or_else(|| GitError::InvalidPath(path.display().to_string()))
}

/// Remove a tracked file and any directories it leaves empty
fn remove_worktree_file(root: &Path, rel: &str) -> Result<(), GitError> {
    let full = root.join(rel);
    match std::fs::remove_file(&full) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }
    let mut dir = full.parent();
    while let Some(current) = dir {
        if current == root || std::fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
    Ok(())
}

fn conflict_paths(index: &Index) -> Result<Vec<String>, GitError> {
    let mut paths = Vec::new();
    if !index.has_conflicts() {
        return Ok(paths);
    }
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
        if let Some(entry) = entry {
            let path = String::from_utf8(entry.path)
                .map_err(|e| GitError::InvalidPath(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;
            paths.push(path);
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

fn from_git_signature(sig: &git2::Signature<'_>) -> Signature {
    let when = sig.when();
    Signature {
        name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
        email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
        time: when.seconds(),
        offset_minutes: when.offset_minutes(),
    }
}

fn to_git_signature(sig: &Signature) -> Result<git2::Signature<'static>, GitError> {
    let time = git2::Time::new(sig.time, sig.offset_minutes);
    Ok(git2::Signature::new(&sig.name, &sig.email, &time)?)
}
