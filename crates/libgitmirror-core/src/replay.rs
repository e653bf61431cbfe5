//! Replaying plan units into the mirror
//!
//! Each unit goes through one of three paths:
//!
//! - RESUME_POINT: point its branch at the known mirror commit and reset
//! - SIMPLE: diff, filter, apply, commit (or skip when nothing is in scope)
//! - MERGE: merge the secondary lineage into the primary, resolving every
//!   conflict through the configured [`ConflictPolicy`]
//!
//! Any backend failure aborts the run.

use tracing::{debug, info};

use crate::apply::{remove_file, write_file, ChangeApplier};
use crate::backend::{Backend, CommitRequest, MergeOutcome};
use crate::conflict::{ConflictContext, ConflictPolicy, Resolution};
use crate::error::MirrorError;
use crate::filter::AllowList;
use crate::marker;
use crate::plan::{Outcome, ReplayKind, ReplayPlan};
use crate::types::CommitInfo;

/// Turns plan units into mirror commits
pub struct Replayer<'a> {
    standard: &'a dyn Backend,
    mirror: &'a dyn Backend,
    allow: &'a AllowList,
    policy: &'a dyn ConflictPolicy,
}

impl<'a> Replayer<'a> {
    pub fn new(
        standard: &'a dyn Backend,
        mirror: &'a dyn Backend,
        allow: &'a AllowList,
        policy: &'a dyn ConflictPolicy,
    ) -> Self {
        Self {
            standard,
            mirror,
            allow,
            policy,
        }
    }

    /// Replay every pending unit in plan order
    pub fn replay_all(&self, plan: &mut ReplayPlan) -> Result<(), MirrorError> {
        for index in 0..plan.len() {
            if !plan.unit(index).is_applied() {
                self.replay(plan, index)?;
            }
        }
        Ok(())
    }

    /// Replay one unit and move it to APPLIED
    pub fn replay(&self, plan: &mut ReplayPlan, index: usize) -> Result<(), MirrorError> {
        let unit = plan.unit(index);
        let commit = unit.commit.clone();
        let branch = unit.branch.clone();

        let outcome = match unit.kind {
            ReplayKind::ResumePoint => {
                let known = unit
                    .known_mirror
                    .clone()
                    .ok_or_else(|| MirrorError::CommitNotFound(commit.hash.clone()))?;
                self.resume(&branch, &known)?
            }
            ReplayKind::Simple => {
                let snapshot = unit.snapshot;
                self.simple(plan, &commit, &branch, snapshot)?
            }
            ReplayKind::Merge => self.merge(plan, &commit, &branch)?,
        };

        info!(
            standard = %commit.short_hash(),
            branch = %branch,
            outcome = ?outcome,
            summary = commit.summary(),
            "replayed commit"
        );
        plan.apply(index, outcome);
        Ok(())
    }

    fn resume(&self, branch: &str, mirror_hash: &str) -> Result<Outcome, MirrorError> {
        self.mirror.create_branch(branch, mirror_hash)?;
        self.mirror.checkout_branch(branch)?;
        self.mirror.reset_hard(mirror_hash)?;
        Ok(Outcome::Resumed(mirror_hash.to_string()))
    }

    fn simple(
        &self,
        plan: &ReplayPlan,
        commit: &CommitInfo,
        branch: &str,
        snapshot: bool,
    ) -> Result<Outcome, MirrorError> {
        let parent = commit.primary_parent();
        // The root snapshot builds on whatever the mirror already holds
        let parent_mirror = if snapshot {
            self.mirror.head()?
        } else {
            parent
                .and_then(|p| plan.mirror_hash_of(p))
                .map(str::to_string)
        };

        let base = if snapshot { None } else { parent };
        let entries = self.allow.filter(self.standard.diff(&commit.hash, base)?);
        if entries.is_empty() {
            debug!(standard = %commit.short_hash(), "nothing in scope, skipping");
            return Ok(Outcome::Skipped(parent_mirror));
        }

        self.position(branch, parent_mirror.as_deref())?;
        let applier = ChangeApplier::new(self.standard, self.mirror.root(), self.allow);
        let stats = applier.apply(&commit.hash, &entries)?;
        debug!(written = stats.written, removed = stats.removed, "applied changes");

        match self.mirror.commit_worktree(&commit_request(commit))? {
            Some(hash) => Ok(Outcome::Committed(hash)),
            None => Ok(Outcome::Skipped(parent_mirror)),
        }
    }

    fn merge(
        &self,
        plan: &ReplayPlan,
        commit: &CommitInfo,
        branch: &str,
    ) -> Result<Outcome, MirrorError> {
        let primary = commit.parents[0].as_str();
        let secondary = commit.parents[1].as_str();
        let primary_mirror = plan.mirror_hash_of(primary).map(str::to_string);
        let secondary_mirror = plan.mirror_hash_of(secondary).map(str::to_string);

        let (Some(primary_mirror), Some(secondary_mirror)) = (primary_mirror, secondary_mirror) else {
            info!(
                standard = %commit.short_hash(),
                "merge skipped: a parent lineage is not present in the mirror"
            );
            return Ok(Outcome::Skipped(plan.mirror_hash_of(primary).map(str::to_string)));
        };

        let secondary_branch = plan.secondary_branch(branch, secondary);

        self.position(branch, Some(&primary_mirror))?;
        self.mirror.create_branch(&secondary_branch, &secondary_mirror)?;

        let conflicts = match self.mirror.merge_branch(&secondary_branch)? {
            MergeOutcome::UpToDate => {
                debug!(
                    standard = %commit.short_hash(),
                    secondary = %secondary_branch,
                    "secondary already contained in primary, skipping"
                );
                return Ok(Outcome::Skipped(Some(primary_mirror)));
            }
            MergeOutcome::Merged { conflicts } => conflicts,
        };

        if !conflicts.is_empty() {
            let ctx = ConflictContext {
                standard: self.standard,
                mirror: self.mirror,
                standard_commit: &commit.hash,
                mirror_primary: &primary_mirror,
                allow: self.allow,
            };
            for path in &conflicts {
                let resolution = self.policy.resolve(&ctx, path)?;
                info!(
                    path = %path,
                    policy = self.policy.name(),
                    deleted = matches!(resolution, Resolution::Delete),
                    "resolved merge conflict"
                );
                match resolution {
                    Resolution::Write(content) => write_file(self.mirror.root(), path, &content)?,
                    Resolution::Delete => remove_file(self.mirror.root(), path)?,
                }
            }
        }

        match self.mirror.commit_worktree(&commit_request(commit))? {
            Some(hash) => Ok(Outcome::Merged(hash)),
            None => Ok(Outcome::Skipped(Some(primary_mirror))),
        }
    }

    /// Check out `branch` positioned right after the parent's mirror commit.
    /// Without one there is no mirror history to inherit, so the branch
    /// starts empty.
    fn position(&self, branch: &str, parent_mirror: Option<&str>) -> Result<(), MirrorError> {
        match parent_mirror {
            Some(hash) => {
                self.mirror.create_branch(branch, hash)?;
                self.mirror.checkout_branch(branch)
            }
            None => {
                debug!(branch = %branch, "no parent mirror commit, starting orphan branch");
                self.mirror.start_orphan(branch)
            }
        }
    }
}

fn commit_request(commit: &CommitInfo) -> CommitRequest {
    CommitRequest {
        author: commit.author.clone(),
        committer: commit.committer.clone(),
        message: marker::embed(&commit.message, &commit.hash),
    }
}
