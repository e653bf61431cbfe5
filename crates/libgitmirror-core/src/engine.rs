//! The mirroring orchestrator
//!
//! [`Mirror::mirror`] runs one complete pass:
//! 1. collect standard ancestry from the configured ref
//! 2. resolve already-mirrored commits from mirror markers
//! 3. build the replay plan starting at the root commit
//! 4. replay every unit in order
//! 5. reconcile branches and push
//!
//! The engine assumes exclusive access to both working trees for the run.

use serde::Serialize;
use tracing::info;

use crate::backend::Backend;
use crate::config::MirrorConfig;
use crate::conflict::{ConflictPolicy, StandardWins};
use crate::error::MirrorError;
use crate::filter::AllowList;
use crate::graph::{assign_branches, collect_ancestry};
use crate::plan::{build_plan, Outcome, ReplayPlan, Transition};
use crate::reconcile::reconcile_branches;
use crate::replay::Replayer;
use crate::state::resolve_mirrored;
use crate::types::{short_hash, BranchInfo};

/// Parameters of a mirror run
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    pub allow: AllowList,
    pub standard_depth: usize,
    pub mirror_depth: usize,
    pub standard_ref: String,
    pub default_branch: String,
    pub remote: Option<String>,
}

impl From<&MirrorConfig> for MirrorOptions {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            allow: config.allow_list(),
            standard_depth: config.depth.standard,
            mirror_depth: config.depth.mirror,
            standard_ref: config.standard_ref.clone(),
            default_branch: config.default_branch.clone(),
            remote: config.remote.clone(),
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<String>,
    pub units: usize,
    pub commits_created: usize,
    pub merges_created: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_tip: Option<String>,
    pub branches: Vec<String>,
    pub pruned: Vec<String>,
    pub pushed: bool,
    pub transitions: Vec<Transition>,
}

/// Mirror-side view of previous runs
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub mirrored_commits: usize,
    pub branches: Vec<BranchInfo>,
}

/// History replication engine over two repositories
pub struct Mirror<S, M, P = StandardWins> {
    standard: S,
    mirror: M,
    options: MirrorOptions,
    policy: P,
}

impl<S: Backend, M: Backend> Mirror<S, M, StandardWins> {
    pub fn new(standard: S, mirror: M, options: MirrorOptions) -> Self {
        Self::with_policy(standard, mirror, options, StandardWins)
    }
}

impl<S: Backend, M: Backend, P: ConflictPolicy> Mirror<S, M, P> {
    pub fn with_policy(standard: S, mirror: M, options: MirrorOptions, policy: P) -> Self {
        Self {
            standard,
            mirror,
            options,
            policy,
        }
    }

    pub fn standard(&self) -> &S {
        &self.standard
    }

    pub fn mirror_repo(&self) -> &M {
        &self.mirror
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// Build the replay plan for `root` without touching either repository
    pub fn plan(&self, root: &str) -> Result<ReplayPlan, MirrorError> {
        Ok(self.prepare(root)?.0)
    }

    /// Count mirrored commits and list mirror branches
    pub fn status(&self) -> Result<StatusReport, MirrorError> {
        let mirrored = resolve_mirrored(&self.mirror, self.options.mirror_depth)?;
        Ok(StatusReport {
            mirrored_commits: mirrored.len(),
            branches: self.mirror.branches()?,
        })
    }

    /// Mirror standard history from `root` up to the configured ref
    pub fn mirror(&self, root: &str) -> Result<RunReport, MirrorError> {
        let (mut plan, primary) = self.prepare(root)?;
        let resumed_from = plan.resume_point().map(|u| u.commit.hash.clone());

        let replayer = Replayer::new(
            &self.standard,
            &self.mirror,
            &self.options.allow,
            &self.policy,
        );
        replayer.replay_all(&mut plan)?;

        let reconciled = reconcile_branches(&self.standard, &self.mirror, &plan, &primary)?;

        let pushed = match &self.options.remote {
            Some(remote) => {
                self.mirror.push_all(remote)?;
                info!(remote = %remote, "pushed mirror branches");
                true
            }
            None => {
                info!("no remote configured, skipping push");
                false
            }
        };

        let transitions = plan.transitions().to_vec();
        let count = |f: fn(&Outcome) -> bool| transitions.iter().filter(|t| f(&t.outcome)).count();
        let report = RunReport {
            root: root.to_string(),
            resumed_from,
            units: plan.len(),
            commits_created: count(|o| matches!(o, Outcome::Committed(_))),
            merges_created: count(|o| matches!(o, Outcome::Merged(_))),
            skipped: count(|o| matches!(o, Outcome::Skipped(_))),
            mirror_tip: reconciled.mirror,
            branches: reconciled.branches,
            pruned: reconciled.pruned,
            pushed,
            transitions,
        };

        info!(
            root = %short_hash(root),
            commits = report.commits_created,
            merges = report.merges_created,
            skipped = report.skipped,
            "mirror run complete"
        );
        Ok(report)
    }

    fn prepare(&self, root: &str) -> Result<(ReplayPlan, String), MirrorError> {
        let root_hash = self.standard.resolve(root)?;
        let tip = self.standard.resolve(&self.options.standard_ref)?;
        let depth = self.options.standard_depth;

        let ancestry = collect_ancestry(&self.standard, &tip, depth)?;
        let mirrored = resolve_mirrored(&self.mirror, self.options.mirror_depth)?;
        info!(
            tip = %short_hash(&tip),
            ancestry = ancestry.len(),
            mirrored = mirrored.len(),
            "resolved repository state"
        );

        let branches = self.standard.branches()?;
        let primary = self.primary_branch(&branches)?;
        let assignment = assign_branches(&ancestry, &branches, &primary);

        let plan = build_plan(&ancestry, &mirrored, &root_hash, assignment, depth)?;
        Ok((plan, primary))
    }

    /// Branch that owns the first-parent lineage of the standard tip
    fn primary_branch(&self, branches: &[BranchInfo]) -> Result<String, MirrorError> {
        let wanted = self
            .options
            .standard_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.options.standard_ref);
        if branches.iter().any(|b| b.name == wanted) {
            return Ok(wanted.to_string());
        }
        if wanted == "HEAD" {
            if let Some(name) = self.standard.head_branch()? {
                return Ok(name);
            }
        }
        Ok(self.options.default_branch.clone())
    }
}
