//! Replay planning
//!
//! A [`ReplayPlan`] is an arena of [`ReplayUnit`]s in replay order. Units
//! never mutate in place from the outside: the only way to change one is
//! [`ReplayPlan::apply`], which moves it to APPLIED exactly once and records a
//! [`Transition`] in the plan's log.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::MirrorError;
use crate::state::MirroredSet;
use crate::types::{short_hash, CommitInfo};

/// How a unit was classified when the plan was built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayKind {
    /// Latest standard commit already present in the mirror
    ResumePoint,
    /// Single-parent commit
    Simple,
    /// Commit with more than one parent
    Merge,
}

/// Current classification, including the terminal APPLIED state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ResumePoint,
    Simple,
    Merge,
    Applied,
}

impl From<ReplayKind> for Classification {
    fn from(kind: ReplayKind) -> Self {
        match kind {
            ReplayKind::ResumePoint => Classification::ResumePoint,
            ReplayKind::Simple => Classification::Simple,
            ReplayKind::Merge => Classification::Merge,
        }
    }
}

/// What applying a unit produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "mirror", rename_all = "snake_case")]
pub enum Outcome {
    /// Mirror reset to an existing mirror commit
    Resumed(String),
    /// New mirror commit
    Committed(String),
    /// New mirror merge commit
    Merged(String),
    /// Nothing to replay; the mirror hash is inherited from the primary parent
    Skipped(Option<String>),
}

impl Outcome {
    pub fn mirror_hash(&self) -> Option<&str> {
        match self {
            Outcome::Resumed(h) | Outcome::Committed(h) | Outcome::Merged(h) => Some(h.as_str()),
            Outcome::Skipped(inherited) => inherited.as_deref(),
        }
    }

    /// Whether a new mirror commit was written
    pub fn created_commit(&self) -> bool {
        matches!(self, Outcome::Committed(_) | Outcome::Merged(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Applied(Outcome),
}

/// One standard commit to replay
#[derive(Debug, Clone)]
pub struct ReplayUnit {
    pub commit: CommitInfo,
    /// Branch the standard commit was recorded on
    pub branch: String,
    pub kind: ReplayKind,
    /// Import the full filtered tree instead of a diff against the parent
    pub snapshot: bool,
    /// Mirror commit already carrying this commit's marker (resume point only)
    pub known_mirror: Option<String>,
    state: UnitState,
}

impl ReplayUnit {
    pub fn state(&self) -> &UnitState {
        &self.state
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.state, UnitState::Applied(_))
    }

    pub fn classification(&self) -> Classification {
        match self.state {
            UnitState::Pending => self.kind.into(),
            UnitState::Applied(_) => Classification::Applied,
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.state {
            UnitState::Applied(outcome) => Some(outcome),
            UnitState::Pending => None,
        }
    }

    pub fn mirror_hash(&self) -> Option<&str> {
        self.outcome().and_then(Outcome::mirror_hash)
    }
}

/// Audit record of a unit reaching APPLIED
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub unit: usize,
    pub standard: String,
    pub from: Classification,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Ordered arena of replay units
#[derive(Debug, Clone, Default)]
pub struct ReplayPlan {
    units: Vec<ReplayUnit>,
    index: HashMap<String, usize>,
    /// Commits handled by an earlier run, with their (possibly inherited)
    /// mirror hash
    settled: HashMap<String, Option<String>>,
    branches: HashMap<String, String>,
    transitions: Vec<Transition>,
}

impl ReplayPlan {
    pub fn units(&self) -> &[ReplayUnit] {
        &self.units
    }

    pub fn unit(&self, index: usize) -> &ReplayUnit {
        &self.units[index]
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn resume_point(&self) -> Option<&ReplayUnit> {
        self.units.iter().find(|u| u.kind == ReplayKind::ResumePoint)
    }

    /// Number of units that still need replaying
    pub fn pending(&self) -> usize {
        self.units.iter().filter(|u| !u.is_applied()).count()
    }

    /// Branch a standard commit is recorded on
    pub fn branch_of(&self, standard: &str) -> Option<&str> {
        self.branches.get(standard).map(String::as_str)
    }

    /// Mirror commit corresponding to a standard commit, as far as known
    pub fn mirror_hash_of(&self, standard: &str) -> Option<&str> {
        if let Some(&idx) = self.index.get(standard) {
            return self.units[idx].mirror_hash();
        }
        self.settled.get(standard).and_then(|h| h.as_deref())
    }

    /// Move a unit to APPLIED. A unit is applied at most once; later calls
    /// are ignored.
    pub fn apply(&mut self, index: usize, outcome: Outcome) {
        let unit = &mut self.units[index];
        if unit.is_applied() {
            warn!(standard = %unit.commit.short_hash(), "unit already applied");
            return;
        }
        let from = unit.classification();
        unit.state = UnitState::Applied(outcome.clone());
        self.transitions.push(Transition {
            unit: index,
            standard: unit.commit.hash.clone(),
            from,
            outcome,
        });
    }

    /// The most recent SIMPLE/MERGE unit with a mirror commit, falling back
    /// to the resume point
    pub fn last_replayed(&self) -> Option<&ReplayUnit> {
        self.units
            .iter()
            .rev()
            .find(|u| u.kind != ReplayKind::ResumePoint && u.mirror_hash().is_some())
            .or_else(|| self.resume_point().filter(|u| u.mirror_hash().is_some()))
    }

    /// Every branch the plan positions or merges
    pub fn touched_branches(&self) -> BTreeSet<String> {
        let mut touched = BTreeSet::new();
        for unit in &self.units {
            touched.insert(unit.branch.clone());
            if unit.kind == ReplayKind::Merge {
                if let Some(parent) = unit.commit.parents.get(1) {
                    touched.insert(self.secondary_branch(&unit.branch, parent));
                }
            }
        }
        touched
    }

    /// Mirror branch a merge on `branch` uses for its secondary parent
    pub fn secondary_branch(&self, branch: &str, secondary: &str) -> String {
        match self.branch_of(secondary) {
            Some(name) if name != branch => name.to_string(),
            _ => format!("merged/{}", short_hash(secondary)),
        }
    }
}

/// Build the replay plan.
///
/// `ancestry` must be oldest-first and topological. Only `root` and its
/// descendants are planned. The latest mirrored commit becomes the single
/// resume point; it and every other mirrored commit settle their ancestors,
/// which are not replayed again.
pub fn build_plan(
    ancestry: &[CommitInfo],
    mirrored: &MirroredSet,
    root: &str,
    branches: HashMap<String, String>,
    depth_limit: usize,
) -> Result<ReplayPlan, MirrorError> {
    if !ancestry.iter().any(|c| c.hash == root) {
        return Err(MirrorError::RootCommitNotFound {
            root: root.to_string(),
            depth: depth_limit,
        });
    }

    let mut in_window: HashSet<&str> = HashSet::new();
    let mut window: Vec<&CommitInfo> = Vec::new();
    for commit in ancestry {
        if commit.hash == root || commit.parents.iter().any(|p| in_window.contains(p.as_str())) {
            in_window.insert(commit.hash.as_str());
            window.push(commit);
        }
    }

    let by_hash: HashMap<&str, &CommitInfo> = window.iter().map(|c| (c.hash.as_str(), *c)).collect();

    // Single forward pass: classify resume candidates and settle ancestors.
    let mut latest_mirrored: Option<usize> = None;
    let mut settled: HashSet<&str> = HashSet::new();
    for (pos, commit) in window.iter().enumerate() {
        if !mirrored.contains(&commit.hash) {
            continue;
        }
        if let Some(previous) = latest_mirrored.replace(pos) {
            settled.insert(window[previous].hash.as_str());
        }
        let mut stack: Vec<&str> = commit.parents.iter().map(String::as_str).collect();
        while let Some(hash) = stack.pop() {
            let Some(parent) = by_hash.get(hash) else { continue };
            if settled.insert(parent.hash.as_str()) {
                stack.extend(parent.parents.iter().map(String::as_str));
            }
        }
    }

    let mut plan = ReplayPlan {
        branches,
        ..ReplayPlan::default()
    };

    for (pos, commit) in window.iter().enumerate() {
        let branch = plan
            .branches
            .get(&commit.hash)
            .cloned()
            .unwrap_or_default();

        if latest_mirrored == Some(pos) {
            plan.push(ReplayUnit {
                commit: (*commit).clone(),
                branch,
                kind: ReplayKind::ResumePoint,
                snapshot: false,
                known_mirror: mirrored.mirror_of(&commit.hash).map(str::to_string),
                state: UnitState::Pending,
            });
            continue;
        }

        if settled.contains(commit.hash.as_str()) {
            let mirror = mirrored
                .mirror_of(&commit.hash)
                .map(str::to_string)
                .or_else(|| {
                    commit
                        .primary_parent()
                        .and_then(|p| plan.settled.get(p).cloned().flatten())
                });
            plan.settled.insert(commit.hash.clone(), mirror);
            continue;
        }

        let is_root = commit.hash == root;
        let kind = if commit.is_merge() && !is_root {
            ReplayKind::Merge
        } else {
            ReplayKind::Simple
        };
        plan.push(ReplayUnit {
            commit: (*commit).clone(),
            branch,
            kind,
            snapshot: is_root,
            known_mirror: None,
            state: UnitState::Pending,
        });
    }

    info!(
        root = %short_hash(root),
        window = window.len(),
        units = plan.len(),
        settled = plan.settled.len(),
        resume = plan.resume_point().map(|u| u.commit.short_hash()).unwrap_or("none"),
        "built replay plan"
    );

    Ok(plan)
}

impl ReplayPlan {
    fn push(&mut self, unit: ReplayUnit) {
        self.index.insert(unit.commit.hash.clone(), self.units.len());
        self.units.push(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::commit;

    fn linear() -> Vec<CommitInfo> {
        vec![
            commit("a", &[], "A"),
            commit("b", &["a"], "B"),
            commit("c", &["b"], "C"),
        ]
    }

    fn on_main(ancestry: &[CommitInfo]) -> HashMap<String, String> {
        ancestry
            .iter()
            .map(|c| (c.hash.clone(), "main".to_string()))
            .collect()
    }

    fn kinds(plan: &ReplayPlan) -> Vec<(&str, ReplayKind)> {
        plan.units()
            .iter()
            .map(|u| (u.commit.hash.as_str(), u.kind))
            .collect()
    }

    #[test]
    fn test_fresh_mirror_replays_everything() {
        let ancestry = linear();
        let plan = build_plan(&ancestry, &MirroredSet::new(), "a", on_main(&ancestry), 10).unwrap();

        assert_eq!(
            kinds(&plan),
            [("a", ReplayKind::Simple), ("b", ReplayKind::Simple), ("c", ReplayKind::Simple)]
        );
        assert!(plan.unit(0).snapshot);
        assert!(!plan.unit(1).snapshot);
        assert!(plan.resume_point().is_none());
        assert_eq!(plan.pending(), 3);
    }

    #[test]
    fn test_root_missing_is_error() {
        let ancestry = linear();
        let err = build_plan(&ancestry, &MirroredSet::new(), "zz", on_main(&ancestry), 3).unwrap_err();
        assert!(matches!(err, MirrorError::RootCommitNotFound { depth: 3, .. }));
    }

    #[test]
    fn test_commits_before_root_are_excluded() {
        let ancestry = linear();
        let plan = build_plan(&ancestry, &MirroredSet::new(), "b", on_main(&ancestry), 10).unwrap();
        assert_eq!(kinds(&plan), [("b", ReplayKind::Simple), ("c", ReplayKind::Simple)]);
        assert!(plan.unit(0).snapshot);
    }

    #[test]
    fn test_latest_mirrored_is_single_resume_point() {
        let ancestry = linear();
        let mirrored: MirroredSet = [("a", "ma"), ("b", "mb")].into_iter().collect();
        let plan = build_plan(&ancestry, &mirrored, "a", on_main(&ancestry), 10).unwrap();

        assert_eq!(kinds(&plan), [("b", ReplayKind::ResumePoint), ("c", ReplayKind::Simple)]);
        assert_eq!(plan.unit(0).known_mirror.as_deref(), Some("mb"));
        assert_eq!(plan.mirror_hash_of("a"), Some("ma"));
        // Not applied yet
        assert_eq!(plan.mirror_hash_of("b"), None);
    }

    #[test]
    fn test_fully_mirrored_plan_is_only_resume_point() {
        let ancestry = linear();
        let mirrored: MirroredSet = [("a", "ma"), ("b", "mb"), ("c", "mc")].into_iter().collect();
        let plan = build_plan(&ancestry, &mirrored, "a", on_main(&ancestry), 10).unwrap();
        assert_eq!(kinds(&plan), [("c", ReplayKind::ResumePoint)]);
    }

    #[test]
    fn test_skipped_ancestor_inherits_mirror_hash() {
        // x was skipped by a previous run (no marker), b was mirrored on top
        let ancestry = vec![
            commit("a", &[], "A"),
            commit("x", &["a"], "X"),
            commit("b", &["x"], "B"),
            commit("y", &["x"], "Y"),
        ];
        let mirrored: MirroredSet = [("a", "ma"), ("b", "mb")].into_iter().collect();
        let plan = build_plan(&ancestry, &mirrored, "a", on_main(&ancestry), 10).unwrap();

        assert_eq!(kinds(&plan), [("b", ReplayKind::ResumePoint), ("y", ReplayKind::Simple)]);
        assert_eq!(plan.mirror_hash_of("x"), Some("ma"));
    }

    #[test]
    fn test_merge_classified() {
        let ancestry = vec![
            commit("a", &[], "A"),
            commit("b", &["a"], "B"),
            commit("f", &["a"], "F"),
            commit("m", &["b", "f"], "Merge branch 'feature'"),
        ];
        let mut branches = on_main(&ancestry);
        branches.insert("f".to_string(), "feature".to_string());
        let plan = build_plan(&ancestry, &MirroredSet::new(), "a", branches, 10).unwrap();

        assert_eq!(plan.unit(3).kind, ReplayKind::Merge);
        assert_eq!(plan.unit(2).branch, "feature");
        let touched: Vec<String> = plan.touched_branches().into_iter().collect();
        assert_eq!(touched, ["feature", "main"]);
    }

    #[test]
    fn test_root_merge_is_imported_as_snapshot() {
        let ancestry = vec![
            commit("p1", &[], "P1"),
            commit("p2", &[], "P2"),
            commit("m", &["p1", "p2"], "Merge"),
            commit("c", &["m"], "C"),
        ];
        let plan = build_plan(&ancestry, &MirroredSet::new(), "m", on_main(&ancestry), 10).unwrap();
        assert_eq!(kinds(&plan), [("m", ReplayKind::Simple), ("c", ReplayKind::Simple)]);
        assert!(plan.unit(0).snapshot);
    }

    #[test]
    fn test_parallel_mirrored_branches() {
        let ancestry = vec![
            commit("a", &[], "A"),
            commit("b", &["a"], "B"),
            commit("f", &["a"], "F"),
            commit("m", &["b", "f"], "Merge"),
        ];
        let mirrored: MirroredSet = [("a", "ma"), ("b", "mb"), ("f", "mf")].into_iter().collect();
        let plan = build_plan(&ancestry, &mirrored, "a", on_main(&ancestry), 10).unwrap();

        assert_eq!(kinds(&plan), [("f", ReplayKind::ResumePoint), ("m", ReplayKind::Merge)]);
        assert_eq!(plan.mirror_hash_of("b"), Some("mb"));
    }

    #[test]
    fn test_apply_records_transition_once() {
        let ancestry = linear();
        let mut plan = build_plan(&ancestry, &MirroredSet::new(), "a", on_main(&ancestry), 10).unwrap();

        plan.apply(0, Outcome::Committed("m1".to_string()));
        plan.apply(0, Outcome::Skipped(None));
        plan.apply(1, Outcome::Skipped(Some("m1".to_string())));

        assert_eq!(plan.unit(0).classification(), Classification::Applied);
        assert_eq!(plan.unit(0).mirror_hash(), Some("m1"));
        assert_eq!(plan.mirror_hash_of("b"), Some("m1"));
        assert_eq!(plan.transitions().len(), 2);
        assert_eq!(plan.transitions()[0].from, Classification::Simple);
        assert_eq!(plan.unit(2).classification(), Classification::Simple);
    }

    #[test]
    fn test_last_replayed() {
        let ancestry = linear();
        let mirrored: MirroredSet = [("a", "ma")].into_iter().collect();
        let mut plan = build_plan(&ancestry, &mirrored, "a", on_main(&ancestry), 10).unwrap();
        assert!(plan.last_replayed().is_none());

        plan.apply(0, Outcome::Resumed("ma".to_string()));
        assert_eq!(plan.last_replayed().unwrap().commit.hash, "a");

        plan.apply(1, Outcome::Committed("mb".to_string()));
        plan.apply(2, Outcome::Skipped(Some("mb".to_string())));
        let last = plan.last_replayed().unwrap();
        assert_eq!(last.commit.hash, "c");
        assert_eq!(last.mirror_hash(), Some("mb"));
    }
}
