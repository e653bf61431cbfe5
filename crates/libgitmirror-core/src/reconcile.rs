//! Post-replay branch reconciliation

use serde::Serialize;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::MirrorError;
use crate::plan::ReplayPlan;
use crate::types::short_hash;

/// Branch changes made after replay
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Standard commit the branches were reconciled against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,
    /// Mirror commit the final branches point at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror: Option<String>,
    /// Mirror branches pointing at the final commit; the first is checked out
    pub branches: Vec<String>,
    /// Scratch branches deleted from the mirror
    pub pruned: Vec<String>,
}

/// Point mirror branches at the final replayed commit and prune scratch
/// branches.
///
/// Every standard branch containing the last replayed commit gets a mirror
/// branch of the same name at its mirror commit. `preferred` is checked out
/// when it is among them. Branches the plan touched that are not in the final
/// set are deleted.
pub fn reconcile_branches(
    standard: &dyn Backend,
    mirror: &dyn Backend,
    plan: &ReplayPlan,
    preferred: &str,
) -> Result<ReconcileReport, MirrorError> {
    let Some(last) = plan.last_replayed() else {
        debug!("nothing replayed, branches left untouched");
        return Ok(ReconcileReport::default());
    };
    let Some(mirror_hash) = last.mirror_hash() else {
        return Ok(ReconcileReport::default());
    };

    let mut finals = standard.branches_containing(&last.commit.hash)?;
    if finals.is_empty() {
        finals.push(last.branch.clone());
    }
    finals.sort_by(|a, b| (a != preferred).cmp(&(b != preferred)).then_with(|| a.cmp(b)));

    for name in &finals {
        mirror.create_branch(name, mirror_hash)?;
    }
    mirror.checkout_branch(&finals[0])?;

    let mut pruned = Vec::new();
    for name in plan.touched_branches() {
        if finals.contains(&name) || !mirror.branch_exists(&name)? {
            continue;
        }
        mirror.delete_branch(&name)?;
        pruned.push(name);
    }

    info!(
        standard = %last.commit.short_hash(),
        mirror = %short_hash(mirror_hash),
        branches = ?finals,
        pruned = ?pruned,
        "reconciled branches"
    );

    Ok(ReconcileReport {
        standard: Some(last.commit.hash.clone()),
        mirror: Some(mirror_hash.to_string()),
        branches: finals,
        pruned,
    })
}
