//! Mirror state resolution
//!
//! Scans the mirror's branches for commits carrying a standard-hash marker.
//! The resulting set is the resumability checkpoint between runs.

use std::collections::HashMap;

use tracing::debug;

use crate::backend::Backend;
use crate::error::MirrorError;
use crate::graph::collect_ancestry;
use crate::marker;
use crate::types::short_hash;

/// Standard hashes already present in the mirror, with the mirror commit
/// that carries each marker
#[derive(Debug, Clone, Default)]
pub struct MirroredSet {
    by_standard: HashMap<String, String>,
}

impl MirroredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a marker; the first mirror commit seen for a hash is kept
    pub fn insert(&mut self, standard: impl Into<String>, mirror: impl Into<String>) {
        self.by_standard.entry(standard.into()).or_insert_with(|| mirror.into());
    }

    pub fn contains(&self, standard: &str) -> bool {
        self.by_standard.contains_key(standard)
    }

    /// Mirror commit replaying the given standard commit
    pub fn mirror_of(&self, standard: &str) -> Option<&str> {
        self.by_standard.get(standard).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_standard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_standard.is_empty()
    }
}

impl<S: Into<String>, M: Into<String>> FromIterator<(S, M)> for MirroredSet {
    fn from_iter<I: IntoIterator<Item = (S, M)>>(iter: I) -> Self {
        let mut set = MirroredSet::new();
        for (standard, mirror) in iter {
            set.insert(standard, mirror);
        }
        set
    }
}

/// Collect every marker reachable from the mirror's branch tips
pub fn resolve_mirrored<B: Backend + ?Sized>(
    mirror: &B,
    depth_limit: usize,
) -> Result<MirroredSet, MirrorError> {
    let mut set = MirroredSet::new();

    for branch in mirror.branches()? {
        let ancestry = collect_ancestry(mirror, &branch.tip, depth_limit)?;
        let before = set.len();
        // Newest first, so a marker duplicated by hand resolves to the
        // latest mirror commit on the branch.
        for commit in ancestry.iter().rev() {
            if let Some(standard) = marker::extract(&commit.message) {
                set.insert(standard, commit.hash.clone());
            }
        }
        debug!(
            branch = %branch.name,
            tip = %short_hash(&branch.tip),
            scanned = ancestry.len(),
            new_markers = set.len() - before,
            "scanned mirror branch"
        );
    }

    Ok(set)
}
