//! Commit graph collection and branch assignment
//!
//! Ancestry is collected breadth-first up to a generation bound, then emitted
//! in a depth-first post-order that visits the primary parent first. The
//! result is topological (parents before children) and replays a
//! first-parent lineage before the side branches merged into it.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::backend::Backend;
use crate::error::MirrorError;
use crate::types::{short_hash, BranchInfo, CommitInfo};

/// Collect up to `depth_limit` generations of ancestry ending at `from`,
/// oldest first. `from` itself is generation 0.
pub fn collect_ancestry<B: Backend + ?Sized>(
    repo: &B,
    from: &str,
    depth_limit: usize,
) -> Result<Vec<CommitInfo>, MirrorError> {
    if depth_limit == 0 {
        return Ok(Vec::new());
    }

    let tip = repo.commit(from)?;
    let tip_hash = tip.hash.clone();

    let mut commits: HashMap<String, CommitInfo> = HashMap::new();
    let mut frontier = vec![tip];
    let mut generation = 0;

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for commit in frontier {
            if commits.contains_key(&commit.hash) {
                continue;
            }
            if generation + 1 < depth_limit {
                for parent in &commit.parents {
                    if !commits.contains_key(parent) {
                        next.push(parent.clone());
                    }
                }
            }
            commits.insert(commit.hash.clone(), commit);
        }

        let mut seen = HashSet::new();
        frontier = Vec::with_capacity(next.len());
        for hash in next {
            if commits.contains_key(&hash) || !seen.insert(hash.clone()) {
                continue;
            }
            frontier.push(repo.commit(&hash)?);
        }
        generation += 1;
    }

    debug!(
        from = %short_hash(&tip_hash),
        commits = commits.len(),
        generations = generation,
        "collected ancestry"
    );

    Ok(topological_order(&tip_hash, commits))
}

/// Depth-first post-order from `tip`, restricted to the collected commits
fn topological_order(tip: &str, mut commits: HashMap<String, CommitInfo>) -> Vec<CommitInfo> {
    let mut order: Vec<String> = Vec::with_capacity(commits.len());
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<(String, usize)> = vec![(tip.to_string(), 0)];
    visited.insert(tip.to_string());

    while let Some((hash, next_parent)) = stack.pop() {
        let parent = commits
            .get(&hash)
            .and_then(|c| c.parents.get(next_parent))
            .cloned();

        match parent {
            Some(parent) => {
                stack.push((hash, next_parent + 1));
                if commits.contains_key(&parent) && visited.insert(parent.clone()) {
                    stack.push((parent, 0));
                }
            }
            None => order.push(hash),
        }
    }

    order
        .into_iter()
        .filter_map(|hash| commits.remove(&hash))
        .collect()
}

fn merge_branch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Merge (?:remote-tracking )?branch '([^']+)'|^Merge pull request #\d+ from (\S+)")
            .expect("merge message pattern is valid")
    })
}

/// Branch name a merge message says was merged in, if any
pub fn merged_branch_name(message: &str) -> Option<String> {
    let caps = merge_branch_regex().captures(message.lines().next().unwrap_or(""))?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim_start_matches("origin/").to_string())
        .filter(|name| !name.is_empty())
}

/// Assign every collected commit to the branch it was recorded on.
///
/// `primary` claims the first-parent lineage of the ancestry tip. Other
/// branches then claim unclaimed first-parent lineages from their tips, in
/// name order. Side lineages whose branch no longer exists are named after the
/// merge that brought them in.
pub fn assign_branches(
    ancestry: &[CommitInfo],
    branches: &[BranchInfo],
    primary: &str,
) -> HashMap<String, String> {
    let by_hash: HashMap<&str, &CommitInfo> =
        ancestry.iter().map(|c| (c.hash.as_str(), c)).collect();
    let mut assigned: HashMap<String, String> = HashMap::with_capacity(ancestry.len());
    let mut used: HashSet<String> = HashSet::new();

    if let Some(tip) = ancestry.last() {
        claim(&by_hash, &mut assigned, primary, &tip.hash);
        used.insert(primary.to_string());
    }

    let mut sorted: Vec<&BranchInfo> = branches.iter().filter(|b| b.name != primary).collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    for branch in sorted {
        if by_hash.contains_key(branch.tip.as_str()) {
            claim(&by_hash, &mut assigned, &branch.name, &branch.tip);
        }
        used.insert(branch.name.clone());
    }

    for commit in ancestry.iter().rev() {
        if !commit.is_merge() || !assigned.contains_key(&commit.hash) {
            continue;
        }
        for parent in commit.parents.iter().skip(1) {
            if assigned.contains_key(parent) || !by_hash.contains_key(parent.as_str()) {
                continue;
            }
            let name = merged_branch_name(&commit.message)
                .filter(|name| !used.contains(name))
                .unwrap_or_else(|| format!("merged/{}", short_hash(parent)));
            used.insert(name.clone());
            claim(&by_hash, &mut assigned, &name, parent);
        }
    }

    // Anything still unclaimed is only reachable through a lineage cut off by
    // the depth bound.
    for commit in ancestry {
        assigned
            .entry(commit.hash.clone())
            .or_insert_with(|| primary.to_string());
    }

    assigned
}

/// Walk the first-parent chain from `tip`, naming unclaimed commits
fn claim(
    by_hash: &HashMap<&str, &CommitInfo>,
    assigned: &mut HashMap<String, String>,
    name: &str,
    tip: &str,
) {
    let mut current = Some(tip);
    while let Some(hash) = current {
        let Some(commit) = by_hash.get(hash) else { break };
        if assigned.contains_key(hash) {
            break;
        }
        assigned.insert(hash.to_string(), name.to_string());
        current = commit.primary_parent();
    }
}
