//! Git integration for gitmirror
//!
//! This crate provides the `git2` backend the mirroring engine runs on:
//! - Commit, branch and diff inspection with rename/copy detection
//! - Working-tree checkout, reset and commit
//! - Merges that leave conflicts for the engine's policy to resolve
//! - Pushing every local branch to a configured remote

mod error;
mod repo;

pub use error::GitError;
pub use repo::GitRepo;
