//! Filtered history replication between two repositories
//!
//! The engine copies a path-filtered subset of a "standard" repository's
//! history into a "mirror" repository, keeping topology, branches and merges.
//! Each mirror commit carries a marker naming the standard commit it replays,
//! which is what makes repeated runs incremental.

pub mod apply;
pub mod backend;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod filter;
pub mod graph;
pub mod marker;
pub mod plan;
pub mod reconcile;
pub mod replay;
pub mod state;
pub mod types;

pub use backend::{Backend, CommitRequest, MergeOutcome};
pub use config::{load_config, save_config, MirrorConfig, CONFIG_FILE};
pub use conflict::{ConflictPolicy, Resolution, StandardWins};
pub use engine::{Mirror, MirrorOptions, RunReport, StatusReport};
pub use error::MirrorError;
pub use filter::AllowList;
pub use plan::{Classification, Outcome, ReplayKind, ReplayPlan, ReplayUnit};
pub use state::MirroredSet;
pub use types::{BranchInfo, ChangeKind, CommitInfo, DiffEntry, Signature};
