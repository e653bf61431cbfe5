pub mod commit;
pub mod diff;

pub use commit::{short_hash, BranchInfo, CommitInfo, Signature};
pub use diff::{ChangeKind, DiffEntry};
