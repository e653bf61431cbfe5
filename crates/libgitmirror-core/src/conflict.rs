//! Merge conflict resolution policies
//!
//! The engine never merges file contents itself. When the backend reports a
//! conflicted path, a [`ConflictPolicy`] decides the final content outright.

use crate::backend::Backend;
use crate::error::MirrorError;
use crate::filter::AllowList;

/// Final content for a conflicted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Write(Vec<u8>),
    Delete,
}

impl From<Option<Vec<u8>>> for Resolution {
    fn from(content: Option<Vec<u8>>) -> Self {
        match content {
            Some(bytes) => Resolution::Write(bytes),
            None => Resolution::Delete,
        }
    }
}

/// Everything a policy may consult for one merge
pub struct ConflictContext<'a> {
    pub standard: &'a dyn Backend,
    pub mirror: &'a dyn Backend,
    /// Standard merge commit being replayed
    pub standard_commit: &'a str,
    /// Mirror commit on the primary side of the merge
    pub mirror_primary: &'a str,
    pub allow: &'a AllowList,
}

pub trait ConflictPolicy {
    fn name(&self) -> &'static str;

    fn resolve(&self, ctx: &ConflictContext<'_>, path: &str) -> Result<Resolution, MirrorError>;
}

/// The standard repository always wins.
///
/// Allow-listed paths take the standard merge commit's content (or are
/// deleted when the merge commit has no such file). Paths outside the
/// allow-list are mirror-only files and keep the primary side.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardWins;

impl ConflictPolicy for StandardWins {
    fn name(&self) -> &'static str {
        "standard-wins"
    }

    fn resolve(&self, ctx: &ConflictContext<'_>, path: &str) -> Result<Resolution, MirrorError> {
        let content = if ctx.allow.contains(path) {
            ctx.standard.read_file(ctx.standard_commit, path)?
        } else {
            ctx.mirror.read_file(ctx.mirror_primary, path)?
        };
        Ok(content.into())
    }
}
