use libgitmirror_core::MirrorError;
use thiserror::Error;

/// Errors that can occur during Git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a git repository")]
    NotARepo,

    #[error("Repository has no working tree: {0}")]
    BareRepo(String),

    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    #[error("Path is not valid UTF-8: {0}")]
    InvalidPath(String),

    #[error("Push error: {0}")]
    Push(String),
}

impl From<GitError> for MirrorError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::RevisionNotFound(rev) => MirrorError::CommitNotFound(rev),
            GitError::Io(io) => MirrorError::Io(io),
            other => MirrorError::backend(other),
        }
    }
}
