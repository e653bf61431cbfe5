use thiserror::Error;

/// Main error type for mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    #[error("root commit {root} not found within the last {depth} generations of standard history")]
    RootCommitNotFound { root: String, depth: usize },

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl MirrorError {
    /// Wrap an arbitrary backend failure
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MirrorError::Backend(Box::new(err))
    }

    /// Get the error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            MirrorError::CommitNotFound(_) => "commit_not_found",
            MirrorError::RootCommitNotFound { .. } => "root_not_found",
            MirrorError::BranchNotFound(_) => "not_found",
            MirrorError::InvalidConfig(_) => "invalid_args",
            MirrorError::Io(_) => "io_error",
            MirrorError::TomlParse(_) => "invalid_args",
            MirrorError::TomlSerialize(_) => "internal_error",
            MirrorError::Backend(_) => "backend_error",
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            MirrorError::InvalidConfig(_) | MirrorError::TomlParse(_) => 2,
            MirrorError::CommitNotFound(_)
            | MirrorError::RootCommitNotFound { .. }
            | MirrorError::BranchNotFound(_) => 3,
            _ => 1,
        }
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            MirrorError::RootCommitNotFound { .. } => vec![
                "Raise [depth] standard in the configuration",
                "Or pick a root commit closer to the standard tip",
            ],
            MirrorError::CommitNotFound(_) => vec![
                "Check that the hash exists in the standard repository",
            ],
            MirrorError::Backend(_) => vec![
                "The mirror is left in a consistent state; re-run once the cause is fixed",
            ],
            _ => vec![],
        }
    }
}
