use serde::{Deserialize, Serialize};

/// Kind of change a diff entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Copy,
    Delete,
    Modify,
    Rename,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Copy => "copy",
            ChangeKind::Delete => "delete",
            ChangeKind::Modify => "modify",
            ChangeKind::Rename => "rename",
        }
    }
}

/// One changed path between a commit and its parent.
///
/// Paths are repository-relative and `/`-separated. For additions the old
/// path equals the new path, and likewise for deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub old_path: String,
    pub new_path: String,
    pub kind: ChangeKind,
}

impl DiffEntry {
    pub fn new(kind: ChangeKind, old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            old_path: old_path.into(),
            new_path: new_path.into(),
            kind,
        }
    }

    pub fn add(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(ChangeKind::Add, path.clone(), path)
    }

    pub fn modify(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(ChangeKind::Modify, path.clone(), path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(ChangeKind::Delete, path.clone(), path)
    }

    pub fn rename(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self::new(ChangeKind::Rename, old_path, new_path)
    }

    pub fn copy(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self::new(ChangeKind::Copy, old_path, new_path)
    }
}
