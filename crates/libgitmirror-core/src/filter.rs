//! Allow-list path filtering
//!
//! Decides whether a changed path belongs to the mirrored subset. A path is
//! in scope when it equals one of the exact file entries, or when its parent
//! directory starts with one of the folder prefixes.

use std::collections::BTreeSet;

use crate::types::{ChangeKind, DiffEntry};

/// Immutable set of mirrored files and folder prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    files: BTreeSet<String>,
    folders: Vec<String>,
}

impl AllowList {
    /// Build an allow-list. Folder prefixes are normalized to end with `/`
    /// and leading `./` or `/` is stripped from every entry.
    pub fn new<F, P>(folders: F, files: P) -> Self
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let mut folders: Vec<String> = folders
            .into_iter()
            .map(|f| normalize(f.as_ref()))
            .filter(|f| !f.is_empty())
            .map(|f| if f.ends_with('/') { f } else { format!("{}/", f) })
            .collect();
        folders.sort();
        folders.dedup();

        let files = files
            .into_iter()
            .map(|f| normalize(f.as_ref()))
            .filter(|f| !f.is_empty())
            .collect();

        Self { files, folders }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }

    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// Whether a single repository-relative path is mirrored
    pub fn contains(&self, path: &str) -> bool {
        if self.files.contains(path) {
            return true;
        }
        // Match on the directory only, so a move inside one folder never
        // looks like it crossed a folder boundary.
        let dir = match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "",
        };
        self.folders.iter().any(|prefix| dir.starts_with(prefix.as_str()))
    }

    /// Whether a diff entry touches the mirrored subset
    pub fn in_scope(&self, entry: &DiffEntry) -> bool {
        match entry.kind {
            ChangeKind::Add | ChangeKind::Modify => self.contains(&entry.new_path),
            ChangeKind::Delete => self.contains(&entry.old_path),
            ChangeKind::Copy | ChangeKind::Rename => {
                self.contains(&entry.old_path) || self.contains(&entry.new_path)
            }
        }
    }

    /// Keep only the in-scope entries
    pub fn filter(&self, entries: Vec<DiffEntry>) -> Vec<DiffEntry> {
        entries.into_iter().filter(|e| self.in_scope(e)).collect()
    }
}

fn normalize(path: &str) -> String {
    path.trim()
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string()
}
