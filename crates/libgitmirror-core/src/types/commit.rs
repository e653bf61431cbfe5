use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

/// Author or committer identity with its timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch
    pub time: i64,
    /// Timezone offset in minutes
    pub offset_minutes: i32,
}

impl Signature {
    /// Timestamp in the signature's own timezone
    pub fn when(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60)?;
        offset.timestamp_opt(self.time, 0).single()
    }
}

/// A commit as seen by the engine, detached from any backend handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    /// Parent hashes; the first one is the primary parent
    pub parents: Vec<String>,
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
}

impl CommitInfo {
    pub fn primary_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// First line of the commit message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Abbreviated hash for log output
    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }
}

/// A branch name and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub tip: String,
}

/// Abbreviate a hash to 10 characters
pub fn short_hash(hash: &str) -> &str {
    hash.get(..10).unwrap_or(hash)
}
