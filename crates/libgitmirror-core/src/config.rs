use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MirrorError;
use crate::filter::AllowList;

/// Default configuration file name
pub const CONFIG_FILE: &str = "gitmirror.toml";

/// Default generation bound for both history walks
pub const DEFAULT_DEPTH_LIMIT: usize = 1000;

/// Mirror configuration stored in gitmirror.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Path to the standard (source) repository
    pub standard_path: PathBuf,
    /// Path to the mirror (destination) repository
    pub mirror_path: PathBuf,
    /// Revision in the standard repository whose history is mirrored
    #[serde(default = "default_standard_ref")]
    pub standard_ref: String,
    /// Branch used when `standard_ref` does not name a branch
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Mirror remote to push to; push is skipped when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default)]
    pub depth: DepthConfig,
    #[serde(default)]
    pub allow: AllowConfig,
}

/// History walk bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthConfig {
    /// Generations walked back from the standard tip
    #[serde(default = "default_depth")]
    pub standard: usize,
    /// Generations walked back from each mirror branch tip
    #[serde(default = "default_depth")]
    pub mirror: usize,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            standard: DEFAULT_DEPTH_LIMIT,
            mirror: DEFAULT_DEPTH_LIMIT,
        }
    }
}

/// Paths eligible for mirroring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowConfig {
    /// Folder prefixes (component directories)
    #[serde(default)]
    pub folders: Vec<String>,
    /// Extra individual files
    #[serde(default)]
    pub files: Vec<String>,
}

fn default_standard_ref() -> String {
    "HEAD".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_depth() -> usize {
    DEFAULT_DEPTH_LIMIT
}

impl MirrorConfig {
    pub fn new(standard_path: impl Into<PathBuf>, mirror_path: impl Into<PathBuf>) -> Self {
        Self {
            standard_path: standard_path.into(),
            mirror_path: mirror_path.into(),
            standard_ref: default_standard_ref(),
            default_branch: default_branch(),
            remote: None,
            depth: DepthConfig::default(),
            allow: AllowConfig::default(),
        }
    }

    /// Build the immutable allow-list
    pub fn allow_list(&self) -> AllowList {
        AllowList::new(&self.allow.folders, &self.allow.files)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), MirrorError> {
        if self.allow.folders.is_empty() && self.allow.files.is_empty() {
            return Err(MirrorError::InvalidConfig(
                "allow-list is empty; set [allow] folders or files".to_string(),
            ));
        }
        if self.depth.standard == 0 || self.depth.mirror == 0 {
            return Err(MirrorError::InvalidConfig(
                "depth limits must be at least 1".to_string(),
            ));
        }
        if self.default_branch.trim().is_empty() {
            return Err(MirrorError::InvalidConfig(
                "default_branch must not be empty".to_string(),
            ));
        }
        for entry in self.allow.folders.iter().chain(self.allow.files.iter()) {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                return Err(MirrorError::InvalidConfig(
                    "allow-list entries must not be empty".to_string(),
                ));
            }
            if trimmed.starts_with('/') || trimmed.split('/').any(|seg| seg == "..") {
                return Err(MirrorError::InvalidConfig(format!(
                    "allow-list entry '{}' must be relative to the repository root",
                    entry
                )));
            }
        }
        Ok(())
    }

    /// Resolve relative repository paths against the config file's directory
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.standard_path.is_relative() {
            self.standard_path = base.join(&self.standard_path);
        }
        if self.mirror_path.is_relative() {
            self.mirror_path = base.join(&self.mirror_path);
        }
    }
}

/// Load a mirror config from a TOML file
pub fn load_config(path: &Path) -> Result<MirrorConfig, MirrorError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: MirrorConfig = toml::from_str(&content)?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}

/// Save a mirror config as TOML
pub fn save_config(path: &Path, config: &MirrorConfig) -> Result<(), MirrorError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
