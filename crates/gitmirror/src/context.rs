use libgitmirror_core::{load_config, Mirror, MirrorConfig, MirrorError, MirrorOptions};
use libgitmirror_git::GitRepo;
use tracing::debug;

use crate::cli::Cli;

/// Resolved configuration for a gitmirror command
pub struct MirrorContext {
    pub config: MirrorConfig,
}

impl MirrorContext {
    /// Load the config file and apply command-line overrides
    pub fn resolve(cli: &Cli) -> Result<Self, MirrorError> {
        if !cli.config.is_file() {
            return Err(MirrorError::InvalidConfig(format!(
                "config file not found: {}",
                cli.config.display()
            )));
        }
        let mut config = load_config(&cli.config)?;
        if let Some(standard) = &cli.standard {
            config.standard_path = standard.clone();
        }
        if let Some(mirror) = &cli.mirror {
            config.mirror_path = mirror.clone();
        }
        config.validate()?;

        debug!(
            config = %cli.config.display(),
            standard = %config.standard_path.display(),
            mirror = %config.mirror_path.display(),
            "resolved configuration"
        );
        Ok(Self { config })
    }

    /// Open both repositories and build the engine
    pub fn open(&self) -> Result<Mirror<GitRepo, GitRepo>, MirrorError> {
        let standard = GitRepo::open(&self.config.standard_path)?;
        let mirror = GitRepo::open(&self.config.mirror_path)?;
        Ok(Mirror::new(standard, mirror, MirrorOptions::from(&self.config)))
    }
}
