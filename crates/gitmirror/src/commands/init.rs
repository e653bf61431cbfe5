use libgitmirror_core::{save_config, MirrorConfig, MirrorError};
use serde::Serialize;
use tracing::info;

use crate::cli::Cli;
use crate::output::output_success;

#[derive(Serialize)]
struct InitOutput {
    config: String,
    standard_path: String,
    mirror_path: String,
    folders: Vec<String>,
    files: Vec<String>,
}

pub fn run(
    cli: &Cli,
    folders: &[String],
    files: &[String],
    remote: Option<String>,
    force: bool,
) -> Result<(), MirrorError> {
    if cli.config.exists() && !force {
        return Err(MirrorError::InvalidConfig(format!(
            "{} already exists; pass --force to overwrite",
            cli.config.display()
        )));
    }

    let (Some(standard), Some(mirror)) = (&cli.standard, &cli.mirror) else {
        return Err(MirrorError::InvalidConfig(
            "init needs both --standard and --mirror".to_string(),
        ));
    };

    let mut config = MirrorConfig::new(standard.clone(), mirror.clone());
    config.remote = remote;
    config.allow.folders = folders.to_vec();
    config.allow.files = files.to_vec();
    config.validate()?;

    save_config(&cli.config, &config)?;
    info!(config = %cli.config.display(), "wrote configuration");

    let out = InitOutput {
        config: cli.config.display().to_string(),
        standard_path: config.standard_path.display().to_string(),
        mirror_path: config.mirror_path.display().to_string(),
        folders: config.allow.folders.clone(),
        files: config.allow.files.clone(),
    };
    output_success(cli, &out, |o| format!("Wrote {}", o.config));
    Ok(())
}
