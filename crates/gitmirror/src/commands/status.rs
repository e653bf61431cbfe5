use libgitmirror_core::types::short_hash;
use libgitmirror_core::{MirrorError, StatusReport};

use crate::cli::Cli;
use crate::context::MirrorContext;
use crate::output::output_success;

pub fn run(cli: &Cli) -> Result<(), MirrorError> {
    let ctx = MirrorContext::resolve(cli)?;
    let status = ctx.open()?.status()?;
    output_success(cli, &status, render);
    Ok(())
}

fn render(status: &StatusReport) -> String {
    let mut lines = vec![format!("{} mirrored commits", status.mirrored_commits)];
    for branch in &status.branches {
        lines.push(format!("  {:<24} {}", branch.name, short_hash(&branch.tip)));
    }
    lines.join("\n")
}
