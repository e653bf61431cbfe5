use libgitmirror_core::types::short_hash;
use libgitmirror_core::{MirrorError, RunReport};

use crate::cli::Cli;
use crate::context::MirrorContext;
use crate::output::output_success;

pub fn run(cli: &Cli, root: &str) -> Result<(), MirrorError> {
    let ctx = MirrorContext::resolve(cli)?;
    let mirror = ctx.open()?;
    let report = mirror.mirror(root)?;
    output_success(cli, &report, render);
    Ok(())
}

fn render(report: &RunReport) -> String {
    let mut lines = Vec::new();
    match &report.resumed_from {
        Some(resume) => lines.push(format!(
            "Mirrored from {} (resumed at {})",
            short_hash(&report.root),
            short_hash(resume)
        )),
        None => lines.push(format!("Mirrored from {}", short_hash(&report.root))),
    }
    lines.push(format!(
        "  {} commits, {} merges, {} skipped ({} units)",
        report.commits_created, report.merges_created, report.skipped, report.units
    ));
    match &report.mirror_tip {
        Some(tip) => lines.push(format!(
            "  mirror tip {} on {}",
            short_hash(tip),
            report.branches.join(", ")
        )),
        None => lines.push("  nothing mirrored".to_string()),
    }
    if !report.pruned.is_empty() {
        lines.push(format!("  pruned {}", report.pruned.join(", ")));
    }
    if report.pushed {
        lines.push("  pushed".to_string());
    }
    lines.join("\n")
}
