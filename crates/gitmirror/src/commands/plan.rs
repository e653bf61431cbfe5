use chrono::{DateTime, FixedOffset};
use libgitmirror_core::types::short_hash;
use libgitmirror_core::{MirrorError, ReplayKind, ReplayPlan};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::MirrorContext;
use crate::output::output_success;

#[derive(Serialize)]
struct PlanView {
    root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resume_point: Option<String>,
    units: Vec<UnitView>,
}

#[derive(Serialize)]
struct UnitView {
    commit: String,
    branch: String,
    kind: ReplayKind,
    snapshot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    authored: Option<DateTime<FixedOffset>>,
    summary: String,
}

impl PlanView {
    fn new(root: &str, plan: &ReplayPlan) -> Self {
        Self {
            root: root.to_string(),
            resume_point: plan.resume_point().map(|u| u.commit.hash.clone()),
            units: plan
                .units()
                .iter()
                .map(|u| UnitView {
                    commit: u.commit.hash.clone(),
                    branch: u.branch.clone(),
                    kind: u.kind,
                    snapshot: u.snapshot,
                    authored: u.commit.author.when(),
                    summary: u.commit.summary().to_string(),
                })
                .collect(),
        }
    }
}

pub fn run(cli: &Cli, root: &str) -> Result<(), MirrorError> {
    let ctx = MirrorContext::resolve(cli)?;
    let mirror = ctx.open()?;
    let plan = mirror.plan(root)?;
    output_success(cli, &PlanView::new(root, &plan), render);
    Ok(())
}

fn render(view: &PlanView) -> String {
    if view.units.is_empty() {
        return "Nothing to replay".to_string();
    }
    view.units
        .iter()
        .map(|u| {
            let kind = match (u.kind, u.snapshot) {
                (ReplayKind::ResumePoint, _) => "resume",
                (ReplayKind::Simple, true) => "snapshot",
                (ReplayKind::Simple, false) => "simple",
                (ReplayKind::Merge, _) => "merge",
            };
            let authored = u
                .authored
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{:<8} {} {} [{}] {}",
                kind,
                short_hash(&u.commit),
                authored,
                u.branch,
                u.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
