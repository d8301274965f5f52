//! Conflict checks and deployments from declaration files.

use std::path::Path;

use serde::Serialize;
use tabled::Tabled;

use opnmirror_core::{ConflictReport, DeployReport, DeploymentState, Proposal, StepOutcome};

use crate::cli::{DeployArgs, GlobalOpts};
use crate::declaration;
use crate::error::CliError;
use crate::output::{self, Painter};
use crate::state::Session;

use super::{sync, util};

// ── Check ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CheckView<'a> {
    resource: String,
    #[serde(flatten)]
    report: &'a ConflictReport,
}

fn check_detail(views: &[CheckView<'_>], paint: Painter) -> String {
    views
        .iter()
        .map(|v| {
            if v.report.clean {
                format!("{} {}", paint.good("✓"), v.resource)
            } else {
                let lines: Vec<String> = v
                    .report
                    .conflicts
                    .iter()
                    .map(|c| format!("    {}", paint.bad(&c.to_string())))
                    .collect();
                format!("{} {}\n{}", paint.bad("✗"), v.resource, lines.join("\n"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check every declared resource against the mirror and against the
/// resources declared before it. Nothing is sent to the appliance.
pub fn check(session: &Session, file: &Path, global: &GlobalOpts) -> Result<(), CliError> {
    let proposals = declaration::read(file)?;
    let id = session.server_id()?;
    let reports = session.mirror.check_batch(id, &proposals)?;

    let views: Vec<CheckView<'_>> = proposals
        .iter()
        .zip(&reports)
        .map(|(p, report)| CheckView {
            resource: p.label(),
            report,
        })
        .collect();
    let paint = Painter::new(&global.color);
    let out = output::render_single(&global.output, &views, |v| check_detail(v, paint), |v| {
        v.iter()
            .filter(|c| !c.report.clean)
            .map(|c| c.resource.clone())
            .collect::<Vec<_>>()
            .join("\n")
    });
    output::print_output(&out, global.quiet);

    let count: usize = reports.iter().map(|r| r.conflicts.len()).sum();
    if count > 0 {
        return Err(CliError::Conflicts { count });
    }
    Ok(())
}

// ── Deploy ──────────────────────────────────────────────────────────

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Step")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn deploy_detail(report: &DeployReport, paint: Painter) -> String {
    let state = match report.state {
        DeploymentState::Applied => paint.good(&report.state.to_string()),
        DeploymentState::Conflicted | DeploymentState::Failed => paint.bad(&report.state.to_string()),
        _ => paint.warn(&report.state.to_string()),
    };
    let mut out = format!("{}: {state}", report.resource);
    if report.forced {
        out.push_str(&format!(" {}", paint.warn("(forced)")));
    }
    for c in &report.conflicts {
        out.push_str(&format!("\n    {}", paint.bad(&c.to_string())));
    }
    if !report.steps.is_empty() {
        let rows: Vec<StepRow> = report
            .steps
            .iter()
            .map(|s| {
                let (result, detail) = match &s.outcome {
                    StepOutcome::Created { key } => (paint.good("created"), key.clone()),
                    StepOutcome::Skipped { reason } => (paint.dim("skipped"), reason.clone()),
                    StepOutcome::Failed { error, .. } => (paint.bad("failed"), error.clone()),
                };
                StepRow {
                    name: s.name.clone(),
                    kind: s.kind.to_string(),
                    result,
                    detail,
                }
            })
            .collect();
        out.push('\n');
        out.push_str(&output::render_table(&rows));
    }
    out
}

pub async fn handle(session: &Session, args: DeployArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.dry_run {
        return check(session, &args.file, global);
    }

    let proposals = declaration::read(&args.file)?;
    for p in &proposals {
        p.validate()?;
    }
    let id = session.connected_server(global)?;
    let paint = Painter::new(&global.color);

    if args.sync {
        let result = session.mirror.sync_server(id).await?;
        if !global.quiet {
            eprintln!("{}", sync::detail(&result, paint));
        }
        sync::ensure_usable(&result)?;
    }

    if args.force
        && !util::confirm(
            &format!("Apply {} resource(s) even if they conflict?", proposals.len()),
            "deploy --force",
            global.yes,
        )?
    {
        return Ok(());
    }

    let reports = deploy_all(session, id, proposals, args.force).await?;
    let out = output::render_single(
        &global.output,
        &reports,
        |rs| {
            rs.iter()
                .map(|r| deploy_detail(r, paint))
                .collect::<Vec<_>>()
                .join("\n\n")
        },
        |rs| {
            rs.iter()
                .map(|r| format!("{}\t{}", r.resource, r.state))
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    output::print_output(&out, global.quiet);

    match reports.last() {
        Some(r) if r.state == DeploymentState::Conflicted => Err(CliError::Conflicts {
            count: r.conflicts.len(),
        }),
        Some(r) if r.state == DeploymentState::Failed => Err(CliError::DeployFailed {
            resource: r.resource.clone(),
            message: r.message.clone(),
        }),
        _ => Ok(()),
    }
}

/// Deploy in declaration order, stopping at the first resource that is
/// not applied. Later resources may depend on earlier ones.
async fn deploy_all(
    session: &Session,
    id: opnmirror_core::ServerId,
    proposals: Vec<Proposal>,
    force: bool,
) -> Result<Vec<DeployReport>, CliError> {
    let mut reports = Vec::with_capacity(proposals.len());
    for proposal in proposals {
        let report = session.mirror.deploy(id, proposal, force).await?;
        let applied = report.success();
        reports.push(report);
        if !applied {
            break;
        }
    }
    Ok(reports)
}
