//! `riskreg validate` command - Check relationship integrity

use console::style;
use miette::Result;
use serde::Serialize;

use crate::cli::commands::utils::{open_session, print_structured};
use crate::cli::GlobalOpts;
use crate::core::links::ValidationReport;
use crate::core::service::OrphanReport;

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Also report risks without controls and controls without risks
    #[arg(long)]
    pub orphans: bool,

    /// Treat orphans as errors
    #[arg(long, requires = "orphans")]
    pub strict: bool,

    /// Show summary only, don't show individual issues
    #[arg(long)]
    pub summary: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateOutput {
    #[serde(flatten)]
    report: ValidationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    orphans: Option<OrphanReport>,
}

pub async fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let report = session.service.validate().await?;
    let orphans = if args.orphans {
        Some(session.service.orphans().await?)
    } else {
        None
    };

    let orphan_count = orphans.as_ref().map_or(0, |o| {
        o.risks_without_controls.len() + o.controls_without_risks.len()
    });
    let failed = !report.valid || (args.strict && orphan_count > 0);
    let issue_count = report.issue_count;

    let output = ValidateOutput { report, orphans };
    if print_structured(&output, session.format)? {
        return finish(failed, issue_count, orphan_count);
    }

    if !global.quiet {
        println!("{} Checking relationships...\n", style("→").blue());
    }

    if !args.summary {
        for issue in &output.report.issues {
            println!("{} {}", style("✗").red(), issue);
        }
        if let Some(orphans) = &output.orphans {
            for risk in &orphans.risks_without_controls {
                println!(
                    "{} risk {} has no controls",
                    style("!").yellow(),
                    style(&risk.id).cyan()
                );
            }
            for control in &orphans.controls_without_risks {
                println!(
                    "{} control {} mitigates no risk",
                    style("!").yellow(),
                    style(control.id).cyan()
                );
            }
        }
        if issue_count > 0 || orphan_count > 0 {
            println!();
        }
    }

    if args.orphans {
        println!(
            "{} issue(s), {} orphan(s)",
            style(issue_count).cyan(),
            style(orphan_count).cyan()
        );
    } else {
        println!("{} issue(s)", style(issue_count).cyan());
    }

    if !failed {
        println!(
            "{} All relationships are consistent!",
            style("✓").green().bold()
        );
    }
    finish(failed, issue_count, orphan_count)
}

fn finish(failed: bool, issues: usize, orphans: usize) -> Result<()> {
    if !failed {
        return Ok(());
    }
    if issues > 0 {
        Err(miette::miette!(
            "Validation failed: {} relationship issue(s)",
            issues
        ))
    } else {
        Err(miette::miette!(
            "Validation failed: {} orphaned risk(s) or control(s)",
            orphans
        ))
    }
}
