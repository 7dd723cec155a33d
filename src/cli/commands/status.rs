//! `riskreg status` command - Register summary and statistics

use console::style;
use miette::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::{builder::Builder, settings::Style};

use crate::cli::commands::utils::{open_session, print_structured};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::provider::RegisterSummary;
use crate::core::service::{RiskStatistics, UseCaseStatistics};

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Refetch the document instead of reusing a cached copy
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    register: RegisterSummary,
    risks: RiskStatistics,
    use_cases: UseCaseStatistics,
}

pub async fn run(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    if args.refresh {
        session.service.invalidate().await;
    }

    let report = StatusReport {
        register: session.service.summary().await?,
        risks: session.service.risk_statistics().await?,
        use_cases: session.service.use_case_statistics().await?,
    };

    if print_structured(&report, session.format)? {
        return Ok(());
    }
    if session.format == OutputFormat::Id {
        println!("{}", report.register.file_id);
        return Ok(());
    }

    let width = 60;
    let summary = &report.register;
    println!("{}", style("Risk Register Status").bold().underlined());
    println!("{}", "═".repeat(width));
    println!(
        "{}: {} ({:?} store)",
        style("Document").bold(),
        style(&summary.file_id).cyan(),
        session.config.backend()
    );
    println!("{}: {}", style("Revision").bold(), style(&summary.revision).dim());
    if summary.legacy_layout {
        println!(
            "{}: 16-column risk sheet (ids derived from names)",
            style("Layout").bold()
        );
    }
    if summary.unparsed_rows > 0 {
        println!(
            "{} {} row(s) could not be parsed and are kept as-is",
            style("!").yellow(),
            summary.unparsed_rows
        );
    }
    println!();

    let mut counts = Builder::default();
    counts.push_record(["Risks", "Controls", "Use cases", "Links"]);
    counts.push_record([
        summary.risks.to_string(),
        summary.controls.to_string(),
        summary.use_cases.to_string(),
        summary.relationships.to_string(),
    ]);
    println!("{}", counts.build().with(Style::markdown()));

    let risks = &report.risks;
    if risks.total > 0 {
        println!();
        println!("{}", style("RISKS").bold());
        print_counts(&risks.by_category);
        println!();

        let bands = &risks.by_risk_level;
        let mut levels = Builder::default();
        levels.push_record(["Very low", "Low", "Medium", "High", "Very high"]);
        levels.push_record([
            bands.very_low.to_string(),
            bands.low.to_string(),
            bands.medium.to_string(),
            bands.high.to_string(),
            bands.very_high.to_string(),
        ]);
        println!("{}", levels.build().with(Style::markdown()));
        println!();
        println!(
            "  Average level: {} initial, {} residual",
            style(risks.average_initial_risk).yellow(),
            style(risks.average_residual_risk).green()
        );
        let unmitigated = if risks.without_controls > 0 {
            style(risks.without_controls).red()
        } else {
            style(risks.without_controls).green()
        };
        println!(
            "  With controls: {} | Without: {}",
            risks.with_controls, unmitigated
        );
    }

    let use_cases = &report.use_cases;
    if use_cases.total > 0 {
        println!();
        println!("{}", style("USE CASES").bold());
        print_counts(&use_cases.by_status);
        if !use_cases.by_business_area.is_empty() {
            println!("  {}", style("By business area:").dim());
            print_counts(&use_cases.by_business_area);
        }
        println!(
            "  Total cost saving: {} | Average effort: {:.1} months",
            style(use_cases.total_cost_saving).green(),
            use_cases.average_effort_months
        );
    }

    println!("{}", "═".repeat(width));
    Ok(())
}

fn print_counts(counts: &BTreeMap<String, usize>) {
    for (label, count) in counts {
        println!("  {:<32} {}", label, style(count).cyan());
    }
}
