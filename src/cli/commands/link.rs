//! `riskreg link` command - Manage links between controls, use cases and risks

use clap::Subcommand;
use console::style;
use miette::Result;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::cli::commands::utils::{open_session, parse_risk_id, print_structured};
use crate::cli::helpers::truncate_str;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::error::RegisterError;
use crate::core::identity::{ControlId, RiskId, UseCaseId};
use crate::core::links::{parse_id_payload, LinkDiff};

#[derive(Subcommand, Debug)]
pub enum LinkCommands {
    /// Link a control or use case to a risk
    Add(LinkArgs),

    /// Remove a link between a control or use case and a risk
    Remove(LinkArgs),

    /// Replace the whole neighbour set of an entity
    ///
    /// For a risk the ids are controls; for a control or use case they are risks.
    Set(SetArgs),

    /// Show what an entity is linked to
    Show(ShowArgs),

    /// Risk/control relationship matrix
    Matrix,
}

#[derive(clap::Args, Debug)]
pub struct LinkArgs {
    /// Control (e.g. ACC-01) or use case (e.g. UC-003)
    pub source: String,

    /// Risk ID
    pub risk: String,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Risk, control or use case ID
    pub id: String,

    /// JSON array of ids, e.g. '["ACC-01","SEC-02"]'
    pub ids: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Risk, control or use case ID
    pub id: String,
}

/// What an id on the command line refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Control(ControlId),
    UseCase(UseCaseId),
    Risk(RiskId),
}

impl Target {
    /// Control and use-case ids have fixed shapes; anything else is a risk id
    pub fn classify(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Ok(id) = value.parse::<ControlId>() {
            return Ok(Target::Control(id));
        }
        if let Ok(id) = value.parse::<UseCaseId>() {
            return Ok(Target::UseCase(id));
        }
        Ok(Target::Risk(parse_risk_id(value)?))
    }
}

#[derive(Serialize)]
struct Neighbours {
    id: String,
    controls: Vec<String>,
    use_cases: Vec<String>,
    risks: Vec<String>,
}

/// Run a link subcommand
pub async fn run(cmd: LinkCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        LinkCommands::Add(args) => run_add(args, global).await,
        LinkCommands::Remove(args) => run_remove(args, global).await,
        LinkCommands::Set(args) => run_set(args, global).await,
        LinkCommands::Show(args) => run_show(args, global).await,
        LinkCommands::Matrix => run_matrix(global).await,
    }
}

async fn run_add(args: LinkArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let risk = parse_risk_id(&args.risk)?;

    let source = match Target::classify(&args.source)? {
        Target::Control(control) => {
            session.service.link_control(&risk, &control).await?;
            control.to_string()
        }
        Target::UseCase(use_case) => {
            session.service.link_use_case(&use_case, &risk).await?;
            use_case.to_string()
        }
        Target::Risk(_) => {
            return Err(miette::miette!(
                "'{}' is not a control or use case id",
                args.source
            ))
        }
    };

    if !global.quiet {
        println!(
            "{} Linked {} {} {}",
            style("✓").green(),
            style(&source).cyan(),
            style("→").dim(),
            style(&risk).cyan()
        );
    }
    Ok(())
}

async fn run_remove(args: LinkArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let risk = parse_risk_id(&args.risk)?;

    let source = match Target::classify(&args.source)? {
        Target::Control(control) => {
            session.service.unlink_control(&risk, &control).await?;
            control.to_string()
        }
        Target::UseCase(use_case) => {
            session.service.unlink_use_case(&use_case, &risk).await?;
            use_case.to_string()
        }
        Target::Risk(_) => {
            return Err(miette::miette!(
                "'{}' is not a control or use case id",
                args.source
            ))
        }
    };

    if !global.quiet {
        println!(
            "{} Removed link {} {} {}",
            style("✓").green(),
            style(&source).cyan(),
            style("→").dim(),
            style(&risk).cyan()
        );
    }
    Ok(())
}

/// Parse every payload id with `parse`, reporting the first bad one
fn parse_payload<T, F>(payload: &str, parse: F) -> std::result::Result<Vec<T>, RegisterError>
where
    F: Fn(&str) -> Option<T>,
{
    let raw = parse_id_payload(payload).map_err(RegisterError::Validation)?;
    raw.iter()
        .map(|id| {
            parse(id).ok_or_else(|| RegisterError::Validation(format!("invalid id '{}' in payload", id)))
        })
        .collect()
}

async fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;

    let (target, added, removed) = match Target::classify(&args.id)? {
        Target::Risk(risk) => {
            let controls = parse_payload(&args.ids, |s| s.parse::<ControlId>().ok())?;
            let diff = session.service.set_controls_for_risk(&risk, &controls).await?;
            (risk.to_string(), strings(&diff.add), strings(&diff.remove))
        }
        Target::Control(control) => {
            let risks = parse_payload(&args.ids, |s| s.parse::<RiskId>().ok())?;
            let diff = session.service.set_risks_for_control(&control, &risks).await?;
            (control.to_string(), strings(&diff.add), strings(&diff.remove))
        }
        Target::UseCase(use_case) => {
            let risks = parse_payload(&args.ids, |s| s.parse::<RiskId>().ok())?;
            let diff = session.service.set_risks_for_use_case(&use_case, &risks).await?;
            (use_case.to_string(), strings(&diff.add), strings(&diff.remove))
        }
    };

    let diff = LinkDiff {
        add: added,
        remove: removed,
    };
    if print_structured(&diff, session.format)? {
        return Ok(());
    }
    if !global.quiet {
        println!(
            "{} Updated links of {}: {} added, {} removed",
            style("✓").green(),
            style(&target).cyan(),
            style(diff.add.len()).green(),
            style(diff.remove.len()).red()
        );
        for id in &diff.add {
            println!("   {} {}", style("+").green(), id);
        }
        for id in &diff.remove {
            println!("   {} {}", style("-").red(), id);
        }
    }
    Ok(())
}

fn strings<T: ToString>(ids: &[T]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

async fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let provider = session.service.provider();

    let neighbours = match Target::classify(&args.id)? {
        Target::Risk(risk) => Neighbours {
            id: risk.to_string(),
            controls: provider
                .get_controls_for_risk(&risk)
                .await?
                .iter()
                .map(|c| c.mitigation_id.to_string())
                .collect(),
            use_cases: provider
                .get_use_cases_for_risk(&risk)
                .await?
                .iter()
                .map(|u| u.id.to_string())
                .collect(),
            risks: Vec::new(),
        },
        Target::Control(control) => Neighbours {
            id: control.to_string(),
            controls: Vec::new(),
            use_cases: Vec::new(),
            risks: provider
                .get_risks_for_control(&control)
                .await?
                .iter()
                .map(|r| r.id.to_string())
                .collect(),
        },
        Target::UseCase(use_case) => Neighbours {
            id: use_case.to_string(),
            controls: Vec::new(),
            use_cases: Vec::new(),
            risks: provider
                .get_risks_for_use_case(&use_case)
                .await?
                .iter()
                .map(|r| r.id.to_string())
                .collect(),
        },
    };

    if print_structured(&neighbours, session.format)? {
        return Ok(());
    }

    let all: Vec<&String> = neighbours
        .controls
        .iter()
        .chain(&neighbours.use_cases)
        .chain(&neighbours.risks)
        .collect();
    if session.format == OutputFormat::Id {
        for id in all {
            println!("{}", id);
        }
        return Ok(());
    }

    println!("{}", style(&neighbours.id).cyan().bold());
    if all.is_empty() {
        println!("  {}", style("no links").dim());
    }
    for (label, ids) in [
        ("Controls", &neighbours.controls),
        ("Use cases", &neighbours.use_cases),
        ("Risks", &neighbours.risks),
    ] {
        if ids.is_empty() {
            continue;
        }
        println!("  {}:", style(label).bold());
        for id in ids {
            println!("    {}", id);
        }
    }
    Ok(())
}

async fn run_matrix(global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let matrix = session.service.relationship_matrix().await?;

    if print_structured(&matrix, session.format)? {
        return Ok(());
    }
    if session.format == OutputFormat::Id {
        for link in &matrix.relationships {
            println!("{}\t{}", link.control_id, link.risk_id);
        }
        return Ok(());
    }

    if matrix.controls.is_empty() || matrix.risks.is_empty() {
        println!("No risks or controls to relate.");
        return Ok(());
    }

    let mut builder = Builder::default();
    let mut header = vec!["Risk".to_string()];
    header.extend(matrix.controls.iter().map(|c| c.id.to_string()));
    builder.push_record(header);

    for risk in &matrix.risks {
        let mut row = vec![truncate_str(risk.id.as_str(), 32)];
        row.extend(matrix.controls.iter().map(|c| {
            let linked = matrix
                .relationships
                .iter()
                .any(|l| l.risk_id == risk.id && l.control_id == c.id);
            let cell = if linked { "X" } else { "" };
            cell.to_string()
        }));
        builder.push_record(row);
    }

    println!("{}", builder.build().with(Style::markdown()));
    println!();
    println!(
        "{} risk(s), {} control(s), {} link(s).",
        style(matrix.risks.len()).cyan(),
        style(matrix.controls.len()).cyan(),
        style(matrix.relationships.len()).cyan()
    );
    Ok(())
}
