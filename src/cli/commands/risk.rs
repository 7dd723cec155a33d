//! `riskreg risk` command - Risk management

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;

use crate::cli::commands::utils::{open_session, parse_risk_id, print_structured};
use crate::cli::helpers::{join_or_dash, split_list, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::risk::level_category;
use crate::entities::{Risk, RiskCategory, RiskPatch, Scoring, ScoringPatch};

#[derive(Subcommand, Debug)]
pub enum RiskCommands {
    /// List risks with filtering
    List(ListArgs),

    /// Create a new risk
    New(NewArgs),

    /// Show a risk's details
    Show(ShowArgs),

    /// Update fields of a risk
    Edit(EditArgs),

    /// Delete a risk and every link to it
    Delete(DeleteArgs),
}

/// Columns to sort list output by
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ListColumn {
    Id,
    Name,
    Category,
    Initial,
    Residual,
    Reduction,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by category (matches the category name case-insensitively)
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Only risks whose residual level is at least this
    #[arg(long)]
    pub min_level: Option<u16>,

    /// Show only risks without controls
    #[arg(long)]
    pub unmitigated: bool,

    /// Search in name and description (case-insensitive substring)
    #[arg(long)]
    pub search: Option<String>,

    /// Sort by column
    #[arg(long, default_value = "id")]
    pub sort: ListColumn,

    /// Reverse sort order
    #[arg(long, short = 'r')]
    pub reverse: bool,

    /// Limit number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

/// Free-text and scoring fields shared by `new` and `edit`
#[derive(clap::Args, Debug, Default)]
pub struct RiskFields {
    /// Detailed description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Initial likelihood (1-5)
    #[arg(long)]
    pub likelihood: Option<u8>,

    /// Initial impact (1-5)
    #[arg(long)]
    pub impact: Option<u8>,

    /// Residual likelihood after mitigation (1-5)
    #[arg(long)]
    pub residual_likelihood: Option<u8>,

    /// Residual impact after mitigation (1-5)
    #[arg(long)]
    pub residual_impact: Option<u8>,

    /// Example mitigations
    #[arg(long)]
    pub example_mitigations: Option<String>,

    /// Agreed mitigation
    #[arg(long)]
    pub agreed_mitigation: Option<String>,

    /// Proposed oversight owners (comma-separated)
    #[arg(long)]
    pub owner: Option<String>,

    /// Proposed support (comma-separated)
    #[arg(long)]
    pub support: Option<String>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
}

impl RiskFields {
    fn into_patch(self) -> RiskPatch {
        let scoring = |likelihood: Option<u8>, impact: Option<u8>| {
            (likelihood.is_some() || impact.is_some()).then(|| ScoringPatch {
                likelihood,
                impact,
                risk_level_category: None,
            })
        };
        RiskPatch {
            risk_description: self.description,
            initial_scoring: scoring(self.likelihood, self.impact),
            residual_scoring: scoring(self.residual_likelihood, self.residual_impact),
            example_mitigations: self.example_mitigations,
            agreed_mitigation: self.agreed_mitigation,
            proposed_oversight_ownership: self.owner.as_deref().map(split_list),
            proposed_support: self.support.as_deref().map(split_list),
            notes: self.notes,
            ..Default::default()
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Risk name; the id is derived from it
    #[arg(long, short = 't')]
    pub title: String,

    /// Risk category
    #[arg(long, short = 'c')]
    pub category: RiskCategory,

    #[command(flatten)]
    pub fields: RiskFields,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Risk ID (e.g. RISK-MODEL-DRIFT)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Risk ID
    pub id: String,

    /// New name; must derive the same id
    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// New category
    #[arg(long, short = 'c')]
    pub category: Option<RiskCategory>,

    #[command(flatten)]
    pub fields: RiskFields,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Risk ID
    pub id: String,
}

/// Run a risk subcommand
pub async fn run(cmd: RiskCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RiskCommands::List(args) => run_list(args, global).await,
        RiskCommands::New(args) => run_new(args, global).await,
        RiskCommands::Show(args) => run_show(args, global).await,
        RiskCommands::Edit(args) => run_edit(args, global).await,
        RiskCommands::Delete(args) => run_delete(args, global).await,
    }
}

async fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;

    let mut risks: Vec<Risk> = match args.min_level {
        Some(threshold) => session.service.high_risks(threshold).await?,
        None => session.service.list_risks().await?.as_ref().clone(),
    };

    let category = match &args.category {
        Some(label) => Some(
            RiskCategory::match_label(label)
                .ok_or_else(|| miette::miette!("unknown risk category '{}'", label))?,
        ),
        None => None,
    };

    risks.retain(|r| {
        let category_match = category.map_or(true, |c| r.risk_category == c);

        let search_match = args.search.as_ref().map_or(true, |search| {
            let search_lower = search.to_lowercase();
            r.risk.to_lowercase().contains(&search_lower)
                || r.risk_description.to_lowercase().contains(&search_lower)
        });

        let unmitigated_match = !args.unmitigated || r.related_control_ids.is_empty();

        category_match && search_match && unmitigated_match
    });

    match args.sort {
        ListColumn::Id => risks.sort_by(|a, b| a.id.cmp(&b.id)),
        ListColumn::Name => risks.sort_by(|a, b| a.risk.cmp(&b.risk)),
        ListColumn::Category => risks.sort_by(|a, b| a.risk_category.cmp(&b.risk_category)),
        ListColumn::Initial => risks.sort_by(|a, b| {
            b.initial_scoring.risk_level.cmp(&a.initial_scoring.risk_level)
        }),
        ListColumn::Residual => risks.sort_by(|a, b| {
            b.residual_scoring.risk_level.cmp(&a.residual_scoring.risk_level)
        }),
        ListColumn::Reduction => {
            risks.sort_by(|a, b| b.risk_reduction_percentage.cmp(&a.risk_reduction_percentage))
        }
    }

    if args.reverse {
        risks.reverse();
    }

    if let Some(limit) = args.limit {
        risks.truncate(limit);
    }

    if args.count {
        println!("{}", risks.len());
        return Ok(());
    }

    let format = match session.format {
        OutputFormat::Auto => OutputFormat::Tsv,
        f => f,
    };

    if risks.is_empty() && format == OutputFormat::Tsv {
        println!("No risks found.");
        println!();
        println!("Create one with: {}", style("riskreg risk new").yellow());
        return Ok(());
    }

    if print_structured(&risks, format)? {
        return Ok(());
    }

    match format {
        OutputFormat::Id => {
            for risk in &risks {
                println!("{}", risk.id);
            }
        }
        _ => {
            println!(
                "{:<30} {:<24} {:<32} {:<5} {:<5} {:<5}",
                style("ID").bold(),
                style("CATEGORY").bold(),
                style("NAME").bold(),
                style("INIT").bold(),
                style("RESID").bold(),
                style("CTRLS").bold()
            );
            println!("{}", "-".repeat(106));

            for risk in &risks {
                println!(
                    "{:<30} {:<24} {:<32} {:<5} {:<5} {:<5}",
                    style(truncate_str(risk.id.as_str(), 30)).cyan(),
                    truncate_str(risk.risk_category.as_str(), 24),
                    truncate_str(&risk.risk, 32),
                    risk.initial_scoring.risk_level,
                    level_styled(risk.residual_scoring.risk_level),
                    risk.related_control_ids.len()
                );
            }

            println!();
            println!("{} risk(s) found.", style(risks.len()).cyan());
        }
    }

    Ok(())
}

async fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;

    let risk = session
        .service
        .create_risk(&args.title, args.category, args.fields.into_patch())
        .await?;

    if print_structured(&risk, session.format)? {
        return Ok(());
    }
    if session.format == OutputFormat::Id {
        println!("{}", risk.id);
        return Ok(());
    }
    if !global.quiet {
        println!(
            "{} Created risk {}",
            style("✓").green(),
            style(&risk.id).cyan()
        );
        println!(
            "   Level: {} initial, {} residual",
            style(risk.initial_scoring.risk_level).yellow(),
            level_styled(risk.residual_scoring.risk_level)
        );
    }
    Ok(())
}

async fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = parse_risk_id(&args.id)?;
    let risk = session.service.get_risk(&id).await?;

    if print_structured(&risk, session.format)? {
        return Ok(());
    }
    if session.format == OutputFormat::Id {
        println!("{}", risk.id);
        return Ok(());
    }

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&risk.id).cyan());
    println!("{}: {}", style("Name").bold(), style(&risk.risk).yellow());
    println!("{}: {}", style("Category").bold(), risk.risk_category);
    println!("{}", style("─".repeat(60)).dim());

    if !risk.risk_description.is_empty() {
        println!();
        println!("{}", style("Description:").bold());
        println!("{}", risk.risk_description);
    }

    println!();
    println!("{}", style("Risk Assessment:").bold());
    print_scoring("Initial", &risk.initial_scoring);
    print_scoring("Residual", &risk.residual_scoring);
    println!(
        "  {}: {} ({}%, {})",
        style("Reduction").dim(),
        risk.risk_reduction,
        risk.risk_reduction_percentage,
        risk.mitigation_effectiveness
    );

    if !risk.example_mitigations.is_empty() || !risk.agreed_mitigation.is_empty() {
        println!();
        println!("{}", style("Mitigation:").bold());
        if !risk.example_mitigations.is_empty() {
            println!("  {}: {}", style("Examples").dim(), risk.example_mitigations.trim());
        }
        if !risk.agreed_mitigation.is_empty() {
            println!("  {}: {}", style("Agreed").dim(), risk.agreed_mitigation.trim());
        }
    }

    println!();
    println!("{}", style("Links:").bold());
    println!("  {}: {}", style("Controls").dim(), join_or_dash(&risk.related_control_ids));
    println!("  {}: {}", style("Use cases").dim(), join_or_dash(&risk.related_use_case_ids));

    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {} | {}: {}",
        style("Owners").dim(),
        join_or_dash(&risk.proposed_oversight_ownership),
        style("Support").dim(),
        join_or_dash(&risk.proposed_support)
    );
    if !risk.notes.is_empty() {
        println!("{}: {}", style("Notes").dim(), risk.notes);
    }

    Ok(())
}

async fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = parse_risk_id(&args.id)?;

    let mut patch = args.fields.into_patch();
    patch.risk = args.title;
    patch.risk_category = args.category;

    let risk = session.service.update_risk(&id, patch).await?;

    if print_structured(&risk, session.format)? {
        return Ok(());
    }
    if !global.quiet {
        println!(
            "{} Updated risk {}",
            style("✓").green(),
            style(&risk.id).cyan()
        );
    }
    Ok(())
}

async fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = parse_risk_id(&args.id)?;

    session.service.delete_risk(&id).await?;

    if !global.quiet {
        println!("{} Deleted risk {}", style("✓").green(), style(&id).cyan());
    }
    Ok(())
}

fn print_scoring(label: &str, scoring: &Scoring) {
    println!(
        "  {}: {} x {} = {} ({})",
        style(label).dim(),
        scoring.likelihood,
        scoring.impact,
        level_styled(scoring.risk_level),
        if scoring.risk_level_category.is_empty() {
            level_category(scoring.risk_level)
        } else {
            scoring.risk_level_category.as_str()
        }
    );
}

fn level_styled(level: u16) -> console::StyledObject<String> {
    match level {
        20.. => style(level.to_string()).red().bold(),
        15..=19 => style(level.to_string()).red(),
        10..=14 => style(level.to_string()).yellow(),
        _ => style(level.to_string()).green(),
    }
}
