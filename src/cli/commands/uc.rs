//! `riskreg uc` command - AI use case management

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::commands::utils::{open_session, parse_use_case_id, print_structured};
use crate::cli::helpers::{join_or_dash, split_list, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::usecase::{ExecutionPatch, ImpactPatch, ObjectivePatch, Rating};
use crate::entities::{UseCase, UseCasePatch};

#[derive(Subcommand, Debug)]
pub enum UcCommands {
    /// List use cases with filtering
    List(ListArgs),

    /// Create a new use case
    New(NewArgs),

    /// Show a use case's details
    Show(ShowArgs),

    /// Update fields of a use case
    Edit(EditArgs),

    /// Delete a use case and every link to it
    Delete(DeleteArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status (exact, case-insensitive)
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Filter by business area (case-insensitive substring)
    #[arg(long, short = 'a')]
    pub business_area: Option<String>,

    /// Filter by AI category
    #[arg(long)]
    pub ai_category: Option<String>,

    /// Search in title and description (case-insensitive substring)
    #[arg(long)]
    pub search: Option<String>,

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

/// Fields shared by `new` and `edit`
#[derive(clap::Args, Debug, Default)]
pub struct UseCaseFields {
    /// Detailed description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Business area
    #[arg(long, short = 'a')]
    pub business_area: Option<String>,

    /// AI categories (comma-separated)
    #[arg(long)]
    pub ai_categories: Option<String>,

    /// Lifecycle status (Concept, Under Review, Approved, In Development, Pilot, In Production, On Hold, Cancelled)
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Current state of the process
    #[arg(long)]
    pub current_state: Option<String>,

    /// Desired future state
    #[arg(long)]
    pub future_state: Option<String>,

    /// Proposed solution
    #[arg(long)]
    pub solution: Option<String>,

    /// Expected benefits
    #[arg(long)]
    pub benefits: Option<String>,

    /// Impact points (comma-separated)
    #[arg(long)]
    pub impact_points: Option<String>,

    /// Estimated cost saving
    #[arg(long)]
    pub cost_saving: Option<f64>,

    /// Estimated effort in months
    #[arg(long)]
    pub effort_months: Option<f64>,

    /// Functions impacted (comma-separated)
    #[arg(long)]
    pub functions: Option<String>,

    /// Data requirements
    #[arg(long)]
    pub data_requirements: Option<String>,

    /// AI complexity rating
    #[arg(long)]
    pub complexity: Option<Rating>,

    /// Feasibility rating
    #[arg(long)]
    pub feasibility: Option<Rating>,

    /// Value rating
    #[arg(long)]
    pub value: Option<Rating>,

    /// Risk rating
    #[arg(long)]
    pub risk_rating: Option<Rating>,

    /// Implementation start date
    #[arg(long)]
    pub start: Option<String>,

    /// Implementation end date
    #[arg(long)]
    pub end: Option<String>,

    /// Owner
    #[arg(long)]
    pub owner: Option<String>,

    /// Stakeholders (comma-separated)
    #[arg(long)]
    pub stakeholders: Option<String>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
}

impl UseCaseFields {
    fn into_patch(self) -> UseCasePatch {
        let objective = ObjectivePatch {
            current_state: self.current_state,
            future_state: self.future_state,
            solution: self.solution,
            benefits: self.benefits,
        };
        let has_objective = objective.current_state.is_some()
            || objective.future_state.is_some()
            || objective.solution.is_some()
            || objective.benefits.is_some();

        let impact = ImpactPatch {
            impact_points: self.impact_points.as_deref().map(split_list),
            cost_saving: self.cost_saving,
            effort_months: self.effort_months,
        };
        let has_impact = impact.impact_points.is_some()
            || impact.cost_saving.is_some()
            || impact.effort_months.is_some();

        let execution = ExecutionPatch {
            functions_impacted: self.functions.as_deref().map(split_list),
            data_requirements: self.data_requirements,
            ai_complexity: self.complexity,
            feasibility: self.feasibility,
            value: self.value,
            risk: self.risk_rating,
        };
        let has_execution = execution.functions_impacted.is_some()
            || execution.data_requirements.is_some()
            || execution.ai_complexity.is_some()
            || execution.feasibility.is_some()
            || execution.value.is_some()
            || execution.risk.is_some();

        UseCasePatch {
            title: None,
            description: self.description,
            business_area: self.business_area,
            ai_categories: self.ai_categories.as_deref().map(split_list),
            objective: has_objective.then_some(objective),
            impact: has_impact.then_some(impact),
            execution: has_execution.then_some(execution),
            status: self.status,
            implementation_start: self.start,
            implementation_end: self.end,
            owner: self.owner,
            stakeholders: self.stakeholders.as_deref().map(split_list),
            notes: self.notes,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Use case title
    #[arg(long, short = 't')]
    pub title: String,

    #[command(flatten)]
    pub fields: UseCaseFields,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Use case ID (e.g. UC-001)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Use case ID
    pub id: String,

    /// New title
    #[arg(long, short = 't')]
    pub title: Option<String>,

    #[command(flatten)]
    pub fields: UseCaseFields,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Use case ID
    pub id: String,
}

/// Run a uc subcommand
pub async fn run(cmd: UcCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        UcCommands::List(args) => run_list(args, global).await,
        UcCommands::New(args) => run_new(args, global).await,
        UcCommands::Show(args) => run_show(args, global).await,
        UcCommands::Edit(args) => run_edit(args, global).await,
        UcCommands::Delete(args) => run_delete(args, global).await,
    }
}

async fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let mut use_cases: Vec<UseCase> = session.service.list_use_cases().await?.as_ref().clone();

    use_cases.retain(|u| {
        let status_match = args
            .status
            .as_ref()
            .map_or(true, |s| u.status.eq_ignore_ascii_case(s.trim()));

        let area_match = args.business_area.as_ref().map_or(true, |area| {
            u.business_area.to_lowercase().contains(&area.to_lowercase())
        });

        let category_match = args.ai_category.as_ref().map_or(true, |cat| {
            u.ai_categories.iter().any(|c| c.eq_ignore_ascii_case(cat.trim()))
        });

        let search_match = args.search.as_ref().map_or(true, |search| {
            let search_lower = search.to_lowercase();
            u.title.to_lowercase().contains(&search_lower)
                || u.description.to_lowercase().contains(&search_lower)
        });

        status_match && area_match && category_match && search_match
    });

    use_cases.sort_by_key(|u| u.id);
    if args.reverse {
        use_cases.reverse();
    }

    if let Some(limit) = args.limit {
        use_cases.truncate(limit);
    }

    if args.count {
        println!("{}", use_cases.len());
        return Ok(());
    }

    let format = match session.format {
        OutputFormat::Auto => OutputFormat::Tsv,
        f => f,
    };

    if use_cases.is_empty() && format == OutputFormat::Tsv {
        println!("No use cases found.");
        println!();
        println!("Create one with: {}", style("riskreg uc new").yellow());
        return Ok(());
    }

    if print_structured(&use_cases, format)? {
        return Ok(());
    }

    match format {
        OutputFormat::Id => {
            for uc in &use_cases {
                println!("{}", uc.id);
            }
        }
        _ => {
            println!(
                "{:<8} {:<36} {:<20} {:<15} {:<5}",
                style("ID").bold(),
                style("TITLE").bold(),
                style("AREA").bold(),
                style("STATUS").bold(),
                style("RISKS").bold()
            );
            println!("{}", "-".repeat(88));

            for uc in &use_cases {
                println!(
                    "{:<8} {:<36} {:<20} {:<15} {:<5}",
                    style(uc.id).cyan(),
                    truncate_str(&uc.title, 36),
                    truncate_str(&uc.business_area, 20),
                    uc.status,
                    uc.related_risk_ids.len()
                );
            }

            println!();
            println!("{} use case(s) found.", style(use_cases.len()).cyan());
        }
    }

    Ok(())
}

async fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;

    let use_case = session
        .service
        .create_use_case(&args.title, args.fields.into_patch())
        .await?;

    if print_structured(&use_case, session.format)? {
        return Ok(());
    }
    if session.format == OutputFormat::Id {
        println!("{}", use_case.id);
        return Ok(());
    }
    if !global.quiet {
        println!(
            "{} Created use case {}",
            style("✓").green(),
            style(use_case.id).cyan()
        );
        println!("   Status: {}", use_case.status);
    }
    Ok(())
}

async fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = parse_use_case_id(&args.id)?;
    let uc = session.service.get_use_case(&id).await?;

    if print_structured(&uc, session.format)? {
        return Ok(());
    }
    if session.format == OutputFormat::Id {
        println!("{}", uc.id);
        return Ok(());
    }

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(uc.id).cyan());
    println!("{}: {}", style("Title").bold(), style(&uc.title).yellow());
    println!("{}: {}", style("Status").bold(), uc.status);
    if !uc.business_area.is_empty() {
        println!("{}: {}", style("Business Area").bold(), uc.business_area);
    }
    if !uc.ai_categories.is_empty() {
        println!("{}: {}", style("AI Categories").bold(), uc.ai_categories.join(", "));
    }
    println!("{}", style("─".repeat(60)).dim());

    if !uc.description.is_empty() {
        println!();
        println!("{}", style("Description:").bold());
        println!("{}", uc.description);
    }

    let objective = [
        ("Current state", &uc.objective.current_state),
        ("Future state", &uc.objective.future_state),
        ("Solution", &uc.objective.solution),
        ("Benefits", &uc.objective.benefits),
    ];
    if objective.iter().any(|(_, v)| !v.is_empty()) {
        println!();
        println!("{}", style("Objective:").bold());
        for (label, value) in objective.iter().filter(|(_, v)| !v.is_empty()) {
            println!("  {}: {}", style(label).dim(), value.trim());
        }
    }

    println!();
    println!("{}", style("Impact:").bold());
    if !uc.impact.impact_points.is_empty() {
        for point in &uc.impact.impact_points {
            println!("  • {}", point);
        }
    }
    if let Some(saving) = uc.impact.cost_saving {
        println!("  {}: {}", style("Cost saving").dim(), saving);
    }
    if let Some(effort) = uc.impact.effort_months {
        println!("  {}: {} months", style("Effort").dim(), effort);
    }

    let ratings = [
        ("Complexity", uc.execution.ai_complexity),
        ("Feasibility", uc.execution.feasibility),
        ("Value", uc.execution.value),
        ("Risk", uc.execution.risk),
    ];
    if ratings.iter().any(|(_, r)| r.is_some()) {
        println!();
        println!("{}", style("Execution:").bold());
        for (label, rating) in ratings {
            if let Some(rating) = rating {
                println!("  {}: {}", style(label).dim(), rating);
            }
        }
    }

    println!();
    println!(
        "{}: {}",
        style("Risks").bold(),
        join_or_dash(&uc.related_risk_ids)
    );

    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {} | {}: {} | {}: {}",
        style("Owner").dim(),
        if uc.owner.is_empty() { "-" } else { uc.owner.as_str() },
        style("Created").dim(),
        uc.created_date,
        style("Updated").dim(),
        uc.last_updated
    );

    Ok(())
}

async fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = parse_use_case_id(&args.id)?;

    let mut patch = args.fields.into_patch();
    patch.title = args.title;
    let uc = session.service.update_use_case(&id, patch).await?;

    if print_structured(&uc, session.format)? {
        return Ok(());
    }
    if !global.quiet {
        println!(
            "{} Updated use case {}",
            style("✓").green(),
            style(uc.id).cyan()
        );
    }
    Ok(())
}

async fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = parse_use_case_id(&args.id)?;

    session.service.delete_use_case(&id).await?;

    if !global.quiet {
        println!("{} Deleted use case {}", style("✓").green(), style(id).cyan());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_patches_only_when_given() {
        let patch = UseCaseFields {
            owner: Some("Ops".to_string()),
            ..Default::default()
        }
        .into_patch();
        assert_eq!(patch.owner.as_deref(), Some("Ops"));
        assert!(patch.objective.is_none());
        assert!(patch.impact.is_none());
        assert!(patch.execution.is_none());
    }

    #[test]
    fn test_lists_split_on_commas() {
        let patch = UseCaseFields {
            ai_categories: Some("NLP, Vision".to_string()),
            effort_months: Some(4.5),
            value: Some(Rating::High),
            ..Default::default()
        }
        .into_patch();
        assert_eq!(
            patch.ai_categories,
            Some(vec!["NLP".to_string(), "Vision".to_string()])
        );
        assert_eq!(patch.impact.and_then(|i| i.effort_months), Some(4.5));
        assert_eq!(patch.execution.and_then(|e| e.value), Some(Rating::High));
    }
}
