//! `riskreg ctrl` command - Control (mitigation) management

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;

use crate::cli::commands::utils::{open_session, parse_control_id, print_structured};
use crate::cli::helpers::{join_or_dash, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{ControlId, ControlPrefix};
use crate::core::service::NewControlId;
use crate::entities::control::CompliancePatch;
use crate::entities::{Control, ControlPatch, Effectiveness, ImplementationStatus};

#[derive(Subcommand, Debug)]
pub enum CtrlCommands {
    /// List controls with filtering
    List(ListArgs),

    /// Create a new control
    New(NewArgs),

    /// Show a control's details
    Show(ShowArgs),

    /// Update fields of a control
    Edit(EditArgs),

    /// Delete a control and every link to it
    Delete(DeleteArgs),

    /// Print the next free id for a prefix
    NextId(NextIdArgs),
}

/// Columns to sort list output by
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ListColumn {
    Id,
    Category,
    Status,
    Effectiveness,
    Risks,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by id prefix (ACC, SEC, LOG, GOV, TEST)
    #[arg(long, short = 'p')]
    pub prefix: Option<ControlPrefix>,

    /// Filter by category (case-insensitive substring)
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Filter by implementation status
    #[arg(long, short = 's')]
    pub status: Option<ImplementationStatus>,

    /// Filter by effectiveness
    #[arg(long, short = 'e')]
    pub effectiveness: Option<Effectiveness>,

    /// Show only controls not linked to any risk
    #[arg(long)]
    pub unlinked: bool,

    /// Search in description (case-insensitive substring)
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

/// Compliance mapping flags shared by `new` and `edit`
#[derive(clap::Args, Debug, Default)]
pub struct ComplianceArgs {
    /// 21 CFR Part 11 / Annex 11 reference
    #[arg(long)]
    pub cfr: Option<String>,

    /// HIPAA safeguard
    #[arg(long)]
    pub hipaa: Option<String>,

    /// GDPR article
    #[arg(long)]
    pub gdpr: Option<String>,

    /// EU AI Act article
    #[arg(long)]
    pub eu_ai_act: Option<String>,

    /// NIST 800-53 control
    #[arg(long)]
    pub nist: Option<String>,

    /// SOC 2 trust services criteria
    #[arg(long)]
    pub soc2: Option<String>,
}

impl ComplianceArgs {
    fn into_patch(self) -> Option<CompliancePatch> {
        let patch = CompliancePatch {
            cfr_part11_annex11: self.cfr,
            hipaa_safeguard: self.hipaa,
            gdpr_article: self.gdpr,
            eu_ai_act_article: self.eu_ai_act,
            nist80053: self.nist,
            soc2_tsc: self.soc2,
        };
        let any = [
            &patch.cfr_part11_annex11,
            &patch.hipaa_safeguard,
            &patch.gdpr_article,
            &patch.eu_ai_act_article,
            &patch.nist80053,
            &patch.soc2_tsc,
        ]
        .iter()
        .any(|f| f.is_some());
        any.then_some(patch)
    }
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Explicit control id (e.g. SEC-04)
    #[arg(long, conflicts_with = "prefix")]
    pub id: Option<ControlId>,

    /// Take the next free id under this prefix
    #[arg(long, short = 'p', required_unless_present = "id")]
    pub prefix: Option<ControlPrefix>,

    /// What the control does
    #[arg(long, short = 'd')]
    pub description: String,

    /// Category (default: derived from the id prefix)
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Implementation status
    #[arg(long, short = 's')]
    pub status: Option<ImplementationStatus>,

    /// Assessed effectiveness
    #[arg(long, short = 'e')]
    pub effectiveness: Option<Effectiveness>,

    #[command(flatten)]
    pub compliance: ComplianceArgs,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Control ID (e.g. ACC-01)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Control ID
    pub id: String,

    /// New description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// New category
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Implementation status
    #[arg(long, short = 's')]
    pub status: Option<ImplementationStatus>,

    /// Assessed effectiveness
    #[arg(long, short = 'e')]
    pub effectiveness: Option<Effectiveness>,

    #[command(flatten)]
    pub compliance: ComplianceArgs,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Control ID
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct NextIdArgs {
    /// Id prefix (ACC, SEC, LOG, GOV, TEST)
    pub prefix: ControlPrefix,
}

/// Category written for new controls when none is given
pub fn default_category(prefix: ControlPrefix) -> &'static str {
    match prefix {
        ControlPrefix::Acc => "Accuracy & Judgment",
        ControlPrefix::Sec => "Security & Data Privacy",
        ControlPrefix::Log => "Audit & Traceability",
        ControlPrefix::Gov => "Governance & Compliance",
        ControlPrefix::Test => "Testing & Validation",
    }
}

/// Run a ctrl subcommand
pub async fn run(cmd: CtrlCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CtrlCommands::List(args) => run_list(args, global).await,
        CtrlCommands::New(args) => run_new(args, global).await,
        CtrlCommands::Show(args) => run_show(args, global).await,
        CtrlCommands::Edit(args) => run_edit(args, global).await,
        CtrlCommands::Delete(args) => run_delete(args, global).await,
        CtrlCommands::NextId(args) => run_next_id(args, global).await,
    }
}

async fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let mut controls: Vec<Control> = session.service.list_controls().await?.as_ref().clone();

    controls.retain(|c| {
        let prefix_match = args.prefix.map_or(true, |p| c.mitigation_id.prefix() == p);

        let category_match = args.category.as_ref().map_or(true, |cat| {
            c.category.to_lowercase().contains(&cat.to_lowercase())
        });

        let status_match = args.status.map_or(true, |s| c.implementation_status == s);
        let effectiveness_match = args.effectiveness.map_or(true, |e| c.effectiveness == e);

        let search_match = args.search.as_ref().map_or(true, |search| {
            c.mitigation_description
                .to_lowercase()
                .contains(&search.to_lowercase())
        });

        let unlinked_match = !args.unlinked || c.related_risk_ids.is_empty();

        prefix_match
            && category_match
            && status_match
            && effectiveness_match
            && search_match
            && unlinked_match
    });

    match args.sort {
        ListColumn::Id => controls.sort_by(|a, b| a.mitigation_id.cmp(&b.mitigation_id)),
        ListColumn::Category => controls.sort_by(|a, b| a.category.cmp(&b.category)),
        ListColumn::Status => controls.sort_by(|a, b| {
            a.implementation_status
                .as_str()
                .cmp(b.implementation_status.as_str())
        }),
        ListColumn::Effectiveness => {
            controls.sort_by(|a, b| a.effectiveness.as_str().cmp(b.effectiveness.as_str()))
        }
        ListColumn::Risks => {
            controls.sort_by(|a, b| b.related_risk_ids.len().cmp(&a.related_risk_ids.len()))
        }
    }

    if args.reverse {
        controls.reverse();
    }

    if let Some(limit) = args.limit {
        controls.truncate(limit);
    }

    if args.count {
        println!("{}", controls.len());
        return Ok(());
    }

    let format = match session.format {
        OutputFormat::Auto => OutputFormat::Tsv,
        f => f,
    };

    if controls.is_empty() && format == OutputFormat::Tsv {
        println!("No controls found.");
        println!();
        println!("Create one with: {}", style("riskreg ctrl new").yellow());
        return Ok(());
    }

    if print_structured(&controls, format)? {
        return Ok(());
    }

    match format {
        OutputFormat::Id => {
            for control in &controls {
                println!("{}", control.mitigation_id);
            }
        }
        _ => {
            println!(
                "{:<8} {:<24} {:<36} {:<12} {:<13} {:<5}",
                style("ID").bold(),
                style("CATEGORY").bold(),
                style("DESCRIPTION").bold(),
                style("STATUS").bold(),
                style("EFFECTIVE").bold(),
                style("RISKS").bold()
            );
            println!("{}", "-".repeat(103));

            for control in &controls {
                println!(
                    "{:<8} {:<24} {:<36} {:<12} {:<13} {:<5}",
                    style(control.mitigation_id).cyan(),
                    truncate_str(&control.category, 24),
                    truncate_str(&control.mitigation_description, 36),
                    control.implementation_status,
                    control.effectiveness,
                    control.related_risk_ids.len()
                );
            }

            println!();
            println!("{} control(s) found.", style(controls.len()).cyan());
        }
    }

    Ok(())
}

async fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;

    let (id, prefix) = match (args.id, args.prefix) {
        (Some(id), _) => (NewControlId::Exact(id), id.prefix()),
        (None, Some(prefix)) => (NewControlId::Next(prefix), prefix),
        (None, None) => return Err(miette::miette!("either --id or --prefix is required")),
    };
    let category = args
        .category
        .unwrap_or_else(|| default_category(prefix).to_string());

    let details = ControlPatch {
        implementation_status: args.status,
        effectiveness: args.effectiveness,
        compliance: args.compliance.into_patch(),
        ..Default::default()
    };

    let control = session
        .service
        .create_control(id, &args.description, &category, details)
        .await?;

    if print_structured(&control, session.format)? {
        return Ok(());
    }
    if session.format == OutputFormat::Id {
        println!("{}", control.mitigation_id);
        return Ok(());
    }
    if !global.quiet {
        println!(
            "{} Created control {}",
            style("✓").green(),
            style(control.mitigation_id).cyan()
        );
        println!("   {}", style(&control.category).dim());
    }
    Ok(())
}

async fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = parse_control_id(&args.id)?;
    let control = session.service.get_control(&id).await?;

    if print_structured(&control, session.format)? {
        return Ok(());
    }
    if session.format == OutputFormat::Id {
        println!("{}", control.mitigation_id);
        return Ok(());
    }

    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {}",
        style("ID").bold(),
        style(control.mitigation_id).cyan()
    );
    println!("{}: {}", style("Category").bold(), control.category);
    println!("{}: {}", style("Status").bold(), control.implementation_status);
    println!("{}: {}", style("Effectiveness").bold(), control.effectiveness);
    println!("{}", style("─".repeat(60)).dim());

    println!();
    println!("{}", style("Description:").bold());
    println!("{}", control.mitigation_description);

    let compliance = &control.compliance;
    let mappings = [
        ("21 CFR Part 11 / Annex 11", &compliance.cfr_part11_annex11),
        ("HIPAA", &compliance.hipaa_safeguard),
        ("GDPR", &compliance.gdpr_article),
        ("EU AI Act", &compliance.eu_ai_act_article),
        ("NIST 800-53", &compliance.nist80053),
        ("SOC 2", &compliance.soc2_tsc),
    ];
    if mappings.iter().any(|(_, v)| !v.is_empty()) {
        println!();
        println!("{}", style("Compliance:").bold());
        for (label, value) in mappings.iter().filter(|(_, v)| !v.is_empty()) {
            println!("  {}: {}", style(label).dim(), value);
        }
    }

    println!();
    println!(
        "{}: {}",
        style("Mitigates").bold(),
        join_or_dash(&control.related_risk_ids)
    );

    Ok(())
}

async fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = parse_control_id(&args.id)?;

    let patch = ControlPatch {
        mitigation_description: args.description,
        category: args.category,
        compliance: args.compliance.into_patch(),
        implementation_status: args.status,
        effectiveness: args.effectiveness,
    };
    let control = session.service.update_control(&id, patch).await?;

    if print_structured(&control, session.format)? {
        return Ok(());
    }
    if !global.quiet {
        println!(
            "{} Updated control {}",
            style("✓").green(),
            style(control.mitigation_id).cyan()
        );
    }
    Ok(())
}

async fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = parse_control_id(&args.id)?;

    session.service.delete_control(&id).await?;

    if !global.quiet {
        println!("{} Deleted control {}", style("✓").green(), style(id).cyan());
    }
    Ok(())
}

async fn run_next_id(args: NextIdArgs, global: &GlobalOpts) -> Result<()> {
    let session = open_session(global)?;
    let id = session.service.next_control_id(args.prefix).await?;
    println!("{}", id);
    Ok(())
}
