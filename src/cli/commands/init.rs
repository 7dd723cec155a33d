//! `riskreg init` command - Initialize a new register project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::codec;
use crate::core::config::StoreBackend;
use crate::core::project::{Project, ProjectError, PROJECT_DIR};
use crate::core::{Config, RiskLayout};
use crate::store::LocalStore;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Force initialization even if .riskreg/ already exists
    #[arg(long)]
    pub force: bool,

    /// Create the register with the 16-column risk sheet (no id column)
    #[arg(long)]
    pub legacy: bool,
}

pub async fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
    }

    let project = match Project::init(&path, args.force) {
        Ok(project) => project,
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} Risk register project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to reinitialize",
                style("riskreg init --force").yellow()
            );
            return Ok(());
        }
        Err(e) => return Err(miette::miette!("{}", e)),
    };

    let config = Config::load(Some(&project));
    if !global.quiet {
        println!(
            "{} Initialized risk register project at {}",
            style("✓").green(),
            style(project.root().display()).cyan()
        );
        println!("   {}", style(format!("{}/config.yaml", PROJECT_DIR)).dim());
    }

    match config.backend() {
        StoreBackend::Local => {
            let root = config
                .store_root(Some(&project))
                .map_err(|e| miette::miette!("{}", e))?;
            let store = LocalStore::new(root);
            let document = store.path_for(config.file_id());

            if document.exists() {
                if !global.quiet {
                    println!(
                        "{} Keeping existing register {}",
                        style("•").dim(),
                        style(document.display()).cyan()
                    );
                }
            } else {
                let layout = if args.legacy {
                    RiskLayout::Legacy
                } else {
                    RiskLayout::Keyed
                };
                let bytes = codec::empty_document(layout).into_diagnostic()?;
                store
                    .create(config.file_id(), &bytes)
                    .await
                    .map_err(|e| miette::miette!("{}", e))?;
                if !global.quiet {
                    println!(
                        "{} Created empty register {}",
                        style("✓").green(),
                        style(document.display()).cyan()
                    );
                }
            }
        }
        StoreBackend::Http => {
            if !global.quiet {
                println!(
                    "{} Remote store configured; document {} must already exist",
                    style("!").yellow(),
                    style(config.file_id()).cyan()
                );
            }
        }
    }

    if !global.quiet {
        println!();
        println!("Next steps:");
        println!(
            "  {} Add your first risk",
            style("riskreg risk new --title \"...\" --category \"...\"").yellow()
        );
        println!(
            "  {} Add a control",
            style("riskreg ctrl new --prefix ACC --description \"...\"").yellow()
        );
        println!(
            "  {} Link them",
            style("riskreg link add ACC-01 RISK-...").yellow()
        );
    }
    Ok(())
}
