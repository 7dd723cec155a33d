//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, ctrl::CtrlCommands, init::InitArgs, link::LinkCommands,
    risk::RiskCommands, status::StatusArgs, uc::UcCommands, validate::ValidateArgs,
};

#[derive(Parser)]
#[command(name = "riskreg")]
#[command(author, version, about = "Risk and controls register")]
#[command(long_about = "Manage risks, controls, use cases and the links between them, kept together in one spreadsheet document.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .riskreg/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new register project
    Init(InitArgs),

    /// Risk management
    #[command(subcommand)]
    Risk(RiskCommands),

    /// Control (mitigation) management
    #[command(subcommand)]
    Ctrl(CtrlCommands),

    /// AI use case management
    #[command(subcommand)]
    Uc(UcCommands),

    /// Manage links between controls, use cases and risks
    #[command(subcommand)]
    Link(LinkCommands),

    /// Check that every link has both ends and both sides agree
    Validate(ValidateArgs),

    /// Show register summary and statistics
    Status(StatusArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (pretty for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// Just IDs, one per line
    Id,
}
