//! Shared utilities for CLI commands

use clap::ValueEnum;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{ControlId, RiskId, UseCaseId};
use crate::core::{Config, PersistenceProvider, Project, RegisterService};
use crate::store::DocumentClient;

/// An opened register plus the output format to render it in
pub struct Session {
    pub service: RegisterService,
    pub config: Config,
    pub format: OutputFormat,
}

/// Find the project named by `--project`, or the one enclosing the cwd
///
/// An explicit `--project` that is not a project is an error; otherwise a
/// missing project just means no project layer in the config.
pub fn discover_project(global: &GlobalOpts) -> Result<Option<Project>> {
    match &global.project {
        Some(path) => Project::discover_from(path)
            .map(Some)
            .map_err(|e| miette::miette!("{}", e)),
        None => Ok(Project::discover().ok()),
    }
}

/// Load config and wire the store, provider and service together
pub fn open_session(global: &GlobalOpts) -> Result<Session> {
    let project = discover_project(global)?;
    let config = Config::load(project.as_ref());

    let store = config
        .document_store(project.as_ref())
        .map_err(|e| miette::miette!("{}", e))?;
    let client = DocumentClient::new(store, config.file_id());
    let provider = Arc::new(PersistenceProvider::new(client, config.provider_settings()));
    tracing::debug!(
        backend = ?config.backend(),
        file_id = config.file_id(),
        "opened register"
    );

    Ok(Session {
        service: RegisterService::new(provider, config.view_ttl()),
        format: resolve_format(global.format, &config),
        config,
    })
}

/// `--format` wins; with `auto`, fall back to the configured default
pub fn resolve_format(requested: OutputFormat, config: &Config) -> OutputFormat {
    if requested != OutputFormat::Auto {
        return requested;
    }
    config
        .default_format
        .as_deref()
        .and_then(|name| OutputFormat::from_str(name, true).ok())
        .unwrap_or(OutputFormat::Auto)
}

pub fn parse_risk_id(value: &str) -> Result<RiskId> {
    value.parse().map_err(|e| miette::miette!("{}", e))
}

pub fn parse_control_id(value: &str) -> Result<ControlId> {
    value.parse().map_err(|e| miette::miette!("{}", e))
}

pub fn parse_use_case_id(value: &str) -> Result<UseCaseId> {
    value.parse().map_err(|e| miette::miette!("{}", e))
}

/// Print a value as JSON or YAML; returns false for the other formats
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
            Ok(true)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
            Ok(true)
        }
        _ => Ok(false),
    }
}
