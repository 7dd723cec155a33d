//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker directory holding project configuration
pub const PROJECT_DIR: &str = ".riskreg";

/// A directory tree with a `.riskreg/` marker
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .riskreg/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create the project structure at the given path
    pub fn init(path: &Path, force: bool) -> Result<Self, ProjectError> {
        let root = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        let project_dir = root.join(PROJECT_DIR);
        if project_dir.exists() && !force {
            return Err(ProjectError::AlreadyExists(root.clone()));
        }

        let project = Self { root };
        std::fs::create_dir_all(project.default_store_root())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(project.config_path(), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(project)
    }

    fn default_config() -> &'static str {
        r#"# Risk register configuration

# Where the register document lives: local or http
store: local

# Id of the register document in the store
file_id: register

# Directory for the local store (relative to the project root)
# store_root: .riskreg/store

# Base URL and token for the http store
# store_url: https://www.googleapis.com/drive/v3
# token: ""

# Seconds a fetched document is reused before refetching
# cache_ttl_secs: 300

# Seconds list views are reused
# view_ttl_secs: 1800

# Refuse to overwrite a document that changed since it was read
# optimistic: true
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .riskreg configuration directory
    pub fn config_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir().join("config.yaml")
    }

    /// Local store directory used when the config names none
    pub fn default_store_root(&self) -> PathBuf {
        self.config_dir().join("store")
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a risk register project (searched from {searched_from:?}). Run 'riskreg init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("risk register project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}
