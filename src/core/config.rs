//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::cache::{DEFAULT_SNAPSHOT_TTL, DEFAULT_VIEW_TTL};
use crate::core::project::Project;
use crate::core::provider::ProviderSettings;
use crate::store::http::DEFAULT_BASE_URL;
use crate::store::{DocumentStore, HttpStore, LocalStore};

/// Document id used when none is configured
pub const DEFAULT_FILE_ID: &str = "register";

/// Which document store backs the register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// A directory of xlsx files
    #[default]
    Local,
    /// A remote files API
    Http,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StoreBackend::Local),
            "http" | "drive" => Ok(StoreBackend::Http),
            other => Err(format!("unknown store '{}', expected local or http", other)),
        }
    }
}

/// Risk register configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: Option<StoreBackend>,

    /// Directory of the local store
    pub store_root: Option<PathBuf>,

    /// Base URL of the http store
    pub store_url: Option<String>,

    /// Id of the register document
    pub file_id: Option<String>,

    /// Bearer token for the http store
    pub token: Option<String>,

    pub cache_ttl_secs: Option<u64>,

    pub view_ttl_secs: Option<u64>,

    /// Check the document revision before every upload
    pub optimistic: Option<bool>,

    /// Default output format
    pub default_format: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the local store needs a project or a store_root setting")]
    NoStoreRoot,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/riskreg/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.riskreg/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read_file(&project.config_path()) {
                config.merge(project_config);
            }
        }

        // 4. Environment variables
        config.apply_env(|key| std::env::var(key).ok());

        config
    }

    fn read_file(path: &std::path::Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "riskreg")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Override fields from `RISKREG_*` variables
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(store) = lookup("RISKREG_STORE") {
            match store.parse() {
                Ok(backend) => self.store = Some(backend),
                Err(e) => tracing::warn!(error = %e, "ignoring RISKREG_STORE"),
            }
        }
        if let Some(file_id) = lookup("RISKREG_FILE_ID") {
            self.file_id = Some(file_id);
        }
        if let Some(url) = lookup("RISKREG_STORE_URL") {
            self.store_url = Some(url);
        }
        if let Some(token) = lookup("RISKREG_TOKEN") {
            self.token = Some(token);
        }
        for (key, slot) in [
            ("RISKREG_CACHE_TTL_SECS", &mut self.cache_ttl_secs),
            ("RISKREG_VIEW_TTL_SECS", &mut self.view_ttl_secs),
        ] {
            if let Some(value) = lookup(key) {
                match value.trim().parse() {
                    Ok(secs) => *slot = Some(secs),
                    Err(_) => tracing::warn!(key, %value, "ignoring non-numeric ttl"),
                }
            }
        }
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.store_root.is_some() {
            self.store_root = other.store_root;
        }
        if other.store_url.is_some() {
            self.store_url = other.store_url;
        }
        if other.file_id.is_some() {
            self.file_id = other.file_id;
        }
        if other.token.is_some() {
            self.token = other.token;
        }
        if other.cache_ttl_secs.is_some() {
            self.cache_ttl_secs = other.cache_ttl_secs;
        }
        if other.view_ttl_secs.is_some() {
            self.view_ttl_secs = other.view_ttl_secs;
        }
        if other.optimistic.is_some() {
            self.optimistic = other.optimistic;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    pub fn backend(&self) -> StoreBackend {
        self.store.unwrap_or_default()
    }

    pub fn file_id(&self) -> &str {
        self.file_id.as_deref().unwrap_or(DEFAULT_FILE_ID)
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SNAPSHOT_TTL)
    }

    pub fn view_ttl(&self) -> Duration {
        self.view_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_VIEW_TTL)
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            snapshot_ttl: self.cache_ttl(),
            optimistic: self.optimistic.unwrap_or(true),
        }
    }

    /// Local store directory; relative paths are taken from the project root
    pub fn store_root(&self, project: Option<&Project>) -> Result<PathBuf, ConfigError> {
        match (&self.store_root, project) {
            (Some(root), _) if root.is_absolute() => Ok(root.clone()),
            (Some(root), Some(project)) => Ok(project.root().join(root)),
            (Some(root), None) => Ok(root.clone()),
            (None, Some(project)) => Ok(project.default_store_root()),
            (None, None) => Err(ConfigError::NoStoreRoot),
        }
    }

    pub fn store_url(&self) -> &str {
        self.store_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Build the configured document store
    pub fn document_store(
        &self,
        project: Option<&Project>,
    ) -> Result<Arc<dyn DocumentStore>, ConfigError> {
        Ok(match self.backend() {
            StoreBackend::Local => Arc::new(LocalStore::new(self.store_root(project)?)),
            StoreBackend::Http => Arc::new(HttpStore::new(self.store_url(), self.token.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_merge_prefers_later_layer() {
        let mut config: Config = serde_yml::from_str("store: http\nfile_id: abc\ncache_ttl_secs: 10\n").unwrap();
        config.merge(serde_yml::from_str("file_id: xyz\n").unwrap());

        assert_eq!(config.backend(), StoreBackend::Http);
        assert_eq!(config.file_id(), "xyz");
        assert_eq!(config.cache_ttl(), Duration::from_secs(10));
        assert_eq!(config.view_ttl(), DEFAULT_VIEW_TTL);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("RISKREG_STORE", "local"),
            ("RISKREG_FILE_ID", "from-env"),
            ("RISKREG_VIEW_TTL_SECS", "60"),
            ("RISKREG_CACHE_TTL_SECS", "soon"),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            store: Some(StoreBackend::Http),
            cache_ttl_secs: Some(5),
            ..Default::default()
        };
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.backend(), StoreBackend::Local);
        assert_eq!(config.file_id(), "from-env");
        assert_eq!(config.view_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.file_id(), DEFAULT_FILE_ID);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert!(config.provider_settings().optimistic);
        assert!(matches!(config.store_root(None), Err(ConfigError::NoStoreRoot)));
    }
}
