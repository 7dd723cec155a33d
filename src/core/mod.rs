//! Core module - register model, persistence and services

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod identity;
pub mod links;
pub mod project;
pub mod provider;
pub mod register;
pub mod service;

pub use cache::TtlCache;
pub use config::Config;
pub use entity::{Entity, EntityKind};
pub use error::RegisterError;
pub use identity::{ControlId, ControlPrefix, IdError, RiskId, UseCaseId};
pub use project::{Project, ProjectError};
pub use provider::{PersistenceProvider, ProviderSettings};
pub use register::{Register, RiskLayout};
pub use service::RegisterService;
