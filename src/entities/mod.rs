//! Entity type definitions

pub mod control;
pub mod relationship;
pub mod risk;
pub mod usecase;

pub use control::{Compliance, Control, ControlPatch, Effectiveness, ImplementationStatus};
pub use relationship::{Edge, Relationship};
pub use risk::{Risk, RiskCategory, RiskPatch, Scoring, ScoringPatch};
pub use usecase::{UseCase, UseCasePatch};
