//! Relationship edges between controls, use cases and risks

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::entity::{Entity, EntityKind};
use crate::core::identity::{ControlId, RiskId, UseCaseId};

/// Link type written for control edges
pub const DEFAULT_CONTROL_LINK_TYPE: &str = "mitigates";

/// Link type that marks a use-case edge in the relationship table
pub const USE_CASE_LINK_TYPE: &str = "UseCase-Risk";

/// Effectiveness written for new edges
pub const DEFAULT_LINK_EFFECTIVENESS: &str = "Medium";

/// One endpoint pair. Every edge ends at a risk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edge {
    ControlRisk { control: ControlId, risk: RiskId },
    UseCaseRisk { use_case: UseCaseId, risk: RiskId },
}

impl Edge {
    pub fn control(control: ControlId, risk: RiskId) -> Self {
        Edge::ControlRisk { control, risk }
    }

    pub fn use_case(use_case: UseCaseId, risk: RiskId) -> Self {
        Edge::UseCaseRisk { use_case, risk }
    }

    pub fn risk(&self) -> &RiskId {
        match self {
            Edge::ControlRisk { risk, .. } | Edge::UseCaseRisk { risk, .. } => risk,
        }
    }

    /// Source id as written in the first relationship column
    pub fn source(&self) -> String {
        match self {
            Edge::ControlRisk { control, .. } => control.to_string(),
            Edge::UseCaseRisk { use_case, .. } => use_case.to_string(),
        }
    }

    /// True when `id` names either endpoint
    pub fn touches(&self, id: &str) -> bool {
        self.source() == id || self.risk().as_str() == id
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source(), self.risk())
    }
}

/// Current time in the relationship table's timestamp format
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One row of the relationship table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub edge: Edge,

    /// `mitigates` for controls, `UseCase-Risk` for use cases, or whatever the sheet holds
    pub link_type: String,

    pub effectiveness: String,

    #[serde(default)]
    pub notes: String,

    pub created_at: String,

    pub last_updated: String,
}

impl Entity for Relationship {
    const KIND: EntityKind = EntityKind::Relationship;
    type Id = Edge;

    fn id(&self) -> &Edge {
        &self.edge
    }

    fn title(&self) -> &str {
        &self.link_type
    }
}

impl Relationship {
    /// New edge with default link type and effectiveness, stamped now
    pub fn new(edge: Edge) -> Self {
        let link_type = match edge {
            Edge::ControlRisk { .. } => DEFAULT_CONTROL_LINK_TYPE,
            Edge::UseCaseRisk { .. } => USE_CASE_LINK_TYPE,
        };
        let now = timestamp_now();
        Self {
            edge,
            link_type: link_type.to_string(),
            effectiveness: DEFAULT_LINK_EFFECTIVENESS.to_string(),
            notes: String::new(),
            created_at: now.clone(),
            last_updated: now,
        }
    }
}
