//! Use case entity type - AI initiatives that introduce risks

use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, EntityKind};
use crate::core::identity::{RiskId, UseCaseId};

/// Lifecycle states a use case may be in
pub const USE_CASE_STATUSES: &[&str] = &[
    "Concept",
    "Under Review",
    "Approved",
    "In Development",
    "Pilot",
    "In Production",
    "On Hold",
    "Cancelled",
];

/// Status assigned to new use cases
pub const DEFAULT_USE_CASE_STATUS: &str = "Concept";

/// Three-step rating used for complexity, feasibility, value and risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    Low,
    Medium,
    High,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Low => "Low",
            Rating::Medium => "Medium",
            Rating::High => "High",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Rating::Low),
            "medium" => Ok(Rating::Medium),
            "high" => Ok(Rating::High),
            _ => Err(format!("Invalid rating: '{}'. Use Low, Medium or High", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub future_state: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub benefits: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
    #[serde(default)]
    pub impact_points: Vec<String>,

    /// Expected yearly saving
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_saving: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_months: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    #[serde(default)]
    pub functions_impacted: Vec<String>,
    #[serde(default)]
    pub data_requirements: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_complexity: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feasibility: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<Rating>,
}

/// A register use case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCase {
    pub id: UseCaseId,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub business_area: String,

    #[serde(default)]
    pub ai_categories: Vec<String>,

    #[serde(default)]
    pub objective: Objective,

    #[serde(default)]
    pub impact: Impact,

    #[serde(default)]
    pub execution: Execution,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub implementation_start: String,

    #[serde(default)]
    pub implementation_end: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub stakeholders: Vec<String>,

    #[serde(default)]
    pub notes: String,

    /// RFC 3339 timestamp
    #[serde(default)]
    pub created_date: String,

    /// RFC 3339 timestamp
    #[serde(default)]
    pub last_updated: String,

    /// Risks linked through the relationship table
    #[serde(default)]
    pub related_risk_ids: Vec<RiskId>,
}

impl Entity for UseCase {
    const KIND: EntityKind = EntityKind::UseCase;
    type Id = UseCaseId;

    fn id(&self) -> &UseCaseId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }
}

impl UseCase {
    pub fn new(id: UseCaseId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            business_area: String::new(),
            ai_categories: Vec::new(),
            objective: Objective::default(),
            impact: Impact::default(),
            execution: Execution::default(),
            status: DEFAULT_USE_CASE_STATUS.to_string(),
            implementation_start: String::new(),
            implementation_end: String::new(),
            owner: String::new(),
            stakeholders: Vec::new(),
            notes: String::new(),
            created_date: String::new(),
            last_updated: String::new(),
            related_risk_ids: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("use case title is required".to_string());
        }
        if !self.status.is_empty() && !USE_CASE_STATUSES.contains(&self.status.as_str()) {
            return Err(format!(
                "Invalid use case status: '{}'. Use one of: {}",
                self.status,
                USE_CASE_STATUSES.join(", ")
            ));
        }
        for value in [self.impact.cost_saving, self.impact.effort_months].into_iter().flatten() {
            if value < 0.0 {
                return Err("cost saving and effort months must not be negative".to_string());
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: UseCasePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(area) = patch.business_area {
            self.business_area = area;
        }
        if let Some(categories) = patch.ai_categories {
            self.ai_categories = categories;
        }
        if let Some(objective) = patch.objective {
            objective.apply(&mut self.objective);
        }
        if let Some(impact) = patch.impact {
            impact.apply(&mut self.impact);
        }
        if let Some(execution) = patch.execution {
            execution.apply(&mut self.execution);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(start) = patch.implementation_start {
            self.implementation_start = start;
        }
        if let Some(end) = patch.implementation_end {
            self.implementation_end = end;
        }
        if let Some(owner) = patch.owner {
            self.owner = owner;
        }
        if let Some(stakeholders) = patch.stakeholders {
            self.stakeholders = stakeholders;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }

    pub fn stripped(&self) -> Self {
        Self {
            related_risk_ids: Vec::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectivePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefits: Option<String>,
}

impl ObjectivePatch {
    fn apply(self, objective: &mut Objective) {
        if let Some(v) = self.current_state {
            objective.current_state = v;
        }
        if let Some(v) = self.future_state {
            objective.future_state = v;
        }
        if let Some(v) = self.solution {
            objective.solution = v;
        }
        if let Some(v) = self.benefits {
            objective.benefits = v;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_saving: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_months: Option<f64>,
}

impl ImpactPatch {
    fn apply(self, impact: &mut Impact) {
        if let Some(v) = self.impact_points {
            impact.impact_points = v;
        }
        if self.cost_saving.is_some() {
            impact.cost_saving = self.cost_saving;
        }
        if self.effort_months.is_some() {
            impact.effort_months = self.effort_months;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions_impacted: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_complexity: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feasibility: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<Rating>,
}

impl ExecutionPatch {
    fn apply(self, execution: &mut Execution) {
        if let Some(v) = self.functions_impacted {
            execution.functions_impacted = v;
        }
        if let Some(v) = self.data_requirements {
            execution.data_requirements = v;
        }
        if self.ai_complexity.is_some() {
            execution.ai_complexity = self.ai_complexity;
        }
        if self.feasibility.is_some() {
            execution.feasibility = self.feasibility;
        }
        if self.value.is_some() {
            execution.value = self.value;
        }
        if self.risk.is_some() {
            execution.risk = self.risk;
        }
    }
}

/// Partial update for a use case; nested groups merge key by key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCasePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<ObjectivePatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakeholders: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
