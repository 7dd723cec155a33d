//! Risk entity type

use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, EntityKind};
use crate::core::identity::{ControlId, RiskId, UseCaseId};

/// Lowest and highest value accepted for likelihood and impact
pub const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Risk category - one of seven fixed register sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Default)]
pub enum RiskCategory {
    #[serde(rename = "Behavioral Risks")]
    Behavioral,
    #[serde(rename = "Accuracy")]
    Accuracy,
    #[serde(rename = "Transparency Risks")]
    Transparency,
    #[serde(rename = "Security and Data Risks")]
    SecurityAndData,
    #[serde(rename = "Business/Cost Related Risks")]
    BusinessCost,
    #[serde(rename = "AI Human Impact Risks")]
    AiHumanImpact,
    #[serde(rename = "Other Risks")]
    #[default]
    Other,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Behavioral => "Behavioral Risks",
            RiskCategory::Accuracy => "Accuracy",
            RiskCategory::Transparency => "Transparency Risks",
            RiskCategory::SecurityAndData => "Security and Data Risks",
            RiskCategory::BusinessCost => "Business/Cost Related Risks",
            RiskCategory::AiHumanImpact => "AI Human Impact Risks",
            RiskCategory::Other => "Other Risks",
        }
    }

    pub fn all() -> &'static [RiskCategory] {
        &[
            RiskCategory::Behavioral,
            RiskCategory::Accuracy,
            RiskCategory::Transparency,
            RiskCategory::SecurityAndData,
            RiskCategory::BusinessCost,
            RiskCategory::AiHumanImpact,
            RiskCategory::Other,
        ]
    }

    /// Match a sheet label against the known categories
    ///
    /// Exact (case-insensitive) names win; otherwise the first category whose
    /// name is contained in the label is used.
    pub fn match_label(label: &str) -> Option<Self> {
        let lower = label.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        Self::all()
            .iter()
            .find(|c| c.as_str().to_lowercase() == lower)
            .or_else(|| {
                Self::all()
                    .iter()
                    .find(|c| lower.contains(&c.as_str().to_lowercase()))
            })
            .copied()
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::match_label(s).ok_or_else(|| {
            format!(
                "Invalid risk category: '{}'. Use one of: {}",
                s,
                Self::all()
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }
}

/// Category for a risk level: >=20 Critical, >=15 High, >=10 Medium, else Low
pub fn level_category(level: u16) -> &'static str {
    match level {
        20.. => "Critical",
        15..=19 => "High",
        10..=14 => "Medium",
        _ => "Low",
    }
}

/// Likelihood/impact assessment, before or after mitigation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scoring {
    pub likelihood: u8,

    pub impact: u8,

    /// Always `likelihood * impact` when both are set
    pub risk_level: u16,

    /// Critical / High / Medium / Low (free text when read from a sheet)
    #[serde(default)]
    pub risk_level_category: String,
}

impl Scoring {
    /// Build a scoring with derived level and category
    pub fn new(likelihood: u8, impact: u8) -> Self {
        let mut scoring = Self {
            likelihood,
            impact,
            ..Default::default()
        };
        scoring.recompute();
        scoring
    }

    /// Recompute level and level category from likelihood and impact
    pub fn recompute(&mut self) {
        self.risk_level = u16::from(self.likelihood) * u16::from(self.impact);
        self.risk_level_category = level_category(self.risk_level).to_string();
    }

    /// Recompute the level; a stated category is kept, a blank one derived
    pub fn normalize(&mut self) {
        self.risk_level = u16::from(self.likelihood) * u16::from(self.impact);
        if self.risk_level_category.trim().is_empty() {
            self.risk_level_category = level_category(self.risk_level).to_string();
        }
    }

    /// Check likelihood and impact are within 1..=5
    pub fn validate(&self, label: &str) -> Result<(), String> {
        for (field, value) in [("likelihood", self.likelihood), ("impact", self.impact)] {
            if !SCORE_RANGE.contains(&value) {
                return Err(format!(
                    "{} {} must be between {} and {}, got {}",
                    label,
                    field,
                    SCORE_RANGE.start(),
                    SCORE_RANGE.end(),
                    value
                ));
            }
        }
        Ok(())
    }
}

/// Partial scoring update, merged key by key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likelihood: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level_category: Option<String>,
}

impl ScoringPatch {
    fn apply(self, scoring: &mut Scoring) {
        let rescored = self.likelihood.is_some() || self.impact.is_some();
        if let Some(likelihood) = self.likelihood {
            scoring.likelihood = likelihood;
        }
        if let Some(impact) = self.impact {
            scoring.impact = impact;
        }
        if rescored {
            scoring.recompute();
        }
        if let Some(category) = self.risk_level_category {
            scoring.risk_level_category = category;
        }
    }
}

/// Mitigation effectiveness derived from the risk reduction percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum MitigationEffectiveness {
    #[default]
    Low,
    Medium,
    High,
}

impl MitigationEffectiveness {
    pub fn from_percentage(percentage: i32) -> Self {
        if percentage >= 75 {
            MitigationEffectiveness::High
        } else if percentage >= 50 {
            MitigationEffectiveness::Medium
        } else {
            MitigationEffectiveness::Low
        }
    }
}

impl std::fmt::Display for MitigationEffectiveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MitigationEffectiveness::Low => write!(f, "Low"),
            MitigationEffectiveness::Medium => write!(f, "Medium"),
            MitigationEffectiveness::High => write!(f, "High"),
        }
    }
}

/// A register risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    /// Unique identifier, derived from the name for new risks
    pub id: RiskId,

    /// Register section
    pub risk_category: RiskCategory,

    /// Risk name
    pub risk: String,

    /// Detailed description
    #[serde(default)]
    pub risk_description: String,

    /// Assessment before mitigation
    pub initial_scoring: Scoring,

    #[serde(default)]
    pub example_mitigations: String,

    #[serde(default)]
    pub agreed_mitigation: String,

    #[serde(default)]
    pub proposed_oversight_ownership: Vec<String>,

    #[serde(default)]
    pub proposed_support: Vec<String>,

    #[serde(default)]
    pub notes: String,

    /// Assessment after mitigation
    pub residual_scoring: Scoring,

    /// `initial level - residual level`, recomputed on every change
    #[serde(default)]
    pub risk_reduction: i32,

    /// Reduction as a rounded percentage of the initial level
    #[serde(default)]
    pub risk_reduction_percentage: i32,

    #[serde(default)]
    pub mitigation_effectiveness: MitigationEffectiveness,

    /// Controls linked through the relationship table (never persisted on the row)
    #[serde(default)]
    pub related_control_ids: Vec<ControlId>,

    /// Use cases linked through the relationship table (never persisted on the row)
    #[serde(default)]
    pub related_use_case_ids: Vec<UseCaseId>,
}

impl Entity for Risk {
    const KIND: EntityKind = EntityKind::Risk;
    type Id = RiskId;

    fn id(&self) -> &RiskId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.risk
    }
}

impl Risk {
    /// Create a risk with its id derived from the name and 3x3 scoring
    pub fn new(name: impl Into<String>, category: RiskCategory) -> Result<Self, crate::core::identity::IdError> {
        let risk: String = name.into();
        let id = RiskId::from_name(&risk)?;
        let mut new = Self {
            id,
            risk_category: category,
            risk,
            risk_description: String::new(),
            initial_scoring: Scoring::new(3, 3),
            example_mitigations: String::new(),
            agreed_mitigation: String::new(),
            proposed_oversight_ownership: Vec::new(),
            proposed_support: Vec::new(),
            notes: String::new(),
            residual_scoring: Scoring::new(3, 3),
            risk_reduction: 0,
            risk_reduction_percentage: 0,
            mitigation_effectiveness: MitigationEffectiveness::default(),
            related_control_ids: Vec::new(),
            related_use_case_ids: Vec::new(),
        };
        new.recompute_reduction();
        Ok(new)
    }

    /// Recompute the reduction figures from the two scorings
    pub fn recompute_reduction(&mut self) {
        let initial = i32::from(self.initial_scoring.risk_level);
        let residual = i32::from(self.residual_scoring.risk_level);
        self.risk_reduction = initial - residual;
        self.risk_reduction_percentage = if initial > 0 {
            (f64::from(self.risk_reduction) / f64::from(initial) * 100.0).round() as i32
        } else {
            0
        };
        self.mitigation_effectiveness =
            MitigationEffectiveness::from_percentage(self.risk_reduction_percentage);
    }

    /// Rederive both levels and the reduction from likelihood and impact
    pub fn normalize(&mut self) {
        self.initial_scoring.normalize();
        self.residual_scoring.normalize();
        self.recompute_reduction();
    }

    /// Validate a risk before it is written
    pub fn validate(&self) -> Result<(), String> {
        if self.risk.trim().is_empty() {
            return Err("risk name is required".to_string());
        }
        self.initial_scoring.validate("initial")?;
        self.residual_scoring.validate("residual")?;
        Ok(())
    }

    /// Apply a partial update; derived fields are recomputed afterwards
    pub fn apply(&mut self, patch: RiskPatch) {
        if let Some(category) = patch.risk_category {
            self.risk_category = category;
        }
        if let Some(name) = patch.risk {
            self.risk = name;
        }
        if let Some(description) = patch.risk_description {
            self.risk_description = description;
        }
        if let Some(scoring) = patch.initial_scoring {
            scoring.apply(&mut self.initial_scoring);
        }
        if let Some(text) = patch.example_mitigations {
            self.example_mitigations = text;
        }
        if let Some(text) = patch.agreed_mitigation {
            self.agreed_mitigation = text;
        }
        if let Some(owners) = patch.proposed_oversight_ownership {
            self.proposed_oversight_ownership = owners;
        }
        if let Some(support) = patch.proposed_support {
            self.proposed_support = support;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(scoring) = patch.residual_scoring {
            scoring.apply(&mut self.residual_scoring);
        }
        self.recompute_reduction();
    }

    /// Copy without the relationship projections
    pub fn stripped(&self) -> Self {
        Self {
            related_control_ids: Vec::new(),
            related_use_case_ids: Vec::new(),
            ..self.clone()
        }
    }
}

/// Partial update for a risk; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_category: Option<RiskCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_scoring: Option<ScoringPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_mitigations: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreed_mitigation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_oversight_ownership: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_support: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_scoring: Option<ScoringPatch>,
}
