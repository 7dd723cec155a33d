//! Control (mitigation) entity type

use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, EntityKind};
use crate::core::identity::{ControlId, RiskId};

/// Implementation progress of a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum ImplementationStatus {
    Implemented,
    #[serde(rename = "In Progress")]
    InProgress,
    Planned,
    #[serde(rename = "Not Started")]
    #[default]
    NotStarted,
}

impl ImplementationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImplementationStatus::Implemented => "Implemented",
            ImplementationStatus::InProgress => "In Progress",
            ImplementationStatus::Planned => "Planned",
            ImplementationStatus::NotStarted => "Not Started",
        }
    }
}

impl std::fmt::Display for ImplementationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImplementationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "implemented" => Ok(ImplementationStatus::Implemented),
            "in progress" => Ok(ImplementationStatus::InProgress),
            "planned" => Ok(ImplementationStatus::Planned),
            "not started" => Ok(ImplementationStatus::NotStarted),
            _ => Err(format!(
                "Invalid implementation status: '{}'. Use Implemented, In Progress, Planned or Not Started",
                s
            )),
        }
    }
}

/// Assessed effectiveness of a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum Effectiveness {
    High,
    Medium,
    Low,
    #[serde(rename = "Not Assessed")]
    #[default]
    NotAssessed,
}

impl Effectiveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effectiveness::High => "High",
            Effectiveness::Medium => "Medium",
            Effectiveness::Low => "Low",
            Effectiveness::NotAssessed => "Not Assessed",
        }
    }
}

impl std::fmt::Display for Effectiveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Effectiveness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "high" => Ok(Effectiveness::High),
            "medium" => Ok(Effectiveness::Medium),
            "low" => Ok(Effectiveness::Low),
            "not assessed" => Ok(Effectiveness::NotAssessed),
            _ => Err(format!(
                "Invalid effectiveness: '{}'. Use High, Medium, Low or Not Assessed",
                s
            )),
        }
    }
}

/// Cross-references into compliance frameworks (free text)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compliance {
    /// 21 CFR Part 11 / EU Annex 11
    #[serde(default)]
    pub cfr_part11_annex11: String,

    #[serde(default)]
    pub hipaa_safeguard: String,

    #[serde(default)]
    pub gdpr_article: String,

    #[serde(default)]
    pub eu_ai_act_article: String,

    /// NIST SP 800-53 control
    #[serde(default)]
    pub nist80053: String,

    /// SOC 2 trust services criteria
    #[serde(default, rename = "soc2TSC")]
    pub soc2_tsc: String,
}

/// Key-by-key compliance update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompliancePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfr_part11_annex11: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hipaa_safeguard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdpr_article: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eu_ai_act_article: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nist80053: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "soc2TSC")]
    pub soc2_tsc: Option<String>,
}

impl CompliancePatch {
    fn apply(self, compliance: &mut Compliance) {
        let fields = [
            (self.cfr_part11_annex11, &mut compliance.cfr_part11_annex11),
            (self.hipaa_safeguard, &mut compliance.hipaa_safeguard),
            (self.gdpr_article, &mut compliance.gdpr_article),
            (self.eu_ai_act_article, &mut compliance.eu_ai_act_article),
            (self.nist80053, &mut compliance.nist80053),
            (self.soc2_tsc, &mut compliance.soc2_tsc),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

/// A register control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    /// `PREFIX-NN` identifier
    #[serde(rename = "mitigationID")]
    pub mitigation_id: ControlId,

    pub mitigation_description: String,

    pub category: String,

    #[serde(default)]
    pub compliance: Compliance,

    #[serde(default)]
    pub implementation_status: ImplementationStatus,

    #[serde(default)]
    pub effectiveness: Effectiveness,

    /// Risks linked through the relationship table
    #[serde(default)]
    pub related_risk_ids: Vec<RiskId>,
}

impl Entity for Control {
    const KIND: EntityKind = EntityKind::Control;
    type Id = ControlId;

    fn id(&self) -> &ControlId {
        &self.mitigation_id
    }

    fn title(&self) -> &str {
        &self.mitigation_description
    }
}

impl Control {
    pub fn new(id: ControlId, description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            mitigation_id: id,
            mitigation_description: description.into(),
            category: category.into(),
            compliance: Compliance::default(),
            implementation_status: ImplementationStatus::default(),
            effectiveness: Effectiveness::default(),
            related_risk_ids: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.mitigation_description.trim().is_empty() {
            return Err("mitigation description is required".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("control category is required".to_string());
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: ControlPatch) {
        if let Some(description) = patch.mitigation_description {
            self.mitigation_description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(compliance) = patch.compliance {
            compliance.apply(&mut self.compliance);
        }
        if let Some(status) = patch.implementation_status {
            self.implementation_status = status;
        }
        if let Some(effectiveness) = patch.effectiveness {
            self.effectiveness = effectiveness;
        }
    }

    pub fn stripped(&self) -> Self {
        Self {
            related_risk_ids: Vec::new(),
            ..self.clone()
        }
    }
}

/// Partial update for a control
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<CompliancePatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_status: Option<ImplementationStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effectiveness: Option<Effectiveness>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> Control {
        Control::new("SEC-03".parse().unwrap(), "Encrypt prompts at rest", "Security & Data Privacy")
    }

    #[test]
    fn test_new_control_defaults() {
        let ctrl = control();
        assert_eq!(ctrl.implementation_status, ImplementationStatus::NotStarted);
        assert_eq!(ctrl.effectiveness, Effectiveness::NotAssessed);
        assert!(ctrl.validate().is_ok());
    }

    #[test]
    fn test_compliance_patch_merges_keys() {
        let mut ctrl = control();
        ctrl.compliance.gdpr_article = "Art. 32".to_string();
        ctrl.apply(ControlPatch {
            compliance: Some(CompliancePatch {
                hipaa_safeguard: Some("164.312(a)".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(ctrl.compliance.gdpr_article, "Art. 32");
        assert_eq!(ctrl.compliance.hipaa_safeguard, "164.312(a)");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("in progress".parse::<ImplementationStatus>().unwrap(), ImplementationStatus::InProgress);
        assert_eq!("Not_Started".parse::<ImplementationStatus>().unwrap(), ImplementationStatus::NotStarted);
        assert!("done".parse::<ImplementationStatus>().is_err());
        assert_eq!("not-assessed".parse::<Effectiveness>().unwrap(), Effectiveness::NotAssessed);
    }

    #[test]
    fn test_control_json_field_names() {
        let json = serde_json::to_value(control()).unwrap();
        assert_eq!(json["mitigationID"], "SEC-03");
        assert_eq!(json["implementationStatus"], "Not Started");
        assert!(json["compliance"].get("soc2TSC").is_some());
    }

    #[test]
    fn test_validate_requires_description() {
        let mut ctrl = control();
        ctrl.mitigation_description = " ".to_string();
        assert!(ctrl.validate().is_err());
    }
}
