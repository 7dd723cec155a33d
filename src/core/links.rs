//! Relationship builder: adjacency over the relationship table
//!
//! The relationship table is the only stored form of a link. Every
//! `related_*_ids` list handed out is projected from it here.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::core::identity::{ControlId, RiskId, UseCaseId};
use crate::core::register::Register;
use crate::entities::{Control, Edge, Relationship, Risk, UseCase};

/// Both directions of every link, first-seen order, no duplicates
#[derive(Debug, Default, Clone)]
pub struct Adjacency {
    controls_by_risk: HashMap<RiskId, Vec<ControlId>>,
    risks_by_control: HashMap<ControlId, Vec<RiskId>>,
    use_cases_by_risk: HashMap<RiskId, Vec<UseCaseId>>,
    risks_by_use_case: HashMap<UseCaseId, Vec<RiskId>>,
}

fn push_unique<K: Hash + Eq, V: PartialEq>(map: &mut HashMap<K, Vec<V>>, key: K, value: V) {
    let list = map.entry(key).or_default();
    if !list.contains(&value) {
        list.push(value);
    }
}

impl Adjacency {
    pub fn build<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = &'a Relationship>,
    {
        let mut adj = Self::default();
        for rel in edges {
            match &rel.edge {
                Edge::ControlRisk { control, risk } => {
                    push_unique(&mut adj.controls_by_risk, risk.clone(), *control);
                    push_unique(&mut adj.risks_by_control, *control, risk.clone());
                }
                Edge::UseCaseRisk { use_case, risk } => {
                    push_unique(&mut adj.use_cases_by_risk, risk.clone(), *use_case);
                    push_unique(&mut adj.risks_by_use_case, *use_case, risk.clone());
                }
            }
        }
        adj
    }

    pub fn from_register(register: &Register) -> Self {
        Self::build(register.relationships.iter())
    }

    pub fn controls_for(&self, risk: &RiskId) -> &[ControlId] {
        self.controls_by_risk.get(risk).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn risks_for_control(&self, control: &ControlId) -> &[RiskId] {
        self.risks_by_control.get(control).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn use_cases_for(&self, risk: &RiskId) -> &[UseCaseId] {
        self.use_cases_by_risk.get(risk).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn risks_for_use_case(&self, use_case: &UseCaseId) -> &[RiskId] {
        self.risks_by_use_case.get(use_case).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn project_risk(&self, risk: &Risk) -> Risk {
        Risk {
            related_control_ids: self.controls_for(&risk.id).to_vec(),
            related_use_case_ids: self.use_cases_for(&risk.id).to_vec(),
            ..risk.clone()
        }
    }

    pub fn project_control(&self, control: &Control) -> Control {
        Control {
            related_risk_ids: self.risks_for_control(&control.mitigation_id).to_vec(),
            ..control.clone()
        }
    }

    pub fn project_use_case(&self, use_case: &UseCase) -> UseCase {
        UseCase {
            related_risk_ids: self.risks_for_use_case(&use_case.id).to_vec(),
            ..use_case.clone()
        }
    }
}

/// A problem found by [`validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Edge names a control that is not in the register
    MissingControl { risk_id: RiskId, control_id: ControlId },
    /// Edge names a risk that is not in the register
    MissingRisk { source_id: String, risk_id: RiskId },
    /// Edge names a use case that is not in the register
    MissingUseCase { risk_id: RiskId, use_case_id: UseCaseId },
    /// One side lists the other but not the reverse
    OneWayRelationship { source_id: String, risk_id: RiskId },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::MissingControl { risk_id, control_id } => {
                write!(f, "risk {} references non-existent control {}", risk_id, control_id)
            }
            ValidationIssue::MissingRisk { source_id, risk_id } => {
                write!(f, "{} references non-existent risk {}", source_id, risk_id)
            }
            ValidationIssue::MissingUseCase { risk_id, use_case_id } => {
                write!(f, "risk {} references non-existent use case {}", risk_id, use_case_id)
            }
            ValidationIssue::OneWayRelationship { source_id, risk_id } => {
                write!(f, "{} and {} are linked in one direction only", source_id, risk_id)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub issue_count: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            valid: issues.is_empty(),
            issue_count: issues.len(),
            issues,
        }
    }
}

/// Check every edge has both endpoints and both projections agree
pub fn validate(register: &Register) -> ValidationReport {
    let adj = Adjacency::from_register(register);
    let mut issues = Vec::new();

    for rel in register.relationships.iter() {
        let risk_id = rel.edge.risk();
        if !register.risks.contains(risk_id) {
            issues.push(ValidationIssue::MissingRisk {
                source_id: rel.edge.source(),
                risk_id: risk_id.clone(),
            });
        }
        match &rel.edge {
            Edge::ControlRisk { control, risk } => {
                if !register.controls.contains(control) {
                    issues.push(ValidationIssue::MissingControl {
                        risk_id: risk.clone(),
                        control_id: *control,
                    });
                }
                let forward = adj.controls_for(risk).contains(control);
                let backward = adj.risks_for_control(control).contains(risk);
                if forward != backward {
                    issues.push(ValidationIssue::OneWayRelationship {
                        source_id: control.to_string(),
                        risk_id: risk.clone(),
                    });
                }
            }
            Edge::UseCaseRisk { use_case, risk } => {
                if !register.use_cases.contains(use_case) {
                    issues.push(ValidationIssue::MissingUseCase {
                        risk_id: risk.clone(),
                        use_case_id: *use_case,
                    });
                }
                let forward = adj.use_cases_for(risk).contains(use_case);
                let backward = adj.risks_for_use_case(use_case).contains(risk);
                if forward != backward {
                    issues.push(ValidationIssue::OneWayRelationship {
                        source_id: use_case.to_string(),
                        risk_id: risk.clone(),
                    });
                }
            }
        }
    }

    ValidationReport::from_issues(issues)
}

/// Difference between the current and the wanted neighbour set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkDiff<T> {
    pub add: Vec<T>,
    pub remove: Vec<T>,
}

/// Compute which links to add and which to drop, keeping input order
pub fn diff_links<T: Clone + Eq + Hash>(current: &[T], wanted: &[T]) -> LinkDiff<T> {
    let current_set: HashSet<&T> = current.iter().collect();
    let wanted_set: HashSet<&T> = wanted.iter().collect();
    let mut seen = HashSet::new();

    LinkDiff {
        add: wanted
            .iter()
            .filter(|id| !current_set.contains(id) && seen.insert(*id))
            .cloned()
            .collect(),
        remove: current
            .iter()
            .filter(|id| !wanted_set.contains(id))
            .cloned()
            .collect(),
    }
}

/// Parse a JSON array of ids, as accepted by the `set` operations
pub fn parse_id_payload(payload: &str) -> Result<Vec<String>, String> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| format!("invalid JSON payload: {}", e))?;
    let items = value
        .as_array()
        .ok_or_else(|| "payload must be a JSON array of ids".to_string())?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| format!("expected an id string, got {}", item))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::risk::RiskCategory;

    fn rid(s: &str) -> RiskId {
        s.parse().unwrap()
    }

    fn cid(s: &str) -> ControlId {
        s.parse().unwrap()
    }

    fn register() -> Register {
        let mut reg = Register::default();
        reg.risks.insert(Risk::new("Foo", RiskCategory::Other).unwrap()).unwrap();
        reg.risks.insert(Risk::new("Bar", RiskCategory::Other).unwrap()).unwrap();
        reg.controls
            .insert(Control::new(cid("ACC-01"), "Review", "Accuracy & Judgment"))
            .unwrap();
        reg.use_cases.insert(UseCase::new(UseCaseId::new(1), "Chat")).unwrap();
        for edge in [
            Edge::control(cid("ACC-01"), rid("RISK-FOO")),
            Edge::control(cid("ACC-01"), rid("RISK-BAR")),
            Edge::use_case(UseCaseId::new(1), rid("RISK-FOO")),
        ] {
            reg.relationships.insert(Relationship::new(edge)).unwrap();
        }
        reg
    }

    #[test]
    fn test_projection_is_symmetric() {
        let reg = register();
        let adj = Adjacency::from_register(&reg);

        for risk in reg.risks.iter() {
            for control in adj.controls_for(&risk.id) {
                assert!(adj.risks_for_control(control).contains(&risk.id));
            }
        }
        assert_eq!(adj.risks_for_control(&cid("ACC-01")), &[rid("RISK-FOO"), rid("RISK-BAR")]);
        assert_eq!(adj.use_cases_for(&rid("RISK-FOO")), &[UseCaseId::new(1)]);
        assert!(adj.controls_for(&rid("RISK-NONE")).is_empty());

        let foo = adj.project_risk(reg.risks.get(&rid("RISK-FOO")).unwrap());
        assert_eq!(foo.related_control_ids, vec![cid("ACC-01")]);
        assert_eq!(foo.related_use_case_ids, vec![UseCaseId::new(1)]);
    }

    #[test]
    fn test_validate_reports_dangling_endpoints() {
        let mut reg = register();
        assert!(validate(&reg).valid);

        reg.controls.remove(&cid("ACC-01"));
        reg.relationships
            .insert(Relationship::new(Edge::use_case(UseCaseId::new(7), rid("RISK-GONE"))))
            .unwrap();

        let report = validate(&reg);
        assert!(!report.valid);
        assert!(report.issues.contains(&ValidationIssue::MissingControl {
            risk_id: rid("RISK-FOO"),
            control_id: cid("ACC-01"),
        }));
        assert!(report.issues.contains(&ValidationIssue::MissingUseCase {
            risk_id: rid("RISK-GONE"),
            use_case_id: UseCaseId::new(7),
        }));
        assert!(report.issues.iter().any(|i| matches!(i, ValidationIssue::MissingRisk { .. })));
        assert_eq!(report.issue_count, report.issues.len());
    }

    #[test]
    fn test_diff_links() {
        let diff = diff_links(&[1, 2, 3], &[3, 4, 4, 5]);
        assert_eq!(diff.add, vec![4, 5]);
        assert_eq!(diff.remove, vec![1, 2]);
    }

    #[test]
    fn test_parse_id_payload() {
        assert_eq!(
            parse_id_payload(r#"["ACC-01", " SEC-02 "]"#).unwrap(),
            vec!["ACC-01", "SEC-02"]
        );
        assert!(parse_id_payload(r#"{"ids": []}"#).unwrap_err().contains("array"));
        assert!(parse_id_payload("[1]").is_err());
        assert!(parse_id_payload("not json").is_err());
    }
}
