//! Register service - id generation, defaults, views and reports on top of
//! the persistence provider

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::cache::TtlCache;
use crate::core::entity::EntityKind;
use crate::core::error::{RegisterError, Result};
use crate::core::identity::{
    generate_control_id, generate_risk_id, generate_use_case_id, ControlId, ControlPrefix, RiskId,
    UseCaseId,
};
use crate::core::links::{LinkDiff, ValidationReport};
use crate::core::provider::{PersistenceProvider, RegisterSummary};
use crate::entities::control::ControlPatch;
use crate::entities::relationship::timestamp_now;
use crate::entities::usecase::{UseCasePatch, DEFAULT_USE_CASE_STATUS};
use crate::entities::{Control, Edge, Risk, RiskCategory, RiskPatch, UseCase};

/// How a new control gets its id
#[derive(Debug, Clone, Copy)]
pub enum NewControlId {
    /// Use this id as given
    Exact(ControlId),
    /// Next free number in this category
    Next(ControlPrefix),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub id: RiskId,
    pub name: String,
    pub category: RiskCategory,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSummary {
    pub id: ControlId,
    pub description: String,
    pub category: String,
}

/// Risks nothing mitigates and controls that mitigate nothing
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanReport {
    pub risks_without_controls: Vec<RiskSummary>,
    pub controls_without_risks: Vec<ControlSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRisk {
    pub id: RiskId,
    pub name: String,
    pub category: RiskCategory,
    pub control_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixControl {
    pub id: ControlId,
    pub description: String,
    pub category: String,
    pub risk_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixLink {
    pub risk_id: RiskId,
    pub control_id: ControlId,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RelationshipMatrix {
    pub risks: Vec<MatrixRisk>,
    pub controls: Vec<MatrixControl>,
    pub relationships: Vec<MatrixLink>,
}

/// Residual level counts in five-point bands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelBands {
    pub very_low: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub very_high: usize,
}

impl LevelBands {
    fn count(&mut self, level: u16) {
        match level {
            0..=5 => self.very_low += 1,
            6..=10 => self.low += 1,
            11..=15 => self.medium += 1,
            16..=20 => self.high += 1,
            _ => self.very_high += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskStatistics {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_risk_level: LevelBands,
    pub with_controls: usize,
    pub without_controls: usize,
    pub average_initial_risk: f64,
    pub average_residual_risk: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCaseStatistics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_business_area: BTreeMap<String, usize>,
    pub by_ai_category: BTreeMap<String, usize>,
    pub total_cost_saving: f64,
    pub average_effort_months: f64,
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub struct RegisterService {
    provider: Arc<PersistenceProvider>,
    risks_view: TtlCache<Vec<Risk>>,
    controls_view: TtlCache<Vec<Control>>,
    use_cases_view: TtlCache<Vec<UseCase>>,
}

impl RegisterService {
    pub fn new(provider: Arc<PersistenceProvider>, view_ttl: Duration) -> Self {
        Self {
            provider,
            risks_view: TtlCache::new(view_ttl),
            controls_view: TtlCache::new(view_ttl),
            use_cases_view: TtlCache::new(view_ttl),
        }
    }

    pub fn provider(&self) -> &PersistenceProvider {
        &self.provider
    }

    async fn invalidate_views(&self) {
        self.risks_view.clear().await;
        self.controls_view.clear().await;
        self.use_cases_view.clear().await;
    }

    /// Drop every cached view and the document snapshot
    pub async fn invalidate(&self) {
        self.invalidate_views().await;
        self.provider.invalidate().await;
    }

    pub async fn summary(&self) -> Result<RegisterSummary> {
        self.provider.summary().await
    }

    // ---- transactions ----

    pub async fn begin_transaction(&self) -> Result<()> {
        self.provider.begin_transaction().await
    }

    /// Commit buffered writes; views are refreshed whether or not it succeeds
    pub async fn commit_transaction(&self) -> Result<()> {
        let result = self.provider.commit_transaction().await;
        self.invalidate_views().await;
        result
    }

    pub async fn rollback_transaction(&self) -> Result<()> {
        let result = self.provider.rollback_transaction().await;
        self.invalidate_views().await;
        result
    }

    pub async fn in_transaction(&self) -> bool {
        self.provider.in_transaction().await
    }

    // ---- risks ----

    pub async fn list_risks(&self) -> Result<Arc<Vec<Risk>>> {
        let lookup = self
            .risks_view
            .get_or_refresh(|| self.provider.list_risks())
            .await?;
        Ok(lookup.value)
    }

    pub async fn get_risk(&self, id: &RiskId) -> Result<Risk> {
        self.provider.get_risk_by_id(id).await
    }

    /// Create a risk with its id derived from `name`
    ///
    /// Scoring defaults to 3x3 and the residual scoring to the initial one.
    pub async fn create_risk(
        &self,
        name: &str,
        category: RiskCategory,
        details: RiskPatch,
    ) -> Result<Risk> {
        let residual_given = details.residual_scoring.is_some();
        let mut risk = Risk::new(name.trim(), category)?;
        risk.apply(details);
        if !residual_given {
            risk.residual_scoring = risk.initial_scoring.clone();
            risk.recompute_reduction();
        }

        let created = self.provider.create_risk(risk).await?;
        self.invalidate_views().await;
        Ok(created)
    }

    /// Update a risk; a rename must keep the derived id
    pub async fn update_risk(&self, id: &RiskId, patch: RiskPatch) -> Result<Risk> {
        if let Some(name) = &patch.risk {
            let renamed = generate_risk_id(name)?;
            if renamed != *id {
                return Err(RegisterError::Validation(format!(
                    "renaming '{}' would change its id to {}",
                    id, renamed
                )));
            }
        }
        let updated = self.provider.update_risk(id, patch).await?;
        self.invalidate_views().await;
        Ok(updated)
    }

    pub async fn delete_risk(&self, id: &RiskId) -> Result<()> {
        self.provider.delete_risk(id).await?;
        self.invalidate_views().await;
        Ok(())
    }

    /// Risks whose residual level is at least `threshold`
    pub async fn high_risks(&self, threshold: u16) -> Result<Vec<Risk>> {
        let risks = self.list_risks().await?;
        Ok(risks
            .iter()
            .filter(|r| r.residual_scoring.risk_level >= threshold)
            .cloned()
            .collect())
    }

    // ---- controls ----

    pub async fn list_controls(&self) -> Result<Arc<Vec<Control>>> {
        let lookup = self
            .controls_view
            .get_or_refresh(|| self.provider.list_controls())
            .await?;
        Ok(lookup.value)
    }

    pub async fn get_control(&self, id: &ControlId) -> Result<Control> {
        self.provider.get_control_by_id(id).await
    }

    /// Next free control id in a category
    pub async fn next_control_id(&self, prefix: ControlPrefix) -> Result<ControlId> {
        let controls = self.provider.list_controls().await?;
        Ok(generate_control_id(
            prefix,
            controls.iter().map(|c| &c.mitigation_id),
        )?)
    }

    pub async fn create_control(
        &self,
        id: NewControlId,
        description: &str,
        category: &str,
        details: ControlPatch,
    ) -> Result<Control> {
        let id = match id {
            NewControlId::Exact(id) => id,
            NewControlId::Next(prefix) => self.next_control_id(prefix).await?,
        };
        let mut control = Control::new(id, description.trim(), category.trim());
        control.apply(details);

        let created = self.provider.create_control(control).await?;
        self.invalidate_views().await;
        Ok(created)
    }

    pub async fn update_control(&self, id: &ControlId, patch: ControlPatch) -> Result<Control> {
        let updated = self.provider.update_control(id, patch).await?;
        self.invalidate_views().await;
        Ok(updated)
    }

    pub async fn delete_control(&self, id: &ControlId) -> Result<()> {
        self.provider.delete_control(id).await?;
        self.invalidate_views().await;
        Ok(())
    }

    // ---- use cases ----

    pub async fn list_use_cases(&self) -> Result<Arc<Vec<UseCase>>> {
        let lookup = self
            .use_cases_view
            .get_or_refresh(|| self.provider.list_use_cases())
            .await?;
        Ok(lookup.value)
    }

    pub async fn get_use_case(&self, id: &UseCaseId) -> Result<UseCase> {
        self.provider.get_use_case_by_id(id).await
    }

    /// Create a use case with the next free `UC-###` id, stamped now
    pub async fn create_use_case(&self, title: &str, details: UseCasePatch) -> Result<UseCase> {
        let existing = self.provider.list_use_cases().await?;
        let id = generate_use_case_id(existing.iter().map(|u| &u.id))?;

        let mut use_case = UseCase::new(id, title.trim());
        use_case.apply(details);
        if use_case.status.trim().is_empty() {
            use_case.status = DEFAULT_USE_CASE_STATUS.to_string();
        }
        let now = timestamp_now();
        use_case.created_date = now.clone();
        use_case.last_updated = now;

        let created = self.provider.create_use_case(use_case).await?;
        self.invalidate_views().await;
        Ok(created)
    }

    pub async fn update_use_case(&self, id: &UseCaseId, patch: UseCasePatch) -> Result<UseCase> {
        let updated = self.provider.update_use_case(id, patch).await?;
        self.invalidate_views().await;
        Ok(updated)
    }

    pub async fn delete_use_case(&self, id: &UseCaseId) -> Result<()> {
        self.provider.delete_use_case(id).await?;
        self.invalidate_views().await;
        Ok(())
    }

    // ---- relationships ----

    /// Link a control to a risk; an existing link is a conflict
    pub async fn link_control(&self, risk_id: &RiskId, control_id: &ControlId) -> Result<()> {
        let added = self
            .provider
            .add_risk_control_relationship(risk_id, control_id)
            .await?;
        if !added {
            return Err(RegisterError::conflict(
                EntityKind::Relationship,
                Edge::control(*control_id, risk_id.clone()),
            ));
        }
        self.invalidate_views().await;
        Ok(())
    }

    pub async fn unlink_control(&self, risk_id: &RiskId, control_id: &ControlId) -> Result<()> {
        let removed = self
            .provider
            .remove_risk_control_relationship(risk_id, control_id)
            .await?;
        if !removed {
            return Err(RegisterError::not_found(
                EntityKind::Relationship,
                Edge::control(*control_id, risk_id.clone()),
            ));
        }
        self.invalidate_views().await;
        Ok(())
    }

    /// Link a use case to a risk; an existing link is a conflict
    pub async fn link_use_case(&self, use_case_id: &UseCaseId, risk_id: &RiskId) -> Result<()> {
        let added = self
            .provider
            .add_use_case_risk_relationship(use_case_id, risk_id)
            .await?;
        if !added {
            return Err(RegisterError::conflict(
                EntityKind::Relationship,
                Edge::use_case(*use_case_id, risk_id.clone()),
            ));
        }
        self.invalidate_views().await;
        Ok(())
    }

    pub async fn unlink_use_case(&self, use_case_id: &UseCaseId, risk_id: &RiskId) -> Result<()> {
        let removed = self
            .provider
            .remove_use_case_risk_relationship(use_case_id, risk_id)
            .await?;
        if !removed {
            return Err(RegisterError::not_found(
                EntityKind::Relationship,
                Edge::use_case(*use_case_id, risk_id.clone()),
            ));
        }
        self.invalidate_views().await;
        Ok(())
    }

    pub async fn set_controls_for_risk(
        &self,
        risk_id: &RiskId,
        control_ids: &[ControlId],
    ) -> Result<LinkDiff<ControlId>> {
        let diff = self.provider.set_controls_for_risk(risk_id, control_ids).await?;
        self.invalidate_views().await;
        Ok(diff)
    }

    pub async fn set_risks_for_control(
        &self,
        control_id: &ControlId,
        risk_ids: &[RiskId],
    ) -> Result<LinkDiff<RiskId>> {
        let diff = self.provider.set_risks_for_control(control_id, risk_ids).await?;
        self.invalidate_views().await;
        Ok(diff)
    }

    pub async fn set_risks_for_use_case(
        &self,
        use_case_id: &UseCaseId,
        risk_ids: &[RiskId],
    ) -> Result<LinkDiff<RiskId>> {
        let diff = self.provider.set_risks_for_use_case(use_case_id, risk_ids).await?;
        self.invalidate_views().await;
        Ok(diff)
    }

    pub async fn validate(&self) -> Result<ValidationReport> {
        self.provider.validate_relationships().await
    }

    // ---- reports ----

    pub async fn orphans(&self) -> Result<OrphanReport> {
        let risks = self.list_risks().await?;
        let controls = self.list_controls().await?;
        Ok(OrphanReport {
            risks_without_controls: risks
                .iter()
                .filter(|r| r.related_control_ids.is_empty())
                .map(|r| RiskSummary {
                    id: r.id.clone(),
                    name: r.risk.clone(),
                    category: r.risk_category,
                })
                .collect(),
            controls_without_risks: controls
                .iter()
                .filter(|c| c.related_risk_ids.is_empty())
                .map(|c| ControlSummary {
                    id: c.mitigation_id,
                    description: c.mitigation_description.clone(),
                    category: c.category.clone(),
                })
                .collect(),
        })
    }

    pub async fn relationship_matrix(&self) -> Result<RelationshipMatrix> {
        let risks = self.list_risks().await?;
        let controls = self.list_controls().await?;
        Ok(RelationshipMatrix {
            risks: risks
                .iter()
                .map(|r| MatrixRisk {
                    id: r.id.clone(),
                    name: r.risk.clone(),
                    category: r.risk_category,
                    control_count: r.related_control_ids.len(),
                })
                .collect(),
            controls: controls
                .iter()
                .map(|c| MatrixControl {
                    id: c.mitigation_id,
                    description: c.mitigation_description.clone(),
                    category: c.category.clone(),
                    risk_count: c.related_risk_ids.len(),
                })
                .collect(),
            relationships: risks
                .iter()
                .flat_map(|r| {
                    r.related_control_ids.iter().map(|c| MatrixLink {
                        risk_id: r.id.clone(),
                        control_id: *c,
                    })
                })
                .collect(),
        })
    }

    pub async fn risk_statistics(&self) -> Result<RiskStatistics> {
        let risks = self.list_risks().await?;
        let mut stats = RiskStatistics {
            total: risks.len(),
            ..Default::default()
        };
        let mut total_initial = 0u64;
        let mut total_residual = 0u64;

        for risk in risks.iter() {
            *stats
                .by_category
                .entry(risk.risk_category.as_str().to_string())
                .or_default() += 1;
            stats.by_risk_level.count(risk.residual_scoring.risk_level);
            if risk.related_control_ids.is_empty() {
                stats.without_controls += 1;
            } else {
                stats.with_controls += 1;
            }
            total_initial += u64::from(risk.initial_scoring.risk_level);
            total_residual += u64::from(risk.residual_scoring.risk_level);
        }

        if !risks.is_empty() {
            let n = risks.len() as f64;
            stats.average_initial_risk = round_tenth(total_initial as f64 / n);
            stats.average_residual_risk = round_tenth(total_residual as f64 / n);
        }
        Ok(stats)
    }

    pub async fn use_case_statistics(&self) -> Result<UseCaseStatistics> {
        let use_cases = self.list_use_cases().await?;
        let mut stats = UseCaseStatistics {
            total: use_cases.len(),
            ..Default::default()
        };
        let mut efforts = Vec::new();

        for uc in use_cases.iter() {
            *stats.by_status.entry(uc.status.clone()).or_default() += 1;
            if !uc.business_area.is_empty() {
                *stats
                    .by_business_area
                    .entry(uc.business_area.clone())
                    .or_default() += 1;
            }
            for category in &uc.ai_categories {
                *stats.by_ai_category.entry(category.clone()).or_default() += 1;
            }
            stats.total_cost_saving += uc.impact.cost_saving.unwrap_or(0.0);
            if let Some(effort) = uc.impact.effort_months.filter(|e| *e > 0.0) {
                efforts.push(effort);
            }
        }

        if !efforts.is_empty() {
            stats.average_effort_months = efforts.iter().sum::<f64>() / efforts.len() as f64;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bands() {
        let mut bands = LevelBands::default();
        for level in [1, 5, 6, 10, 11, 15, 16, 20, 21, 25] {
            bands.count(level);
        }
        assert_eq!(
            bands,
            LevelBands {
                very_low: 2,
                low: 2,
                medium: 2,
                high: 2,
                very_high: 2,
            }
        );
    }

    #[test]
    fn test_round_tenth() {
        assert_eq!(round_tenth(9.25), 9.3);
        assert_eq!(round_tenth(12.0), 12.0);
        assert_eq!(round_tenth(20.0 / 3.0), 6.7);
    }
}
