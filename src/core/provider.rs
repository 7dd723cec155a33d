//! Persistence provider - typed CRUD over the register document
//!
//! Reads come from a cached snapshot of the last committed document. Writes
//! copy the snapshot's register, apply the change, encode it over the
//! snapshot's blob and upload it with the snapshot's revision as
//! precondition. While a transaction is active, writes go to its working copy
//! instead and nothing is uploaded until commit.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::codec;
use crate::core::cache::{TtlCache, DEFAULT_SNAPSHOT_TTL};
use crate::core::entity::{Entity, EntityKind};
use crate::core::error::{RegisterError, Result};
use crate::core::identity::{ControlId, RiskId, UseCaseId};
use crate::core::links::{self, diff_links, Adjacency, LinkDiff, ValidationReport};
use crate::core::register::{Register, RiskLayout, Table};
use crate::entities::control::ControlPatch;
use crate::entities::relationship::timestamp_now;
use crate::entities::usecase::UseCasePatch;
use crate::entities::{Control, Edge, Relationship, Risk, RiskPatch, UseCase};
use crate::store::DocumentClient;

/// Provider tuning
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// How long a fetched document is served without refetching
    pub snapshot_ttl: Duration,

    /// Upload with the read revision as precondition
    pub optimistic: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            optimistic: true,
        }
    }
}

/// One decoded revision of the document
struct Snapshot {
    register: Register,
    adjacency: Adjacency,
    blob: Vec<u8>,
    revision: String,
}

impl Snapshot {
    fn new(register: Register, blob: Vec<u8>, revision: String) -> Self {
        let adjacency = Adjacency::from_register(&register);
        Self {
            register,
            adjacency,
            blob,
            revision,
        }
    }
}

struct Transaction {
    working: Register,
    base: Arc<Snapshot>,
}

/// Counts describing the committed document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSummary {
    pub file_id: String,
    pub revision: String,
    pub legacy_layout: bool,
    pub risks: usize,
    pub controls: usize,
    pub use_cases: usize,
    pub relationships: usize,
    /// Rows kept verbatim because they could not be parsed
    pub unparsed_rows: usize,
}

pub struct PersistenceProvider {
    client: DocumentClient,
    cache: TtlCache<Snapshot>,
    transaction: Mutex<Option<Transaction>>,
    optimistic: bool,
}

impl PersistenceProvider {
    pub fn new(client: DocumentClient, settings: ProviderSettings) -> Self {
        Self {
            client,
            cache: TtlCache::new(settings.snapshot_ttl),
            transaction: Mutex::new(None),
            optimistic: settings.optimistic,
        }
    }

    async fn load(client: &DocumentClient) -> Result<Snapshot> {
        let doc = client.fetch().await?;
        let register = codec::decode(&doc.bytes)?;
        tracing::debug!(
            revision = %doc.revision,
            risks = register.risks.len(),
            controls = register.controls.len(),
            use_cases = register.use_cases.len(),
            relationships = register.relationships.len(),
            "decoded register"
        );
        Ok(Snapshot::new(register, doc.bytes, doc.revision))
    }

    /// Committed snapshot for reads; falls back to the last good one
    async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        let lookup = self.cache.get_or_refresh(|| Self::load(&self.client)).await?;
        Ok(lookup.value)
    }

    /// Snapshot a write can be based on; a stale one is refused
    async fn base_snapshot(&self) -> Result<Arc<Snapshot>> {
        let lookup = self.cache.get_or_refresh(|| Self::load(&self.client)).await?;
        if lookup.stale {
            return Err(RegisterError::StoreUnavailable {
                message: "could not refresh the document before writing".to_string(),
            });
        }
        Ok(lookup.value)
    }

    /// Encode `register` over `base`, upload it, and make it the cached snapshot
    async fn persist(&self, base: &Snapshot, mut register: Register) -> Result<()> {
        let blob = codec::encode(&base.blob, &register)?;
        let expected = self.optimistic.then_some(base.revision.as_str());

        match self.client.store(blob.clone(), expected).await {
            Ok(revision) => {
                register.mark_clean();
                self.cache.replace(Snapshot::new(register, blob, revision)).await;
                Ok(())
            }
            Err(e) => {
                let err = RegisterError::from(e);
                if let RegisterError::RevisionConflict { expected, actual } = &err {
                    tracing::warn!(%expected, %actual, "document changed underneath, dropping cache");
                    self.cache.invalidate().await;
                }
                Err(err)
            }
        }
    }

    /// Apply `change` to the working copy, or persist it directly
    ///
    /// The change runs on a copy, so an error leaves the register untouched.
    async fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Register) -> Result<T>,
    {
        let mut transaction = self.transaction.lock().await;
        if let Some(active) = transaction.as_mut() {
            let mut working = active.working.clone();
            let out = change(&mut working)?;
            active.working = working;
            return Ok(out);
        }

        let base = self.base_snapshot().await?;
        let mut register = base.register.clone();
        let out = change(&mut register)?;
        if register.is_dirty() {
            self.persist(&base, register).await?;
        }
        Ok(out)
    }

    /// Drop the cached snapshot so the next read refetches
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    pub async fn summary(&self) -> Result<RegisterSummary> {
        let snap = self.snapshot().await?;
        let reg = &snap.register;
        Ok(RegisterSummary {
            file_id: self.client.file_id().to_string(),
            revision: snap.revision.clone(),
            legacy_layout: reg.risk_layout == RiskLayout::Legacy,
            risks: reg.risks.len(),
            controls: reg.controls.len(),
            use_cases: reg.use_cases.len(),
            relationships: reg.relationships.len(),
            unparsed_rows: reg.risks.opaque_rows()
                + reg.controls.opaque_rows()
                + reg.use_cases.opaque_rows()
                + reg.relationships.opaque_rows(),
        })
    }

    // ---- risks ----

    pub async fn list_risks(&self) -> Result<Vec<Risk>> {
        let snap = self.snapshot().await?;
        Ok(snap
            .register
            .risks
            .iter()
            .map(|r| snap.adjacency.project_risk(r))
            .collect())
    }

    pub async fn get_risk_by_id(&self, id: &RiskId) -> Result<Risk> {
        let snap = self.snapshot().await?;
        snap.register
            .risks
            .get(id)
            .map(|r| snap.adjacency.project_risk(r))
            .ok_or_else(|| RegisterError::not_found(EntityKind::Risk, id))
    }

    pub async fn create_risk(&self, risk: Risk) -> Result<Risk> {
        let mut record = risk.stripped();
        record.normalize();
        record.validate().map_err(RegisterError::Validation)?;
        self.mutate(|reg| insert(&mut reg.risks, record.clone()))
            .await?;
        tracing::debug!(id = %record.id, "created risk");
        Ok(record)
    }

    pub async fn update_risk(&self, id: &RiskId, patch: RiskPatch) -> Result<Risk> {
        self.mutate(|reg| {
            let mut updated = existing(&reg.risks, id)?.clone();
            updated.apply(patch);
            updated.normalize();
            updated.validate().map_err(RegisterError::Validation)?;
            reg.risks.update(id, |r| *r = updated.clone());
            Ok(Adjacency::from_register(reg).project_risk(&updated))
        })
        .await
    }

    /// Delete a risk and every edge that ends at it
    pub async fn delete_risk(&self, id: &RiskId) -> Result<()> {
        self.mutate(|reg| {
            existing(&reg.risks, id)?;
            let edges = reg.remove_edges_touching(id.as_str());
            reg.risks.remove(id);
            tracing::debug!(%id, edges, "deleted risk");
            Ok(())
        })
        .await
    }

    // ---- controls ----

    pub async fn list_controls(&self) -> Result<Vec<Control>> {
        let snap = self.snapshot().await?;
        Ok(snap
            .register
            .controls
            .iter()
            .map(|c| snap.adjacency.project_control(c))
            .collect())
    }

    pub async fn get_control_by_id(&self, id: &ControlId) -> Result<Control> {
        let snap = self.snapshot().await?;
        snap.register
            .controls
            .get(id)
            .map(|c| snap.adjacency.project_control(c))
            .ok_or_else(|| RegisterError::not_found(EntityKind::Control, id))
    }

    pub async fn create_control(&self, control: Control) -> Result<Control> {
        control.validate().map_err(RegisterError::Validation)?;
        let record = control.stripped();
        self.mutate(|reg| insert(&mut reg.controls, record.clone()))
            .await?;
        tracing::debug!(id = %record.mitigation_id, "created control");
        Ok(record)
    }

    pub async fn update_control(&self, id: &ControlId, patch: ControlPatch) -> Result<Control> {
        self.mutate(|reg| {
            let mut updated = existing(&reg.controls, id)?.clone();
            updated.apply(patch);
            updated.validate().map_err(RegisterError::Validation)?;
            reg.controls.update(id, |c| *c = updated.clone());
            Ok(Adjacency::from_register(reg).project_control(&updated))
        })
        .await
    }

    /// Delete a control and every edge that starts at it
    pub async fn delete_control(&self, id: &ControlId) -> Result<()> {
        self.mutate(|reg| {
            existing(&reg.controls, id)?;
            let edges = reg.remove_edges_touching(&id.to_string());
            reg.controls.remove(id);
            tracing::debug!(%id, edges, "deleted control");
            Ok(())
        })
        .await
    }

    // ---- use cases ----

    pub async fn list_use_cases(&self) -> Result<Vec<UseCase>> {
        let snap = self.snapshot().await?;
        Ok(snap
            .register
            .use_cases
            .iter()
            .map(|u| snap.adjacency.project_use_case(u))
            .collect())
    }

    pub async fn get_use_case_by_id(&self, id: &UseCaseId) -> Result<UseCase> {
        let snap = self.snapshot().await?;
        snap.register
            .use_cases
            .get(id)
            .map(|u| snap.adjacency.project_use_case(u))
            .ok_or_else(|| RegisterError::not_found(EntityKind::UseCase, id))
    }

    pub async fn create_use_case(&self, use_case: UseCase) -> Result<UseCase> {
        use_case.validate().map_err(RegisterError::Validation)?;
        let record = use_case.stripped();
        self.mutate(|reg| insert(&mut reg.use_cases, record.clone()))
            .await?;
        tracing::debug!(id = %record.id, "created use case");
        Ok(record)
    }

    pub async fn update_use_case(&self, id: &UseCaseId, patch: UseCasePatch) -> Result<UseCase> {
        self.mutate(|reg| {
            let mut updated = existing(&reg.use_cases, id)?.clone();
            updated.apply(patch);
            updated.last_updated = timestamp_now();
            updated.validate().map_err(RegisterError::Validation)?;
            reg.use_cases.update(id, |u| *u = updated.clone());
            Ok(Adjacency::from_register(reg).project_use_case(&updated))
        })
        .await
    }

    /// Delete a use case and every edge that starts at it
    pub async fn delete_use_case(&self, id: &UseCaseId) -> Result<()> {
        self.mutate(|reg| {
            existing(&reg.use_cases, id)?;
            let edges = reg.remove_edges_touching(&id.to_string());
            reg.use_cases.remove(id);
            tracing::debug!(%id, edges, "deleted use case");
            Ok(())
        })
        .await
    }

    // ---- relationships ----

    pub async fn list_relationships(&self) -> Result<Vec<Relationship>> {
        let snap = self.snapshot().await?;
        Ok(snap.register.relationships.iter().cloned().collect())
    }

    /// Link a control to a risk; returns false when they were already linked
    pub async fn add_risk_control_relationship(
        &self,
        risk_id: &RiskId,
        control_id: &ControlId,
    ) -> Result<bool> {
        self.mutate(|reg| {
            existing(&reg.risks, risk_id)?;
            existing(&reg.controls, control_id)?;
            Ok(link(reg, Edge::control(*control_id, risk_id.clone())))
        })
        .await
    }

    /// Unlink a control from a risk; returns false when there was no link
    pub async fn remove_risk_control_relationship(
        &self,
        risk_id: &RiskId,
        control_id: &ControlId,
    ) -> Result<bool> {
        let edge = Edge::control(*control_id, risk_id.clone());
        self.mutate(|reg| Ok(reg.remove_edge(&edge)))
            .await
    }

    pub async fn get_controls_for_risk(&self, risk_id: &RiskId) -> Result<Vec<Control>> {
        let snap = self.snapshot().await?;
        existing(&snap.register.risks, risk_id)?;
        Ok(snap
            .adjacency
            .controls_for(risk_id)
            .iter()
            .filter_map(|id| snap.register.controls.get(id))
            .map(|c| snap.adjacency.project_control(c))
            .collect())
    }

    pub async fn get_risks_for_control(&self, control_id: &ControlId) -> Result<Vec<Risk>> {
        let snap = self.snapshot().await?;
        existing(&snap.register.controls, control_id)?;
        Ok(snap
            .adjacency
            .risks_for_control(control_id)
            .iter()
            .filter_map(|id| snap.register.risks.get(id))
            .map(|r| snap.adjacency.project_risk(r))
            .collect())
    }

    /// Link a use case to a risk; returns false when they were already linked
    pub async fn add_use_case_risk_relationship(
        &self,
        use_case_id: &UseCaseId,
        risk_id: &RiskId,
    ) -> Result<bool> {
        self.mutate(|reg| {
            existing(&reg.use_cases, use_case_id)?;
            existing(&reg.risks, risk_id)?;
            Ok(link(reg, Edge::use_case(*use_case_id, risk_id.clone())))
        })
        .await
    }

    pub async fn remove_use_case_risk_relationship(
        &self,
        use_case_id: &UseCaseId,
        risk_id: &RiskId,
    ) -> Result<bool> {
        let edge = Edge::use_case(*use_case_id, risk_id.clone());
        self.mutate(|reg| Ok(reg.remove_edge(&edge)))
            .await
    }

    pub async fn get_risks_for_use_case(&self, use_case_id: &UseCaseId) -> Result<Vec<Risk>> {
        let snap = self.snapshot().await?;
        existing(&snap.register.use_cases, use_case_id)?;
        Ok(snap
            .adjacency
            .risks_for_use_case(use_case_id)
            .iter()
            .filter_map(|id| snap.register.risks.get(id))
            .map(|r| snap.adjacency.project_risk(r))
            .collect())
    }

    pub async fn get_use_cases_for_risk(&self, risk_id: &RiskId) -> Result<Vec<UseCase>> {
        let snap = self.snapshot().await?;
        existing(&snap.register.risks, risk_id)?;
        Ok(snap
            .adjacency
            .use_cases_for(risk_id)
            .iter()
            .filter_map(|id| snap.register.use_cases.get(id))
            .map(|u| snap.adjacency.project_use_case(u))
            .collect())
    }

    /// Make `control_ids` the exact set of controls linked to a risk
    ///
    /// Every id is checked before anything changes; the whole diff is
    /// written in one upload.
    pub async fn set_controls_for_risk(
        &self,
        risk_id: &RiskId,
        control_ids: &[ControlId],
    ) -> Result<LinkDiff<ControlId>> {
        self.mutate(|reg| {
            existing(&reg.risks, risk_id)?;
            for id in control_ids {
                existing(&reg.controls, id)?;
            }
            let current = Adjacency::from_register(reg).controls_for(risk_id).to_vec();
            let diff = diff_links(&current, control_ids);
            for control in &diff.remove {
                reg.remove_edge(&Edge::control(*control, risk_id.clone()));
            }
            for control in &diff.add {
                link(reg, Edge::control(*control, risk_id.clone()));
            }
            Ok(diff)
        })
        .await
    }

    /// Make `risk_ids` the exact set of risks a control mitigates
    pub async fn set_risks_for_control(
        &self,
        control_id: &ControlId,
        risk_ids: &[RiskId],
    ) -> Result<LinkDiff<RiskId>> {
        self.mutate(|reg| {
            existing(&reg.controls, control_id)?;
            for id in risk_ids {
                existing(&reg.risks, id)?;
            }
            let current = Adjacency::from_register(reg)
                .risks_for_control(control_id)
                .to_vec();
            let diff = diff_links(&current, risk_ids);
            for risk in &diff.remove {
                reg.remove_edge(&Edge::control(*control_id, risk.clone()));
            }
            for risk in &diff.add {
                link(reg, Edge::control(*control_id, risk.clone()));
            }
            Ok(diff)
        })
        .await
    }

    /// Make `risk_ids` the exact set of risks a use case introduces
    pub async fn set_risks_for_use_case(
        &self,
        use_case_id: &UseCaseId,
        risk_ids: &[RiskId],
    ) -> Result<LinkDiff<RiskId>> {
        self.mutate(|reg| {
            existing(&reg.use_cases, use_case_id)?;
            for id in risk_ids {
                existing(&reg.risks, id)?;
            }
            let current = Adjacency::from_register(reg)
                .risks_for_use_case(use_case_id)
                .to_vec();
            let diff = diff_links(&current, risk_ids);
            for risk in &diff.remove {
                reg.remove_edge(&Edge::use_case(*use_case_id, risk.clone()));
            }
            for risk in &diff.add {
                link(reg, Edge::use_case(*use_case_id, risk.clone()));
            }
            Ok(diff)
        })
        .await
    }

    pub async fn validate_relationships(&self) -> Result<ValidationReport> {
        let snap = self.snapshot().await?;
        Ok(links::validate(&snap.register))
    }

    // ---- transactions ----

    /// Start buffering writes in a working copy of the current register
    pub async fn begin_transaction(&self) -> Result<()> {
        let mut transaction = self.transaction.lock().await;
        if transaction.is_some() {
            return Err(RegisterError::Transaction(
                "a transaction is already in progress".to_string(),
            ));
        }
        let base = self.base_snapshot().await?;
        *transaction = Some(Transaction {
            working: base.register.clone(),
            base,
        });
        tracing::debug!("transaction started");
        Ok(())
    }

    /// Upload the working copy in one write
    ///
    /// On failure the transaction stays active so the commit can be retried
    /// or rolled back.
    pub async fn commit_transaction(&self) -> Result<()> {
        let mut transaction = self.transaction.lock().await;
        let active = transaction
            .as_ref()
            .ok_or_else(|| RegisterError::Transaction("no transaction in progress".to_string()))?;

        if active.working.is_dirty() {
            self.persist(&active.base, active.working.clone()).await?;
        }
        *transaction = None;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Discard the working copy and drop the cached snapshot
    pub async fn rollback_transaction(&self) -> Result<()> {
        let mut transaction = self.transaction.lock().await;
        if transaction.take().is_none() {
            return Err(RegisterError::Transaction(
                "no transaction in progress".to_string(),
            ));
        }
        self.cache.clear().await;
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    pub async fn in_transaction(&self) -> bool {
        self.transaction.lock().await.is_some()
    }
}

fn existing<'a, T: Entity>(table: &'a Table<T>, id: &T::Id) -> Result<&'a T> {
    table
        .get(id)
        .ok_or_else(|| RegisterError::not_found(T::KIND, id))
}

fn insert<T: Entity>(table: &mut Table<T>, record: T) -> Result<()> {
    table
        .insert(record)
        .map_err(|rejected| RegisterError::conflict(T::KIND, rejected.id()))
}

/// Add an edge unless it exists; true when added
fn link(reg: &mut Register, edge: Edge) -> bool {
    if reg.relationships.contains(&edge) {
        return false;
    }
    reg.relationships.insert(Relationship::new(edge)).is_ok()
}
