//! Persistence provider and service tests against an in-memory document store

use std::sync::Arc;
use std::time::Duration;

use riskreg::codec;
use riskreg::codec::sheet::{Cell, SheetKind, Workbook};
use riskreg::core::error::RegisterError;
use riskreg::core::identity::{ControlId, ControlPrefix, RiskId, UseCaseId};
use riskreg::core::service::NewControlId;
use riskreg::core::{PersistenceProvider, ProviderSettings, RegisterService, RiskLayout};
use riskreg::entities::{
    Control, ControlPatch, Risk, RiskCategory, RiskPatch, ScoringPatch, UseCase,
};
use riskreg::store::{DocumentClient, MemoryStore};

const FILE_ID: &str = "register";

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let bytes = codec::empty_document(RiskLayout::Keyed).unwrap();
    store.put(FILE_ID, bytes).await;
    store
}

fn provider_for(store: &Arc<MemoryStore>) -> PersistenceProvider {
    let client = DocumentClient::new(store.clone(), FILE_ID);
    PersistenceProvider::new(client, ProviderSettings::default())
}

fn service_for(store: &Arc<MemoryStore>) -> RegisterService {
    RegisterService::new(Arc::new(provider_for(store)), Duration::from_secs(60))
}

fn risk(name: &str) -> Risk {
    Risk::new(name, RiskCategory::Accuracy).unwrap()
}

fn control(id: &str) -> Control {
    Control::new(id.parse().unwrap(), "Human review of outputs", "Accuracy & Judgment")
}

fn rid(id: &str) -> RiskId {
    id.parse().unwrap()
}

fn cid(id: &str) -> ControlId {
    id.parse().unwrap()
}

fn ucid(id: &str) -> UseCaseId {
    id.parse().unwrap()
}

/// Data rows of one sheet of the stored document
async fn stored_rows(store: &Arc<MemoryStore>, kind: SheetKind) -> Vec<Vec<Cell>> {
    let bytes = store.get(FILE_ID).await.unwrap();
    let book = Workbook::from_bytes(&bytes).unwrap();
    let name = book.find_sheet(kind).unwrap();
    book.grid(&name).unwrap().data().to_vec()
}

/// Replace one sheet of the stored document with `rows`
async fn overwrite_sheet(
    store: &Arc<MemoryStore>,
    kind: SheetKind,
    header: &[&str],
    rows: &[Vec<Cell>],
) {
    let bytes = store.get(FILE_ID).await.unwrap();
    let mut book = Workbook::from_bytes(&bytes).unwrap();
    book.write_table(kind, header, rows).unwrap();
    store.put(FILE_ID, book.to_bytes().unwrap()).await;
}

// ============================================================================
// CRUD
// ============================================================================

#[tokio::test]
async fn test_create_then_get_round_trips_through_document() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    let mut created = risk("Model drift");
    created.risk_description = "Outputs degrade as data shifts".to_string();
    provider.create_risk(created).await.unwrap();

    // A fresh provider has to decode what was uploaded
    let fresh = provider_for(&store);
    let loaded = fresh.get_risk_by_id(&rid("RISK-MODEL-DRIFT")).await.unwrap();
    assert_eq!(loaded.risk, "Model drift");
    assert_eq!(loaded.risk_description, "Outputs degrade as data shifts");
    assert_eq!(loaded.risk_category, RiskCategory::Accuracy);
    assert_eq!(store.upload_count(), 1);
}

#[tokio::test]
async fn test_duplicate_create_is_a_conflict() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    provider.create_risk(risk("Bias")).await.unwrap();
    let err = provider.create_risk(risk("bias")).await.unwrap_err();
    assert!(matches!(err, RegisterError::Conflict { .. }));

    provider.create_control(control("ACC-01")).await.unwrap();
    let err = provider.create_control(control("ACC-01")).await.unwrap_err();
    assert!(matches!(err, RegisterError::Conflict { .. }));
    assert_eq!(store.upload_count(), 2);
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    let err = provider
        .update_risk(&rid("RISK-NOPE"), RiskPatch::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.upload_count(), 0);
}

#[tokio::test]
async fn test_out_of_range_score_is_rejected() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Hallucination")).await.unwrap();

    let patch = RiskPatch {
        initial_scoring: Some(ScoringPatch {
            likelihood: Some(9),
            ..Default::default()
        }),
        ..Default::default()
    };
    let err = provider
        .update_risk(&rid("RISK-HALLUCINATION"), patch)
        .await
        .unwrap_err();
    assert!(matches!(err, RegisterError::Validation(_)));

    let unchanged = provider.get_risk_by_id(&rid("RISK-HALLUCINATION")).await.unwrap();
    assert_eq!(unchanged.initial_scoring.likelihood, 3);
}

#[tokio::test]
async fn test_update_control_keeps_untouched_fields() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_control(control("SEC-01")).await.unwrap();

    let updated = provider
        .update_control(
            &cid("SEC-01"),
            ControlPatch {
                mitigation_description: Some("Encrypt prompts at rest".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.mitigation_description, "Encrypt prompts at rest");
    assert_eq!(updated.category, "Accuracy & Judgment");
}

// ============================================================================
// Relationships
// ============================================================================

#[tokio::test]
async fn test_link_is_visible_from_both_sides() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_control(control("ACC-01")).await.unwrap();

    assert!(provider
        .add_risk_control_relationship(&rid("RISK-FOO"), &cid("ACC-01"))
        .await
        .unwrap());

    let risk = provider.get_risk_by_id(&rid("RISK-FOO")).await.unwrap();
    assert_eq!(risk.related_control_ids, vec![cid("ACC-01")]);
    let control = provider.get_control_by_id(&cid("ACC-01")).await.unwrap();
    assert_eq!(control.related_risk_ids, vec![rid("RISK-FOO")]);

    let controls = provider.get_controls_for_risk(&rid("RISK-FOO")).await.unwrap();
    assert_eq!(controls.len(), 1);
    let risks = provider.get_risks_for_control(&cid("ACC-01")).await.unwrap();
    assert_eq!(risks.len(), 1);
}

#[tokio::test]
async fn test_adding_existing_link_changes_nothing() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_control(control("ACC-01")).await.unwrap();

    provider
        .add_risk_control_relationship(&rid("RISK-FOO"), &cid("ACC-01"))
        .await
        .unwrap();
    let uploads = store.upload_count();

    let added = provider
        .add_risk_control_relationship(&rid("RISK-FOO"), &cid("ACC-01"))
        .await
        .unwrap();
    assert!(!added);
    assert_eq!(store.upload_count(), uploads);
    assert_eq!(provider.list_relationships().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_link_to_missing_control_is_not_found() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();

    let err = provider
        .add_risk_control_relationship(&rid("RISK-FOO"), &cid("GOV-07"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(provider.list_relationships().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_control_cascades_its_links() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_risk(risk("Bar")).await.unwrap();
    provider.create_control(control("ACC-01")).await.unwrap();
    provider.create_control(control("SEC-01")).await.unwrap();
    for (r, c) in [("RISK-FOO", "ACC-01"), ("RISK-BAR", "ACC-01"), ("RISK-FOO", "SEC-01")] {
        provider
            .add_risk_control_relationship(&rid(r), &cid(c))
            .await
            .unwrap();
    }

    provider.delete_control(&cid("ACC-01")).await.unwrap();

    let edges = provider.list_relationships().await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].edge.source(), "SEC-01");

    let foo = provider.get_risk_by_id(&rid("RISK-FOO")).await.unwrap();
    assert_eq!(foo.related_control_ids, vec![cid("SEC-01")]);
    let bar = provider.get_risk_by_id(&rid("RISK-BAR")).await.unwrap();
    assert!(bar.related_control_ids.is_empty());
    assert!(provider.validate_relationships().await.unwrap().valid);
}

#[tokio::test]
async fn test_deleting_risk_keeps_other_records() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_risk(risk("Bar")).await.unwrap();
    provider.create_control(control("ACC-01")).await.unwrap();
    provider
        .add_risk_control_relationship(&rid("RISK-FOO"), &cid("ACC-01"))
        .await
        .unwrap();

    provider.delete_risk(&rid("RISK-FOO")).await.unwrap();

    let risks = provider.list_risks().await.unwrap();
    assert_eq!(risks.len(), 1);
    assert_eq!(risks[0].id, rid("RISK-BAR"));
    let control = provider.get_control_by_id(&cid("ACC-01")).await.unwrap();
    assert!(control.related_risk_ids.is_empty());

    let err = provider.delete_risk(&rid("RISK-FOO")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_set_controls_for_risk_applies_diff() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();
    for id in ["ACC-01", "ACC-02", "SEC-01"] {
        provider.create_control(control(id)).await.unwrap();
    }
    provider
        .set_controls_for_risk(&rid("RISK-FOO"), &[cid("ACC-01"), cid("ACC-02")])
        .await
        .unwrap();
    let uploads = store.upload_count();

    let diff = provider
        .set_controls_for_risk(&rid("RISK-FOO"), &[cid("ACC-02"), cid("SEC-01")])
        .await
        .unwrap();
    assert_eq!(diff.add, vec![cid("SEC-01")]);
    assert_eq!(diff.remove, vec![cid("ACC-01")]);
    assert_eq!(store.upload_count(), uploads + 1);

    let foo = provider.get_risk_by_id(&rid("RISK-FOO")).await.unwrap();
    let mut linked = foo.related_control_ids.clone();
    linked.sort();
    assert_eq!(linked, vec![cid("ACC-02"), cid("SEC-01")]);
}

#[tokio::test]
async fn test_set_with_unknown_id_changes_nothing() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_control(control("ACC-01")).await.unwrap();
    let uploads = store.upload_count();

    let err = provider
        .set_controls_for_risk(&rid("RISK-FOO"), &[cid("ACC-01"), cid("LOG-09")])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.upload_count(), uploads);
    assert!(provider.list_relationships().await.unwrap().is_empty());
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn test_rollback_discards_buffered_writes() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    provider.begin_transaction().await.unwrap();
    assert!(provider.in_transaction().await);
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_control(control("ACC-01")).await.unwrap();
    assert_eq!(store.upload_count(), 0);

    provider.rollback_transaction().await.unwrap();
    assert!(!provider.in_transaction().await);
    assert!(provider.list_risks().await.unwrap().is_empty());
    assert!(provider.list_controls().await.unwrap().is_empty());
    assert_eq!(store.upload_count(), 0);
}

#[tokio::test]
async fn test_commit_uploads_once() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    provider.begin_transaction().await.unwrap();
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_control(control("ACC-01")).await.unwrap();
    provider
        .add_risk_control_relationship(&rid("RISK-FOO"), &cid("ACC-01"))
        .await
        .unwrap();

    // Reads see committed state until commit
    assert!(provider.list_risks().await.unwrap().is_empty());

    provider.commit_transaction().await.unwrap();
    assert_eq!(store.upload_count(), 1);

    let foo = provider.get_risk_by_id(&rid("RISK-FOO")).await.unwrap();
    assert_eq!(foo.related_control_ids, vec![cid("ACC-01")]);
}

#[tokio::test]
async fn test_failed_write_inside_transaction_keeps_working_copy() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    provider.begin_transaction().await.unwrap();
    provider.create_risk(risk("Foo")).await.unwrap();
    let err = provider.create_risk(risk("Foo")).await.unwrap_err();
    assert!(matches!(err, RegisterError::Conflict { .. }));
    provider.create_control(control("ACC-01")).await.unwrap();
    provider.commit_transaction().await.unwrap();

    assert_eq!(provider.list_risks().await.unwrap().len(), 1);
    assert_eq!(provider.list_controls().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_transaction_misuse_is_an_error() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    assert!(matches!(
        provider.commit_transaction().await,
        Err(RegisterError::Transaction(_))
    ));
    assert!(matches!(
        provider.rollback_transaction().await,
        Err(RegisterError::Transaction(_))
    ));

    provider.begin_transaction().await.unwrap();
    assert!(matches!(
        provider.begin_transaction().await,
        Err(RegisterError::Transaction(_))
    ));
}

#[tokio::test]
async fn test_failed_commit_stays_open() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    provider.begin_transaction().await.unwrap();
    provider.create_risk(risk("Foo")).await.unwrap();

    store.set_fail_uploads(true);
    let err = provider.commit_transaction().await.unwrap_err();
    assert!(matches!(err, RegisterError::StoreUnavailable { .. }));
    assert!(provider.in_transaction().await);

    store.set_fail_uploads(false);
    provider.commit_transaction().await.unwrap();
    assert_eq!(provider.list_risks().await.unwrap().len(), 1);
}

// ============================================================================
// Store behaviour
// ============================================================================

#[tokio::test]
async fn test_concurrent_writer_causes_revision_conflict() {
    let store = seeded_store().await;
    let first = provider_for(&store);
    let second = provider_for(&store);

    // Both read the same revision
    first.list_risks().await.unwrap();
    second.list_risks().await.unwrap();

    second.create_risk(risk("Bar")).await.unwrap();
    let err = first.create_risk(risk("Foo")).await.unwrap_err();
    assert!(matches!(err, RegisterError::RevisionConflict { .. }));

    // The conflict dropped the cache, so a retry sees the other write
    first.create_risk(risk("Foo")).await.unwrap();
    let ids: Vec<String> = first
        .list_risks()
        .await
        .unwrap()
        .iter()
        .map(|r| r.id.to_string())
        .collect();
    assert!(ids.contains(&"RISK-BAR".to_string()));
    assert!(ids.contains(&"RISK-FOO".to_string()));
}

#[tokio::test]
async fn test_last_writer_wins_without_revision_checks() {
    let store = seeded_store().await;
    let settings = ProviderSettings {
        optimistic: false,
        ..Default::default()
    };
    let first = PersistenceProvider::new(DocumentClient::new(store.clone(), FILE_ID), settings.clone());
    let second = PersistenceProvider::new(DocumentClient::new(store.clone(), FILE_ID), settings);

    first.list_risks().await.unwrap();
    second.create_risk(risk("Bar")).await.unwrap();
    first.create_risk(risk("Foo")).await.unwrap();

    let fresh = provider_for(&store);
    let risks = fresh.list_risks().await.unwrap();
    assert_eq!(risks.len(), 1);
    assert_eq!(risks[0].id, rid("RISK-FOO"));
}

#[tokio::test]
async fn test_reads_reuse_cached_snapshot() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    provider.list_risks().await.unwrap();
    provider.list_controls().await.unwrap();
    provider.list_use_cases().await.unwrap();
    assert_eq!(store.fetch_count(), 1);

    provider.invalidate().await;
    provider.list_risks().await.unwrap();
    assert_eq!(store.fetch_count(), 2);
}

#[tokio::test]
async fn test_unreachable_store_serves_stale_reads_but_refuses_writes() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();

    provider.invalidate().await;
    store.remove(FILE_ID).await;

    let risks = provider.list_risks().await.unwrap();
    assert_eq!(risks.len(), 1);

    let err = provider.create_risk(risk("Bar")).await.unwrap_err();
    assert!(matches!(err, RegisterError::StoreUnavailable { .. }));
}

#[tokio::test]
async fn test_missing_document_without_cache_is_an_error() {
    let store = Arc::new(MemoryStore::new());
    let provider = provider_for(&store);

    let err = provider.list_risks().await.unwrap_err();
    assert!(matches!(err, RegisterError::StoreUnavailable { .. }));
}

#[tokio::test]
async fn test_native_document_is_exported() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_native(FILE_ID, codec::empty_document(RiskLayout::Keyed).unwrap())
        .await;
    let provider = provider_for(&store);

    assert!(provider.list_risks().await.unwrap().is_empty());
    assert_eq!(store.export_count(), 1);
    assert_eq!(store.download_count(), 0);
}

#[tokio::test]
async fn test_legacy_document_keeps_its_layout() {
    let store = Arc::new(MemoryStore::new());
    store
        .put(FILE_ID, codec::empty_document(RiskLayout::Legacy).unwrap())
        .await;
    let provider = provider_for(&store);

    provider.create_risk(risk("Prompt injection")).await.unwrap();

    let fresh = provider_for(&store);
    let summary = fresh.summary().await.unwrap();
    assert!(summary.legacy_layout);
    assert_eq!(summary.risks, 1);
    let loaded = fresh
        .get_risk_by_id(&rid("RISK-PROMPT-INJECTION"))
        .await
        .unwrap();
    assert_eq!(loaded.risk, "Prompt injection");
}

// ============================================================================
// Service
// ============================================================================

#[tokio::test]
async fn test_service_link_twice_is_a_conflict() {
    let store = seeded_store().await;
    let service = service_for(&store);
    service
        .create_risk("Foo", RiskCategory::Other, RiskPatch::default())
        .await
        .unwrap();
    service
        .create_control(
            NewControlId::Next(ControlPrefix::Acc),
            "Review",
            "Accuracy & Judgment",
            ControlPatch::default(),
        )
        .await
        .unwrap();

    service.link_control(&rid("RISK-FOO"), &cid("ACC-01")).await.unwrap();
    let err = service
        .link_control(&rid("RISK-FOO"), &cid("ACC-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegisterError::Conflict { .. }));

    service.unlink_control(&rid("RISK-FOO"), &cid("ACC-01")).await.unwrap();
    let err = service
        .unlink_control(&rid("RISK-FOO"), &cid("ACC-01"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_service_generates_ids() {
    let store = seeded_store().await;
    let service = service_for(&store);

    for _ in 0..2 {
        service
            .create_control(
                NewControlId::Next(ControlPrefix::Sec),
                "Access review",
                "Security & Data Privacy",
                ControlPatch::default(),
            )
            .await
            .unwrap();
    }
    assert_eq!(
        service.next_control_id(ControlPrefix::Sec).await.unwrap(),
        cid("SEC-03")
    );
    assert_eq!(
        service.next_control_id(ControlPrefix::Gov).await.unwrap(),
        cid("GOV-01")
    );

    let first = service
        .create_use_case("Claims triage", Default::default())
        .await
        .unwrap();
    let second = service
        .create_use_case("Contract review", Default::default())
        .await
        .unwrap();
    assert_eq!(first.id.to_string(), "UC-001");
    assert_eq!(second.id.to_string(), "UC-002");
    assert_eq!(first.status, "Concept");
    assert!(!first.created_date.is_empty());
}

#[tokio::test]
async fn test_service_residual_defaults_to_initial() {
    let store = seeded_store().await;
    let service = service_for(&store);

    let created = service
        .create_risk(
            "Toxic output",
            RiskCategory::Behavioral,
            RiskPatch {
                initial_scoring: Some(ScoringPatch {
                    likelihood: Some(4),
                    impact: Some(5),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created.initial_scoring.risk_level, 20);
    assert_eq!(created.residual_scoring.risk_level, 20);
    assert_eq!(created.risk_reduction, 0);
}

#[tokio::test]
async fn test_service_rename_guard() {
    let store = seeded_store().await;
    let service = service_for(&store);
    service
        .create_risk("Model drift", RiskCategory::Accuracy, RiskPatch::default())
        .await
        .unwrap();

    let same_id = RiskPatch {
        risk: Some("model  drift".to_string()),
        ..Default::default()
    };
    service
        .update_risk(&rid("RISK-MODEL-DRIFT"), same_id)
        .await
        .unwrap();

    let other_id = RiskPatch {
        risk: Some("Concept drift".to_string()),
        ..Default::default()
    };
    let err = service
        .update_risk(&rid("RISK-MODEL-DRIFT"), other_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RegisterError::Validation(_)));
}

#[tokio::test]
async fn test_service_views_refresh_after_writes() {
    let store = seeded_store().await;
    let service = service_for(&store);

    assert!(service.list_risks().await.unwrap().is_empty());
    service
        .create_risk("Foo", RiskCategory::Other, RiskPatch::default())
        .await
        .unwrap();
    assert_eq!(service.list_risks().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_service_reports() {
    let store = seeded_store().await;
    let service = service_for(&store);
    for name in ["Foo", "Bar"] {
        service
            .create_risk(name, RiskCategory::Accuracy, RiskPatch::default())
            .await
            .unwrap();
    }
    for _ in 0..2 {
        service
            .create_control(
                NewControlId::Next(ControlPrefix::Acc),
                "Review",
                "Accuracy & Judgment",
                ControlPatch::default(),
            )
            .await
            .unwrap();
    }
    service.link_control(&rid("RISK-FOO"), &cid("ACC-01")).await.unwrap();

    let orphans = service.orphans().await.unwrap();
    assert_eq!(orphans.risks_without_controls.len(), 1);
    assert_eq!(orphans.risks_without_controls[0].id, rid("RISK-BAR"));
    assert_eq!(orphans.controls_without_risks.len(), 1);
    assert_eq!(orphans.controls_without_risks[0].id, cid("ACC-02"));

    let stats = service.risk_statistics().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.with_controls, 1);
    assert_eq!(stats.without_controls, 1);
    assert_eq!(stats.by_category.get("Accuracy"), Some(&2));
    assert_eq!(stats.by_risk_level.very_low, 0);
    assert_eq!(stats.by_risk_level.low, 2);
    assert_eq!(stats.average_initial_risk, 9.0);

    let matrix = service.relationship_matrix().await.unwrap();
    assert_eq!(matrix.relationships.len(), 1);
    assert_eq!(matrix.risks.len(), 2);
}

// ============================================================================
// Derived fields and untouched rows
// ============================================================================

#[tokio::test]
async fn test_create_rederives_tampered_levels() {
    let store = seeded_store().await;
    let provider = provider_for(&store);

    let mut tampered = risk("Tampered");
    tampered.initial_scoring.risk_level = 99;
    tampered.risk_reduction = 500;
    let created = provider.create_risk(tampered).await.unwrap();
    assert_eq!(created.initial_scoring.risk_level, 9);
    assert_eq!(created.risk_reduction, 0);

    let cached = provider.get_risk_by_id(&rid("RISK-TAMPERED")).await.unwrap();
    assert_eq!(cached.initial_scoring.risk_level, 9);

    let fresh = provider_for(&store);
    let loaded = fresh.get_risk_by_id(&rid("RISK-TAMPERED")).await.unwrap();
    assert_eq!(loaded.initial_scoring.risk_level, 9);
    assert_eq!(loaded.risk_reduction, 0);
    assert_eq!(loaded.risk_reduction_percentage, 0);
}

fn legacy_risk_row(category: &str, name: &str, notes: &str) -> Vec<Cell> {
    let mut row = vec![Cell::text(category), Cell::text(name), Cell::Empty];
    row.extend([Cell::Number(2.0), Cell::Number(2.0), Cell::Empty, Cell::Empty]);
    row.extend([Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, Cell::text(notes)]);
    row
}

#[tokio::test]
async fn test_delete_leaves_other_legacy_rows_as_written() {
    let store = Arc::new(MemoryStore::new());
    store
        .put(FILE_ID, codec::empty_document(RiskLayout::Legacy).unwrap())
        .await;
    overwrite_sheet(
        &store,
        SheetKind::Risks,
        RiskLayout::Legacy.header(),
        &[
            legacy_risk_row("Accuracy", "Alpha", ""),
            legacy_risk_row("", "Bravo", "1e3"),
            legacy_risk_row("Accuracy", "Charlie", ""),
        ],
    )
    .await;
    let before = stored_rows(&store, SheetKind::Risks).await;

    let provider = provider_for(&store);
    let bravo = provider.get_risk_by_id(&rid("RISK-BRAVO")).await.unwrap();
    assert_eq!(bravo.risk_category, RiskCategory::Accuracy);
    assert_eq!(bravo.notes, "1e3");

    provider.delete_risk(&rid("RISK-CHARLIE")).await.unwrap();

    let after = stored_rows(&store, SheetKind::Risks).await;
    assert_eq!(after.len(), 2);
    assert_eq!(after[1], before[1]);
    assert!(after[1][0].is_empty());
    assert_eq!(after[1][11], Cell::Text("1e3".to_string()));
    assert!(after[1][5].is_empty());
    assert!(after[1][6].is_empty());
}

// ============================================================================
// Use cases
// ============================================================================

fn use_case(id: &str, title: &str) -> UseCase {
    let mut uc = UseCase::new(ucid(id), title);
    uc.description = "Route inbound claims".to_string();
    uc.business_area = "Operations".to_string();
    uc.owner = "Claims lead".to_string();
    uc.stakeholders = vec!["Legal".to_string(), "IT".to_string()];
    uc
}

#[tokio::test]
async fn test_use_case_round_trips_through_document() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider
        .create_use_case(use_case("UC-004", "Claims triage"))
        .await
        .unwrap();

    let fresh = provider_for(&store);
    let loaded = fresh.get_use_case_by_id(&ucid("UC-004")).await.unwrap();
    assert_eq!(loaded.title, "Claims triage");
    assert_eq!(loaded.description, "Route inbound claims");
    assert_eq!(loaded.business_area, "Operations");
    assert_eq!(loaded.owner, "Claims lead");
    assert_eq!(loaded.stakeholders, vec!["Legal", "IT"]);
    assert!(loaded.related_risk_ids.is_empty());
}

#[tokio::test]
async fn test_delete_use_case_removes_its_edges() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_use_case(use_case("UC-001", "Triage")).await.unwrap();
    provider.create_use_case(use_case("UC-002", "Review")).await.unwrap();
    for uc in ["UC-001", "UC-002"] {
        provider
            .add_use_case_risk_relationship(&ucid(uc), &rid("RISK-FOO"))
            .await
            .unwrap();
    }

    provider.delete_use_case(&ucid("UC-001")).await.unwrap();

    let fresh = provider_for(&store);
    let linked: Vec<UseCaseId> = fresh
        .get_use_cases_for_risk(&rid("RISK-FOO"))
        .await
        .unwrap()
        .iter()
        .map(|uc| uc.id)
        .collect();
    assert_eq!(linked, vec![ucid("UC-002")]);
    assert_eq!(fresh.list_relationships().await.unwrap().len(), 1);
    assert!(fresh.get_use_case_by_id(&ucid("UC-001")).await.is_err());
}

#[tokio::test]
async fn test_delete_risk_removes_use_case_edges() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_risk(risk("Bar")).await.unwrap();
    provider.create_use_case(use_case("UC-001", "Triage")).await.unwrap();
    for id in ["RISK-FOO", "RISK-BAR"] {
        provider
            .add_use_case_risk_relationship(&ucid("UC-001"), &rid(id))
            .await
            .unwrap();
    }

    provider.delete_risk(&rid("RISK-FOO")).await.unwrap();

    let fresh = provider_for(&store);
    let uc = fresh.get_use_case_by_id(&ucid("UC-001")).await.unwrap();
    assert_eq!(uc.related_risk_ids, vec![rid("RISK-BAR")]);

    // A risk recreated under the same id starts unlinked
    fresh.create_risk(risk("Foo")).await.unwrap();
    assert!(fresh
        .get_use_cases_for_risk(&rid("RISK-FOO"))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        fresh.get_use_cases_for_risk(&rid("RISK-BAR")).await.unwrap().len(),
        1
    );
}

// ============================================================================
// Repeated edge rows
// ============================================================================

#[tokio::test]
async fn test_repeated_edge_row_survives_until_unlinked() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();
    provider.create_risk(risk("Bar")).await.unwrap();
    provider.create_control(control("ACC-01")).await.unwrap();
    provider
        .add_risk_control_relationship(&rid("RISK-FOO"), &cid("ACC-01"))
        .await
        .unwrap();

    let mut rows = stored_rows(&store, SheetKind::Relationships).await;
    let mut repeat = rows[0].clone();
    repeat.resize(5, Cell::Empty);
    repeat[4] = Cell::text("entered twice");
    rows.push(repeat.clone());
    overwrite_sheet(
        &store,
        SheetKind::Relationships,
        &codec::relationship::HEADER,
        &rows,
    )
    .await;

    // An unrelated link rewrites the sheet but keeps the repeat
    let provider = provider_for(&store);
    provider
        .add_risk_control_relationship(&rid("RISK-BAR"), &cid("ACC-01"))
        .await
        .unwrap();
    let rows = stored_rows(&store, SheetKind::Relationships).await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], repeat);
    assert_eq!(provider.list_relationships().await.unwrap().len(), 2);

    // Unlinking takes the repeat with it, so the edge cannot come back
    assert!(provider
        .remove_risk_control_relationship(&rid("RISK-FOO"), &cid("ACC-01"))
        .await
        .unwrap());
    assert_eq!(stored_rows(&store, SheetKind::Relationships).await.len(), 1);

    let fresh = provider_for(&store);
    assert!(fresh
        .get_controls_for_risk(&rid("RISK-FOO"))
        .await
        .unwrap()
        .is_empty());
}

// ============================================================================
// Transactions through the service
// ============================================================================

#[tokio::test]
async fn test_service_views_refresh_after_commit() {
    let store = seeded_store().await;
    let service = service_for(&store);

    assert!(service.list_risks().await.unwrap().is_empty());
    service.begin_transaction().await.unwrap();
    assert!(service.in_transaction().await);
    service
        .create_risk("Buffered", RiskCategory::Accuracy, RiskPatch::default())
        .await
        .unwrap();

    // Reads see committed state until the commit lands
    assert!(service.list_risks().await.unwrap().is_empty());

    service.commit_transaction().await.unwrap();
    assert!(!service.in_transaction().await);
    let risks = service.list_risks().await.unwrap();
    assert_eq!(risks.len(), 1);
    assert_eq!(risks[0].id, rid("RISK-BUFFERED"));
}

#[tokio::test]
async fn test_service_rollback_discards_buffered_writes() {
    let store = seeded_store().await;
    let service = service_for(&store);

    service.begin_transaction().await.unwrap();
    service
        .create_risk("Discarded", RiskCategory::Accuracy, RiskPatch::default())
        .await
        .unwrap();
    service.rollback_transaction().await.unwrap();

    assert!(service.list_risks().await.unwrap().is_empty());
    assert!(matches!(
        service.rollback_transaction().await.unwrap_err(),
        RegisterError::Transaction(_)
    ));
    assert_eq!(store.upload_count(), 0);
}

#[tokio::test]
async fn test_rollback_drops_the_cached_snapshot() {
    let store = seeded_store().await;
    let provider = provider_for(&store);
    provider.create_risk(risk("Foo")).await.unwrap();

    provider.begin_transaction().await.unwrap();
    provider.rollback_transaction().await.unwrap();
    store.remove(FILE_ID).await;

    // No stale copy is left to fall back on
    let err = provider.list_risks().await.unwrap_err();
    assert!(matches!(err, RegisterError::StoreUnavailable { .. }));
}
