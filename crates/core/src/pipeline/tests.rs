//! End-to-end runs over the in-memory store, storage and cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use ledgerline_shared::config::{CacheSettings, PipelineSettings};
use ledgerline_shared::types::{ClientId, ClosureId, Period, UploadId};

use super::*;
use crate::cache::{CacheBackend, CacheError, MokaBackend, SnapshotCache, SnapshotKind};
use crate::incidence::IncidenceKind;
use crate::intake::IntakeError;
use crate::iteration::ReprocessRequest;
use crate::ledger::{ClientProfile, closing_balances};
use crate::storage::StorageService;
use crate::store::{LedgerStore, MemoryStore, StoreError};
use crate::upload::UploadState;
use crate::validation::{ExceptionKind, ValidationException};

const LEDGER: &str = "\
Libro Mayor Acme SpA;;;;;;
Cuenta;Fecha;Tipo Doc;N Doc;Debe;Haber;Saldo
Saldo anterior: 1101 Caja;;;;;;1000
;05/03/2024;33;100;500;0;
;12/03/2024;33;101;0;200;
Saldo anterior: 2101 Proveedores;;;;;;0
;15/03/2024;99;7;0;300;
";

struct Harness {
    pipeline: LedgerPipeline,
    store: Arc<MemoryStore>,
    cache: SnapshotCache,
    client: ClientProfile,
}

impl Harness {
    async fn new() -> Self {
        Self::with_settings(PipelineSettings::default(), CacheSettings::default()).await
    }

    async fn with_settings(settings: PipelineSettings, cache_settings: CacheSettings) -> Self {
        Self::with_backend(settings, cache_settings, Arc::new(MokaBackend::new(1_000))).await
    }

    async fn with_backend(
        settings: PipelineSettings,
        cache_settings: CacheSettings,
        backend: Arc<dyn CacheBackend>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let client = ClientProfile {
            id: ClientId::new(),
            tax_id: "76.123.456-K".to_string(),
            name: "Acme SpA".to_string(),
            bilingual: false,
        };
        store.add_client(client.clone()).await;
        store.add_document_type("33", "Factura electrónica").await;
        for code in ["1101", "2101"] {
            store
                .add_classification(client.id, code, "IFRS", "Current")
                .await;
            store
                .add_exception(ValidationException {
                    client_id: client.id,
                    account_code: code.to_string(),
                    kind: ExceptionKind::NewAccount,
                })
                .await;
        }

        let cache = SnapshotCache::new(backend, &cache_settings);
        let pipeline = LedgerPipeline::new(
            store.clone(),
            StorageService::in_memory().unwrap(),
            settings,
        )
        .unwrap()
        .with_cache(cache.clone());

        Self {
            pipeline,
            store,
            cache,
            client,
        }
    }

    fn request(&self, closure_id: ClosureId, period: &str, filename: &str, body: &str) -> SubmitRequest {
        SubmitRequest {
            client_id: self.client.id,
            closure_id,
            period: period.parse().unwrap(),
            filename: filename.to_string(),
            bytes: body.as_bytes().to_vec(),
        }
    }

    fn march(&self, closure_id: ClosureId) -> SubmitRequest {
        self.request(closure_id, "202403", "76123456-K_LibroMayor_202403.csv", LEDGER)
    }
}

/// Cache backend whose writes stall or fail.
enum BrokenBackend {
    Slow(Duration),
    Down,
}

#[async_trait]
impl CacheBackend for BrokenBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        match self {
            Self::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            Self::Down => Err(CacheError::Backend("connection refused".to_string())),
        }
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        Ok(vec![None; keys.len()])
    }

    async fn delete_many(&self, _keys: &[String]) -> Result<usize, CacheError> {
        Ok(0)
    }
}

fn reprocess_request(upload_id: UploadId, reason: &str) -> ReprocessRequest {
    ReprocessRequest {
        upload_id,
        reason: reason.to_string(),
        actor: "analyst@firm.cl".to_string(),
    }
}

#[tokio::test]
async fn test_ingest_builds_ledger_and_balances() {
    let h = Harness::new().await;
    let closure = ClosureId::new();

    let upload = h.pipeline.ingest(h.march(closure)).await.unwrap();

    assert_eq!(upload.state, UploadState::Completed);
    assert!(upload.is_principal);
    assert_eq!(upload.iteration, 1);
    assert_eq!(upload.error, None);
    let summary = upload.summary.as_ref().unwrap();
    assert_eq!(summary.accounts, 2);
    assert_eq!(summary.opening_balances, 2);
    assert_eq!(summary.movements, 3);
    assert_eq!(summary.row_errors, 0);
    assert_eq!(summary.stages.len(), Stage::INGEST.len() - 1);

    let openings = h.store.opening_balances(closure).await;
    let movements = h.store.movements(upload.id).await.unwrap();
    let balances = closing_balances(
        openings.iter().map(|o| (o.account_code.as_str(), o.balance)),
        movements
            .iter()
            .map(|m| (m.account_code.as_str(), m.debit, m.credit)),
    );
    assert_eq!(balances["1101"].balance, dec!(1300));
    assert_eq!(balances["2101"].balance, dec!(-300));
}

#[tokio::test]
async fn test_unknown_document_type_yields_one_incidence() {
    let h = Harness::new().await;
    let upload = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap();

    let status = h.pipeline.status(upload.id).await.unwrap();
    assert_eq!(status.incidences.len(), 1);
    let incidence = &status.incidences[0];
    assert_eq!(incidence.kind, IncidenceKind::UnrecognizedDocumentType);
    assert_eq!(incidence.sub_code.as_deref(), Some("99"));
    assert_eq!(incidence.affected_count, 1);
    assert_eq!(incidence.statistics.total_amount, dec!(300));

    let movements = h.store.movements(upload.id).await.unwrap();
    assert_eq!(movements.iter().filter(|m| m.incomplete).count(), 1);
    assert_eq!(
        movements
            .iter()
            .filter(|m| m.document_type_ref.as_deref() == Some("33"))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_row_errors_complete_with_warnings() {
    let h = Harness::new().await;
    let body = format!("{LEDGER};31/02/2024;33;102;10;0;\n;05/03/2024;33;103;abc;0;\n");
    let request = h.request(
        ClosureId::new(),
        "202403",
        "76123456-K_LibroMayor_202403.csv",
        &body,
    );

    let upload = h.pipeline.ingest(request).await.unwrap();

    assert_eq!(upload.state, UploadState::Completed);
    let summary = upload.summary.as_ref().unwrap();
    assert_eq!(summary.movements, 3);
    assert_eq!(summary.row_errors, 2);
    let warnings = upload.error.as_deref().unwrap();
    assert!(warnings.starts_with("row 8: "));
    assert!(warnings.contains("; row 9: "));
}

#[tokio::test]
async fn test_tax_id_mismatch_fails_before_parsing() {
    let h = Harness::new().await;
    let request = h.request(
        ClosureId::new(),
        "202403",
        "99999999-9_LibroMayor_202403.csv",
        LEDGER,
    );
    let upload = h.pipeline.submit(request).await.unwrap();

    let err = h.pipeline.run(upload.id).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Intake(IntakeError::TaxIdMismatch { .. })
    ));
    let stored = h.store.get_upload(upload.id).await.unwrap();
    assert_eq!(stored.state, UploadState::Error);
    assert!(stored.error.unwrap().contains("99999999-9"));
    assert!(h.store.movements(upload.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_header_is_structural_error() {
    let h = Harness::new().await;
    let request = h.request(
        ClosureId::new(),
        "202403",
        "76123456-K_LibroMayor_202403.csv",
        "a;b;c\n1;2;3\n",
    );

    let err = h.pipeline.ingest(request).await.unwrap_err();

    assert!(matches!(err, PipelineError::Header(_)));
    assert_eq!(err.error_code(), "HEADER_NOT_FOUND");
}

#[tokio::test]
async fn test_empty_file_is_rejected() {
    let h = Harness::new().await;
    let request = h.request(
        ClosureId::new(),
        "202403",
        "76123456-K_LibroMayor_202403.csv",
        "",
    );

    let err = h.pipeline.ingest(request).await.unwrap_err();

    assert!(matches!(err, PipelineError::Intake(IntakeError::EmptyFile)));
}

#[tokio::test]
async fn test_failure_after_parse_rolls_back_ledger_rows() {
    let h = Harness::new().await;
    h.store.set_fail_incidence_writes(true).await;

    let err = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap_err();

    assert!(matches!(err, PipelineError::Store(StoreError::Backend(_))));
    assert!(err.is_retryable());
    let client_accounts = h.store.accounts(h.client.id).await.unwrap();
    assert!(client_accounts.is_empty());

    let status = h
        .cache
        .get::<ProcessingStatus>(h.client.id, "202403".parse().unwrap(), SnapshotKind::ProcessingStatus)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, UploadState::Error);
    assert!(h.store.movements(status.upload_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_outage_degrades_instead_of_failing() {
    let h = Harness::new().await;
    h.store.set_catalogs_unavailable(true).await;

    let upload = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap();

    assert_eq!(upload.state, UploadState::Completed);
    let summary = upload.summary.unwrap();
    assert!(summary.catalogs_degraded);
    assert_eq!(summary.incomplete_movements, 3);
}

#[tokio::test]
async fn test_run_publishes_status_and_alerts() {
    let h = Harness::new().await;
    let upload = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap();

    let snapshots = h
        .cache
        .get_batch(
            h.client.id,
            upload.period,
            &[SnapshotKind::ProcessingStatus, SnapshotKind::Alerts, SnapshotKind::Kpis],
        )
        .await
        .unwrap();

    assert_eq!(snapshots.len(), 2);
    let alerts: Vec<Alert> =
        serde_json::from_value(snapshots[&SnapshotKind::Alerts].clone()).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].sub_code.as_deref(), Some("99"));
}

#[tokio::test]
async fn test_cache_keeps_newest_periods() {
    let cache_settings = CacheSettings {
        max_entries_per_client: 2,
        ..CacheSettings::default()
    };
    let h = Harness::with_settings(PipelineSettings::default(), cache_settings).await;
    for period in ["202401", "202402", "202403"] {
        let body = LEDGER.replace("/03/2024", &format!("/{}/2024", &period[4..]));
        let request = h.request(
            ClosureId::new(),
            period,
            &format!("76123456-K_LibroMayor_{period}.csv"),
            &body,
        );
        h.pipeline.ingest(request).await.unwrap();
    }

    let cached = h.cache.cached_periods(h.client.id).await.unwrap();
    let expected: Vec<Period> = vec!["202403".parse().unwrap(), "202402".parse().unwrap()];
    assert_eq!(cached, expected);
}

#[tokio::test]
async fn test_reprocess_without_changes_is_unchanged() {
    let h = Harness::new().await;
    let first = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap();

    let outcome = h
        .pipeline
        .reprocess(reprocess_request(first.id, "monthly review"))
        .await
        .unwrap();

    assert_eq!(outcome.iteration, 2);
    assert_eq!(outcome.previous_upload_id, first.id);
    assert!(outcome.diff.new.is_empty());
    assert!(outcome.diff.resolved.is_empty());
    assert_eq!(outcome.diff.unchanged, 1);
    assert_eq!(outcome.movements_corrected, 0);

    let status = h.pipeline.status(outcome.upload_id).await.unwrap();
    assert!(status.upload.is_principal);
    assert_eq!(status.upload.state, UploadState::Completed);
    assert_eq!(status.upload.source_upload_id, first.id);
    assert_eq!(status.series.iter().filter(|u| u.is_principal).count(), 1);
    assert_eq!(status.history.len(), 1);
    assert_eq!(status.history[0].reason, "monthly review");
    assert!(h
        .store
        .all_incidences(first.id)
        .await
        .iter()
        .all(|i| !i.active));
}

#[tokio::test]
async fn test_reprocess_after_catalog_fix_resolves_incidence() {
    let h = Harness::new().await;
    let first = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap();
    h.store.add_document_type("99", "Otro").await;

    let outcome = h
        .pipeline
        .reprocess(reprocess_request(first.id, "catalog updated"))
        .await
        .unwrap();

    assert_eq!(outcome.diff.fully_resolved(), 1);
    assert_eq!(outcome.diff.resolved[0].key.sub_code.as_deref(), Some("99"));
    assert_eq!(outcome.movements_corrected, 1);
    assert!(h
        .store
        .movements(first.id)
        .await
        .unwrap()
        .iter()
        .all(|m| !m.incomplete));
}

#[tokio::test]
async fn test_revoked_exception_reports_again() {
    let h = Harness::new().await;
    h.store
        .add_exception(ValidationException {
            client_id: h.client.id,
            account_code: "2101".to_string(),
            kind: ExceptionKind::DocumentType,
        })
        .await;
    let first = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap();
    assert!(h.store.active_incidences(first.id).await.unwrap().is_empty());

    h.store
        .revoke_exception(h.client.id, "2101", ExceptionKind::DocumentType)
        .await;
    let outcome = h
        .pipeline
        .reprocess(reprocess_request(first.id, "exception revoked"))
        .await
        .unwrap();

    assert_eq!(outcome.diff.new.len(), 1);
    assert_eq!(outcome.diff.new[0].current_count, 1);
}

#[tokio::test]
async fn test_concurrent_reprocessing_allocates_consecutive_iterations() {
    let h = Harness::new().await;
    let closure = ClosureId::new();
    let first = h.pipeline.ingest(h.march(closure)).await.unwrap();
    let other = h.pipeline.clone();

    let (a, b) = tokio::join!(
        h.pipeline.reprocess(reprocess_request(first.id, "a")),
        other.reprocess(reprocess_request(first.id, "b")),
    );

    let mut iterations = vec![a.unwrap().iteration, b.unwrap().iteration];
    iterations.sort_unstable();
    assert_eq!(iterations, vec![2, 3]);

    let series = h.store.series(h.client.id, closure).await.unwrap();
    assert_eq!(series.iter().map(|u| u.iteration).collect::<Vec<_>>(), vec![1, 2, 3]);
    let principal: Vec<_> = series.iter().filter(|u| u.is_principal).collect();
    assert_eq!(principal.len(), 1);
    assert_eq!(principal[0].iteration, 3);
}

#[tokio::test]
async fn test_reprocess_requires_reason() {
    let h = Harness::new().await;
    let first = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap();

    let err = h
        .pipeline
        .reprocess(reprocess_request(first.id, "  "))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::ReasonRequired));
}

#[tokio::test]
async fn test_failed_upload_cannot_be_reprocessed() {
    let h = Harness::new().await;
    let request = h.request(
        ClosureId::new(),
        "202403",
        "99999999-9_LibroMayor_202403.csv",
        LEDGER,
    );
    let upload = h.pipeline.submit(request).await.unwrap();
    h.pipeline.run(upload.id).await.unwrap_err();

    let err = h
        .pipeline
        .reprocess(reprocess_request(upload.id, "retry"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::NotReprocessable {
            state: UploadState::Error,
            ..
        }
    ));
}

#[tokio::test]
async fn test_failed_reprocessing_keeps_previous_principal() {
    let h = Harness::new().await;
    let closure = ClosureId::new();
    let first = h.pipeline.ingest(h.march(closure)).await.unwrap();
    h.store.set_fail_incidence_writes(true).await;

    h.pipeline
        .reprocess(reprocess_request(first.id, "retry"))
        .await
        .unwrap_err();

    let series = h.store.series(h.client.id, closure).await.unwrap();
    assert_eq!(series.len(), 2);
    assert!(series[0].is_principal);
    assert_eq!(series[1].state, UploadState::Error);
    assert!(!h.store.active_incidences(first.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_new_upload_in_series_takes_next_iteration() {
    let h = Harness::new().await;
    let closure = ClosureId::new();
    let first = h.pipeline.ingest(h.march(closure)).await.unwrap();
    let second = h.pipeline.ingest(h.march(closure)).await.unwrap();

    assert_eq!(second.iteration, 2);
    assert!(second.is_principal);
    let first = h.store.get_upload(first.id).await.unwrap();
    assert!(!first.is_principal);
}

#[tokio::test]
async fn test_run_rejects_non_received_upload() {
    let h = Harness::new().await;
    let upload = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap();

    let err = h.pipeline.run(upload.id).await.unwrap_err();

    assert!(matches!(err, PipelineError::Upload(_)));
}

#[tokio::test]
async fn test_failed_later_upload_keeps_series_openings() {
    let h = Harness::new().await;
    let closure = ClosureId::new();
    let first = h.pipeline.ingest(h.march(closure)).await.unwrap();
    let mut before = h.store.opening_balances(closure).await;
    before.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    assert_eq!(before.len(), 2);

    h.store.set_fail_incidence_writes(true).await;
    h.pipeline.ingest(h.march(closure)).await.unwrap_err();

    let first = h.store.get_upload(first.id).await.unwrap();
    assert!(first.is_principal);
    assert_eq!(first.state, UploadState::Completed);
    let mut after = h.store.opening_balances(closure).await;
    after.sort_by(|a, b| a.account_code.cmp(&b.account_code));
    assert_eq!(after, before);
    assert_eq!(h.store.movements(first.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_slow_cache_does_not_fail_completed_run() {
    let settings = PipelineSettings {
        stage_timeout_secs: 1,
        ..PipelineSettings::default()
    };
    let h = Harness::with_backend(
        settings,
        CacheSettings::default(),
        Arc::new(BrokenBackend::Slow(Duration::from_secs(3))),
    )
    .await;
    let closure = ClosureId::new();

    let first = h.pipeline.ingest(h.march(closure)).await.unwrap();
    assert_eq!(first.state, UploadState::Completed);
    assert_eq!(h.store.movements(first.id).await.unwrap().len(), 3);

    let outcome = h
        .pipeline
        .reprocess(reprocess_request(first.id, "month-end review"))
        .await
        .unwrap();
    let series = h.store.series(h.client.id, closure).await.unwrap();
    assert_eq!(series.len(), 2);
    assert!(series[1].is_principal);
    assert_eq!(series[1].id, outcome.upload_id);
    assert_eq!(series[1].state, UploadState::Completed);
}

#[tokio::test]
async fn test_cache_outage_does_not_fail_run() {
    let h = Harness::with_backend(
        PipelineSettings::default(),
        CacheSettings::default(),
        Arc::new(BrokenBackend::Down),
    )
    .await;

    let upload = h.pipeline.ingest(h.march(ClosureId::new())).await.unwrap();

    assert_eq!(upload.state, UploadState::Completed);
    assert!(upload.is_principal);
    assert_eq!(h.store.active_incidences(upload.id).await.unwrap().len(), 1);
}
