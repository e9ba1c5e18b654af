//! Intake and first-run stages.

use std::path::Path;

use tracing::{error, info, warn};

use ledgerline_shared::types::{ClientId, ClosureId, Period, UploadId};

use super::error::PipelineError;
use super::publish::publish;
use super::stage::{Stage, StageRunner};
use super::{LedgerPipeline, severity_counts};
use crate::incidence::{DetectionInput, IncidenceDetector};
use crate::intake::{IntakeError, LedgerFileName, content_hash, verify_content};
use crate::parser::{LedgerParser, ParsedLedger};
use crate::reader::{self, Column, ReadError, SheetFormat, find_header_row};
use crate::storage::{LedgerObject, StorageError};
use crate::upload::{
    NewUpload, ProcessingSummary, UploadLifecycle, UploadRecord, join_warnings,
};
use crate::validation::MovementEnricher;

/// A ledger file handed in for one client period.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Owning client.
    pub client_id: ClientId,
    /// Closure (period series) the file belongs to.
    pub closure_id: ClosureId,
    /// Period the file covers.
    pub period: Period,
    /// Original filename.
    pub filename: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl LedgerPipeline {
    /// Stores the file and records the upload in state `received`.
    ///
    /// The first upload of a series is its principal iteration 1; later
    /// uploads take the next iteration number and become principal when
    /// their run completes.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Storage` for an oversized file or an
    /// unsupported extension, or the store failure.
    pub async fn submit(&self, request: SubmitRequest) -> Result<UploadRecord, PipelineError> {
        let SubmitRequest {
            client_id,
            closure_id,
            period,
            filename,
            bytes,
        } = request;
        self.storage
            .validate_upload(&filename, bytes.len() as u64)?;

        let _lease = self.iteration_locks.acquire(&(client_id, closure_id)).await;
        let latest = self
            .store
            .series(client_id, closure_id)
            .await?
            .iter()
            .map(|u| u.iteration)
            .max();

        let mut upload = UploadRecord::received(NewUpload {
            client_id,
            closure_id,
            period,
            original_filename: filename.clone(),
            storage_path: String::new(),
            content_hash: content_hash(&bytes),
        });
        if let Some(latest) = latest {
            upload.iteration = latest + 1;
            upload.is_principal = false;
        }

        let object = LedgerObject {
            client_id,
            period,
            upload_id: upload.id,
            filename,
        };
        let stored = self.storage.put(&object, bytes).await?;
        upload.storage_path = stored.storage_key;

        if let Err(err) = self.store.create_upload(&upload).await {
            if let Err(cleanup) = self.storage.delete(&upload.storage_path).await {
                warn!(storage_key = %upload.storage_path, error = %cleanup, "orphaned ledger file");
            }
            return Err(err.into());
        }

        info!(
            upload_id = %upload.id,
            %client_id,
            %period,
            iteration = upload.iteration,
            file_size = stored.file_size,
            "upload received"
        );
        Ok(upload)
    }

    /// Submits a file and runs it through every stage.
    ///
    /// # Errors
    ///
    /// Same as [`Self::submit`] and [`Self::run`].
    pub async fn ingest(&self, request: SubmitRequest) -> Result<UploadRecord, PipelineError> {
        let upload = self.submit(request).await?;
        self.run(upload.id).await
    }

    /// Runs a received upload through every stage.
    ///
    /// # Returns
    ///
    /// The completed upload. Row errors do not fail the run; they are kept
    /// as a warning list in the upload's error field.
    ///
    /// # Errors
    ///
    /// Returns the first fatal stage error after rolling back the upload's
    /// ledger rows and marking it `error`.
    pub async fn run(&self, upload_id: UploadId) -> Result<UploadRecord, PipelineError> {
        let mut upload = self.store.get_upload(upload_id).await?;
        let start = UploadLifecycle::start_processing(upload.state)?;
        upload.apply(&start);
        self.store.update_upload(&upload).await?;
        info!(%upload_id, filename = %upload.original_filename, "processing started");

        let mut runner = StageRunner::new(self.stage_budget());
        match self.run_stages(&upload, &mut runner).await {
            Ok(done) => {
                info!(
                    %upload_id,
                    duration_ms = runner.elapsed_ms(),
                    warnings = done.error.is_some(),
                    "processing completed"
                );
                Ok(done)
            }
            Err(err) => Err(self.abort(upload, err).await),
        }
    }

    async fn run_stages(
        &self,
        upload: &UploadRecord,
        runner: &mut StageRunner,
    ) -> Result<UploadRecord, PipelineError> {
        let profile = runner
            .run(Stage::ValidateFilename, async {
                let profile = self.store.client_profile(upload.client_id).await?;
                LedgerFileName::parse(&upload.original_filename, &self.settings.filename_label)?
                    .check_against(&profile, upload.period)?;
                Ok::<_, PipelineError>(profile)
            })
            .await?;

        let bytes = runner
            .run(Stage::VerifyFile, async {
                let bytes = match self.storage.read(&upload.storage_path).await {
                    Ok(bytes) => bytes,
                    Err(StorageError::NotFound { .. }) => {
                        return Err(IntakeError::FileMissing(upload.storage_path.clone()).into());
                    }
                    Err(err) => return Err(err.into()),
                };
                verify_content(&bytes, &upload.content_hash)?;
                Ok::<_, PipelineError>(bytes)
            })
            .await?;

        let (parsed, write) = runner
            .run(Stage::Parse, async {
                let format = sheet_format(&upload.original_filename)?;
                let window = self.settings.header_search_window;
                let parsed = tokio::task::spawn_blocking(move || parse_sheet(bytes, format, window))
                    .await
                    .map_err(|e| PipelineError::Internal(e.to_string()))??;
                let write = self.store.replace_ledger(upload, &parsed).await?;
                Ok::<_, PipelineError>((parsed, write))
            })
            .await?;

        let (movements, enrichment, exceptions, degraded) = runner
            .run(Stage::Enrich, async {
                let (catalogs, exceptions, degraded) =
                    self.load_reference_data(upload.client_id).await;
                let accounts = self.store.accounts(upload.client_id).await?;
                let movements = self.store.movements(upload.id).await?;
                let enrichment = MovementEnricher::new(&catalogs, &exceptions, profile.bilingual)
                    .enrich(&accounts, &movements);
                self.store.apply_enrichment(&enrichment).await?;
                Ok::<_, PipelineError>((movements, enrichment, exceptions, degraded))
            })
            .await?;

        let buckets = runner
            .run(Stage::Detect, async {
                Ok::<_, PipelineError>(IncidenceDetector::detect(&DetectionInput {
                    movements: &movements,
                    enrichment: &enrichment,
                    exceptions: &exceptions,
                    bilingual: profile.bilingual,
                    source_upload_id: upload.source_upload_id,
                }))
            })
            .await?;

        let incidences = runner
            .run(Stage::Consolidate, async {
                let incidences = self.consolidator.consolidate(upload.id, buckets)?;
                self.store.replace_incidences(upload.id, &incidences).await?;
                Ok::<_, PipelineError>(incidences)
            })
            .await?;

        let summary = ProcessingSummary {
            rows_scanned: parsed.rows_scanned,
            accounts: write.accounts,
            new_accounts: write.new_account_codes.len(),
            opening_balances: write.opening_balances,
            movements: write.movements,
            incomplete_movements: enrichment.incomplete_movements,
            corrected_movements: enrichment.corrected_movements,
            row_errors: parsed.errors.len(),
            incidences: incidences.len(),
            incidences_by_severity: severity_counts(&incidences),
            min_date: parsed.min_date,
            max_date: parsed.max_date,
            catalogs_degraded: degraded,
            stages: runner.timings(),
            duration_ms: runner.elapsed_ms(),
        };

        let done = runner
            .run(Stage::Publish, async {
                let complete =
                    UploadLifecycle::complete(upload.state, join_warnings(&parsed.warnings()))?;
                let mut done = upload.clone();
                done.apply(&complete);
                done.summary = Some(summary);
                self.store.update_upload(&done).await?;
                if !done.is_principal {
                    self.store.promote_principal(done.id).await?;
                    done.is_principal = true;
                }
                Ok::<_, PipelineError>(done)
            })
            .await?;

        publish(self.cache.as_ref(), &done, Some(&incidences), self.stage_budget()).await;
        Ok(done)
    }

    /// Rolls back a failed run and returns the error that caused it.
    async fn abort(&self, mut upload: UploadRecord, err: PipelineError) -> PipelineError {
        error!(
            upload_id = %upload.id,
            code = err.error_code(),
            error = %err,
            "processing failed"
        );

        if let Err(rollback) = self.store.discard_ledger(upload.id).await {
            error!(upload_id = %upload.id, error = %rollback, "rollback failed");
        }

        match UploadLifecycle::fail(upload.state, err.to_string()) {
            Ok(transition) => {
                upload.apply(&transition);
                match self.store.update_upload(&upload).await {
                    Ok(()) => {
                        publish(self.cache.as_ref(), &upload, None, self.stage_budget()).await;
                    }
                    Err(store_err) => {
                        error!(upload_id = %upload.id, error = %store_err, "failed to record error state");
                    }
                }
            }
            Err(transition_err) => {
                error!(upload_id = %upload.id, error = %transition_err, "cannot mark upload as failed");
            }
        }
        err
    }
}

fn sheet_format(filename: &str) -> Result<SheetFormat, ReadError> {
    let path = Path::new(filename);
    SheetFormat::from_path(path).ok_or_else(|| {
        ReadError::UnsupportedFormat(
            path.extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
    })
}

fn parse_sheet(
    bytes: Vec<u8>,
    format: SheetFormat,
    search_window: usize,
) -> Result<ParsedLedger, PipelineError> {
    let sheet = reader::from_bytes(bytes, format)?;
    let columns = find_header_row(&sheet, &Column::ALL, search_window)?;
    Ok(LedgerParser::new(&columns).parse(&sheet))
}
