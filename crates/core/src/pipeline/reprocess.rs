//! Reprocessing runs.
//!
//! A run re-evaluates the source movements of a series with the catalogs
//! and exceptions as they are now, records the result as a new iteration and
//! makes it principal. Runs on the same (client, closure) never overlap.

use std::time::Instant;

use tracing::{error, info};

use super::error::PipelineError;
use super::publish::publish;
use super::stage::{Stage, StageRunner};
use super::{LedgerPipeline, severity_counts};
use crate::incidence::{DetectionInput, IncidenceDetector};
use crate::iteration::{IterationOutcome, ReprocessRequest, ReprocessingHistoryEntry, diff_incidences};
use crate::store::IterationCommit;
use crate::upload::{ProcessingSummary, UploadLifecycle, UploadRecord, UploadState};
use crate::validation::MovementEnricher;

impl LedgerPipeline {
    /// Reprocesses the series `request.upload_id` belongs to.
    ///
    /// The principal iteration of the series is the baseline, so two
    /// requests naming the same upload run one after the other and produce
    /// consecutive iterations.
    ///
    /// # Returns
    ///
    /// - The new upload id and iteration number
    /// - The incidence diff against the previous principal
    /// - The number of movements whose incomplete flag was cleared
    ///
    /// # Errors
    ///
    /// `PipelineError::ReasonRequired` for a blank reason,
    /// `PipelineError::NotReprocessable` when the principal iteration has
    /// not completed, or the first failing stage (the new iteration is then
    /// left in `error` and the previous one stays principal).
    pub async fn reprocess(
        &self,
        request: ReprocessRequest,
    ) -> Result<IterationOutcome, PipelineError> {
        if request.reason.trim().is_empty() {
            return Err(PipelineError::ReasonRequired);
        }

        let started = Instant::now();
        let requested = self.store.get_upload(request.upload_id).await?;
        let series_key = (requested.client_id, requested.closure_id);
        let _lease = self.iteration_locks.acquire(&series_key).await;

        let previous = self
            .store
            .series(requested.client_id, requested.closure_id)
            .await?
            .into_iter()
            .find(|u| u.is_principal)
            .unwrap_or(requested);
        if previous.state != UploadState::Completed {
            return Err(PipelineError::NotReprocessable {
                upload_id: previous.id,
                state: previous.state,
            });
        }

        let upload = self
            .store
            .begin_iteration(&previous, request.reason.trim(), &request.actor)
            .await?;
        info!(
            upload_id = %upload.id,
            previous_upload_id = %previous.id,
            iteration = upload.iteration,
            actor = %request.actor,
            "reprocessing started"
        );

        let mut runner = StageRunner::new(self.stage_budget());
        match self
            .run_iteration(&previous, &upload, &request, &mut runner, started)
            .await
        {
            Ok(outcome) => {
                info!(
                    upload_id = %outcome.upload_id,
                    iteration = outcome.iteration,
                    new = outcome.diff.new.len(),
                    resolved = outcome.diff.resolved.len(),
                    worsened = outcome.diff.worsened.len(),
                    "reprocessing completed"
                );
                Ok(outcome)
            }
            Err(err) => Err(self.abort_iteration(upload, err).await),
        }
    }

    async fn run_iteration(
        &self,
        previous: &UploadRecord,
        upload: &UploadRecord,
        request: &ReprocessRequest,
        runner: &mut StageRunner,
        started: Instant,
    ) -> Result<IterationOutcome, PipelineError> {
        let (profile, movements, enrichment, exceptions, degraded) = runner
            .run(Stage::Enrich, async {
                let profile = self.store.client_profile(upload.client_id).await?;
                let (catalogs, exceptions, degraded) =
                    self.load_reference_data(upload.client_id).await;
                let accounts = self.store.accounts(upload.client_id).await?;
                let movements = self.store.movements(upload.source_upload_id).await?;
                let enrichment = MovementEnricher::new(&catalogs, &exceptions, profile.bilingual)
                    .enrich(&accounts, &movements);
                Ok::<_, PipelineError>((profile, movements, enrichment, exceptions, degraded))
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

        let (incidences, previous_incidences) = runner
            .run(Stage::Consolidate, async {
                let incidences = self.consolidator.consolidate(upload.id, buckets)?;
                let previous_incidences = self.store.active_incidences(previous.id).await?;
                Ok::<_, PipelineError>((incidences, previous_incidences))
            })
            .await?;

        let outcome = IterationOutcome {
            upload_id: upload.id,
            iteration: upload.iteration,
            previous_upload_id: previous.id,
            diff: diff_incidences(&previous_incidences, &incidences),
            movements_corrected: enrichment.corrected_movements,
        };

        let summary = ProcessingSummary {
            rows_scanned: 0,
            accounts: enrichment.accounts.len(),
            new_accounts: 0,
            opening_balances: 0,
            movements: movements.len(),
            incomplete_movements: enrichment.incomplete_movements,
            corrected_movements: enrichment.corrected_movements,
            row_errors: 0,
            incidences: incidences.len(),
            incidences_by_severity: severity_counts(&incidences),
            min_date: movements.iter().map(|m| m.date).min(),
            max_date: movements.iter().map(|m| m.date).max(),
            catalogs_degraded: degraded,
            stages: runner.timings(),
            duration_ms: runner.elapsed_ms(),
        };

        let done = runner
            .run(Stage::Publish, async {
                let complete = UploadLifecycle::complete(upload.state, None)?;
                let mut done = upload.clone();
                done.apply(&complete);
                done.summary = Some(summary);
                done.is_principal = true;

                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                let history = ReprocessingHistoryEntry::record(
                    &outcome,
                    previous_incidences.len(),
                    incidences.len(),
                    duration_ms,
                    request,
                );
                self.store
                    .commit_iteration(IterationCommit {
                        upload: &done,
                        previous_upload_id: previous.id,
                        enrichment: &enrichment,
                        incidences: &incidences,
                        history: &history,
                    })
                    .await?;
                Ok::<_, PipelineError>(done)
            })
            .await?;

        publish(self.cache.as_ref(), &done, Some(&incidences), self.stage_budget()).await;
        Ok(outcome)
    }

    async fn abort_iteration(&self, mut upload: UploadRecord, err: PipelineError) -> PipelineError {
        error!(
            upload_id = %upload.id,
            code = err.error_code(),
            error = %err,
            "reprocessing failed"
        );
        match UploadLifecycle::fail(upload.state, err.to_string()) {
            Ok(transition) => {
                upload.apply(&transition);
                if let Err(store_err) = self.store.update_upload(&upload).await {
                    error!(upload_id = %upload.id, error = %store_err, "failed to record error state");
                }
            }
            Err(transition_err) => {
                error!(upload_id = %upload.id, error = %transition_err, "cannot mark iteration as failed");
            }
        }
        err
    }
}
