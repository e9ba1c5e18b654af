//! Subcommand implementations.

use std::path::Path;

use anyhow::Context;
use serde_json::json;
use tracing::info;

use ledgerline_core::iteration::ReprocessRequest;
use ledgerline_core::pipeline::{LedgerPipeline, SubmitRequest, alerts};
use ledgerline_core::upload::UploadRecord;
use ledgerline_core::validation::ExceptionKind;
use ledgerline_db::PgLedgerStore;
use ledgerline_shared::types::{ClientId, ClosureId, Period, UploadId};

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// Pretty JSON instead of text lines.
    pub json: bool,
}

impl Output {
    fn emit(self, value: &serde_json::Value, text: impl FnOnce() -> String) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

/// Reads `file`, submits it and runs the pipeline to completion.
pub async fn ingest(
    pipeline: &LedgerPipeline,
    output: Output,
    client_id: ClientId,
    closure_id: ClosureId,
    period: Period,
    file: &Path,
    filename: Option<String>,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let filename = match filename {
        Some(name) => name,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("file path has no file name")?,
    };

    let upload = pipeline
        .ingest(SubmitRequest {
            client_id,
            closure_id,
            period,
            filename,
            bytes,
        })
        .await?;
    info!(upload_id = %upload.id, iteration = upload.iteration, "upload completed");

    let incidences = pipeline.status(upload.id).await?.incidences;
    let value = json!({
        "upload": upload,
        "alerts": alerts(&incidences),
    });
    output.emit(&value, || {
        let mut text = describe_upload(&upload);
        for alert in alerts(&incidences) {
            let code = alert.sub_code.as_deref().unwrap_or("-");
            text.push_str(&format!(
                "\n  {} {} {code} x{}",
                alert.severity, alert.kind, alert.affected_count
            ));
        }
        text
    })
}

pub async fn reprocess(
    pipeline: &LedgerPipeline,
    output: Output,
    upload_id: UploadId,
    reason: String,
    actor: String,
) -> anyhow::Result<()> {
    let outcome = pipeline
        .reprocess(ReprocessRequest {
            upload_id,
            reason,
            actor,
        })
        .await?;

    output.emit(&json!(outcome), || {
        let diff = &outcome.diff;
        format!(
            "iteration {} ({}) replaces {}: {} resolved, {} new, {} worsened, {} unchanged, {} movements corrected",
            outcome.iteration,
            outcome.upload_id,
            outcome.previous_upload_id,
            diff.resolved.len(),
            diff.new.len(),
            diff.worsened.len(),
            diff.unchanged,
            outcome.movements_corrected,
        )
    })
}

pub async fn status(
    pipeline: &LedgerPipeline,
    output: Output,
    upload_id: UploadId,
) -> anyhow::Result<()> {
    let status = pipeline.status(upload_id).await?;

    let value = json!({
        "upload": status.upload,
        "series": status.series,
        "incidences": status.incidences,
        "history": status.history,
    });
    output.emit(&value, || {
        let mut text = describe_upload(&status.upload);
        text.push_str("\nseries:");
        for upload in &status.series {
            let marker = if upload.is_principal { "*" } else { " " };
            text.push_str(&format!(
                "\n {marker} #{} {} {}",
                upload.iteration, upload.id, upload.state
            ));
        }
        text.push_str("\nincidences:");
        for incidence in &status.incidences {
            text.push_str(&format!(
                "\n  {} {} {} x{}",
                incidence.severity,
                incidence.kind,
                incidence.sub_code.as_deref().unwrap_or("-"),
                incidence.affected_count
            ));
        }
        for entry in &status.history {
            text.push_str(&format!(
                "\nreprocessed #{} by {}: {} ({} resolved, {} new)",
                entry.iteration,
                entry.actor,
                entry.reason,
                entry.resolved_incidences,
                entry.new_incidences
            ));
        }
        text
    })
}

pub async fn revoke_exception(
    store: &PgLedgerStore,
    output: Output,
    client_id: ClientId,
    account_code: &str,
    kind: ExceptionKind,
) -> anyhow::Result<()> {
    let revoked = store
        .reference()
        .revoke_exception(client_id, account_code, kind)
        .await?;
    info!(%client_id, account_code, kind = kind.as_str(), revoked, "exception revoked");

    output.emit(&json!({ "revoked": revoked }), || {
        format!("revoked {revoked} {} exception(s) on {account_code}", kind.as_str())
    })
}

fn describe_upload(upload: &UploadRecord) -> String {
    let mut text = format!(
        "{} {} period {} iteration {}: {}",
        upload.id, upload.original_filename, upload.period, upload.iteration, upload.state
    );
    if let Some(summary) = &upload.summary {
        text.push_str(&format!(
            "\n  {} accounts, {} movements ({} incomplete), {} incidences",
            summary.accounts, summary.movements, summary.incomplete_movements, summary.incidences
        ));
    }
    if let Some(message) = &upload.error {
        text.push_str(&format!("\n  {message}"));
    }
    text
}
