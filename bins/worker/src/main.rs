//! Ledgerline worker.
//!
//! Command-line entry point for ingesting ledger files, reprocessing
//! uploads and inspecting their status.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerline_core::cache::{MokaBackend, SnapshotCache};
use ledgerline_core::pipeline::{LedgerPipeline, PipelineError};
use ledgerline_core::storage::{StorageConfig, StorageService};
use ledgerline_core::validation::ExceptionKind;
use ledgerline_db::{PgLedgerStore, connect_with};
use ledgerline_shared::types::{ClientId, ClosureId, Period, UploadId};
use ledgerline_shared::{AppConfig, AppError};

#[derive(Parser, Debug)]
#[command(name = "ledgerline", version, about = "General-ledger ingestion and reprocessing")]
struct Cli {
    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a ledger file and run it through the pipeline.
    Ingest {
        /// Owning client.
        #[arg(long)]
        client: ClientId,
        /// Closure the file belongs to.
        #[arg(long)]
        closure: ClosureId,
        /// Accounting period (YYYYMM).
        #[arg(long)]
        period: Period,
        /// Path to the .xlsx, .xls or .csv file.
        file: PathBuf,
        /// Filename to record instead of the path's file name.
        #[arg(long)]
        filename: Option<String>,
    },
    /// Re-evaluate an upload's movements as a new iteration.
    Reprocess {
        /// Any upload of the series.
        upload: UploadId,
        /// Why the iteration is requested.
        #[arg(long)]
        reason: String,
        /// Who requests it.
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// Show an upload, its series, active incidences and history.
    Status {
        /// Upload to inspect.
        upload: UploadId,
    },
    /// Revoke a validation exception so the check applies again.
    RevokeException {
        /// Owning client.
        #[arg(long)]
        client: ClientId,
        /// Account code the exception covers.
        #[arg(long)]
        account: String,
        /// Exception kind (document_type, english_name, classification, new_account).
        #[arg(long, value_parser = parse_exception_kind)]
        kind: ExceptionKind,
    },
}

fn parse_exception_kind(raw: &str) -> Result<ExceptionKind, String> {
    ExceptionKind::parse(raw).ok_or_else(|| format!("unknown exception kind '{raw}'"))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let app = to_app_error(err);
            error!(code = app.error_code(), "{app}");
            ExitCode::from(u8::try_from(app.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(AppError::from)?;

    let db = connect_with(&config.database)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    info!("Connected to database");

    let store = Arc::new(PgLedgerStore::new(db));
    let storage = StorageConfig::from_settings(&config.storage)
        .and_then(StorageService::from_config)
        .map_err(PipelineError::from)?;
    let cache = SnapshotCache::new(
        Arc::new(MokaBackend::new(config.cache.max_capacity)),
        &config.cache,
    );
    let pipeline =
        LedgerPipeline::new(store.clone(), storage, config.pipeline)?.with_cache(cache);

    let output = commands::Output { json: cli.json };
    match cli.command {
        Commands::Ingest {
            client,
            closure,
            period,
            file,
            filename,
        } => commands::ingest(&pipeline, output, client, closure, period, &file, filename).await,
        Commands::Reprocess {
            upload,
            reason,
            actor,
        } => commands::reprocess(&pipeline, output, upload, reason, actor).await,
        Commands::Status { upload } => commands::status(&pipeline, output, upload).await,
        Commands::RevokeException {
            client,
            account,
            kind,
        } => commands::revoke_exception(&store, output, client, &account, kind).await,
    }
}

/// Maps a failure to the shared error taxonomy for its exit code.
fn to_app_error(err: anyhow::Error) -> AppError {
    match err.downcast::<AppError>() {
        Ok(app) => app,
        Err(err) => match err.downcast::<PipelineError>() {
            Ok(pipeline) => pipeline.into(),
            Err(err) => AppError::Internal(format!("{err:#}")),
        },
    }
}
