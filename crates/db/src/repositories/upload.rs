//! Upload repository: upload records, iteration allocation and the
//! principal flag.
//!
//! Every write that touches the iteration numbers or the principal flag of a
//! series first takes a transaction-scoped advisory lock on the series, so
//! concurrent workers serialize the same way in-process callers do.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use tracing::debug;

use ledgerline_core::upload::{ProcessingSummary, UploadRecord, UploadState};
use ledgerline_shared::types::{ClientId, ClosureId, Period, UploadId};

use crate::entities::uploads;
use crate::error::RepositoryError;

/// Upload repository.
#[derive(Debug, Clone)]
pub struct UploadRepository {
    db: DatabaseConnection,
}

impl UploadRepository {
    /// Creates a new upload repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an upload. A principal upload demotes the rest of its series.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (e.g. a duplicate iteration).
    pub async fn create(&self, upload: &UploadRecord) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;
        lock_series(&txn, upload.client_id, upload.closure_id).await?;
        if upload.is_principal {
            demote_series(&txn, upload.client_id, upload.closure_id).await?;
        }
        to_active(upload)?.insert(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Loads an upload by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such upload exists.
    pub async fn get(&self, upload_id: UploadId) -> Result<UploadRecord, RepositoryError> {
        let model = uploads::Entity::find_by_id(upload_id.into_inner())
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::not_found("upload", upload_id))?;
        to_record(model)
    }

    /// Persists the run status of an upload: state, error text, summary and
    /// update time.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such upload exists.
    pub async fn update_status(&self, upload: &UploadRecord) -> Result<(), RepositoryError> {
        update_status_in(&self.db, upload).await
    }

    /// Every iteration of a series, ordered by iteration.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be mapped.
    pub async fn series(
        &self,
        client_id: ClientId,
        closure_id: ClosureId,
    ) -> Result<Vec<UploadRecord>, RepositoryError> {
        uploads::Entity::find()
            .filter(uploads::Column::ClientId.eq(client_id.into_inner()))
            .filter(uploads::Column::ClosureId.eq(closure_id.into_inner()))
            .order_by_asc(uploads::Column::Iteration)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_record)
            .collect()
    }

    /// Allocates the next iteration of `previous`'s series and inserts it in
    /// state `reprocessing`.
    ///
    /// # Errors
    ///
    /// Returns an error if the series is empty or the insert fails.
    pub async fn begin_iteration(
        &self,
        previous: &UploadRecord,
        reason: &str,
        actor: &str,
    ) -> Result<UploadRecord, RepositoryError> {
        let txn = self.db.begin().await?;
        lock_series(&txn, previous.client_id, previous.closure_id).await?;

        let latest: Option<i32> = uploads::Entity::find()
            .select_only()
            .column_as(uploads::Column::Iteration.max(), "latest")
            .filter(uploads::Column::ClientId.eq(previous.client_id.into_inner()))
            .filter(uploads::Column::ClosureId.eq(previous.closure_id.into_inner()))
            .into_tuple::<Option<i32>>()
            .one(&txn)
            .await?
            .flatten();
        let latest = latest.ok_or_else(|| RepositoryError::not_found("upload", previous.id))?;
        let next = u32::try_from(latest)
            .map_err(|_| RepositoryError::invalid("iteration", latest))?
            + 1;

        let record = UploadRecord::next_iteration(previous, next, reason, actor);
        to_active(&record)?.insert(&txn).await?;
        txn.commit().await?;

        debug!(upload_id = %record.id, iteration = next, "iteration allocated");
        Ok(record)
    }

    /// Makes an upload the only principal iteration of its series.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such upload exists.
    pub async fn promote(&self, upload_id: UploadId) -> Result<(), RepositoryError> {
        let upload = self.get(upload_id).await?;
        let txn = self.db.begin().await?;
        lock_series(&txn, upload.client_id, upload.closure_id).await?;
        promote_in(&txn, &upload).await?;
        txn.commit().await?;
        Ok(())
    }
}

/// Serializes writers of one (client, closure) series until the transaction ends.
pub(crate) async fn lock_series(
    txn: &DatabaseTransaction,
    client_id: ClientId,
    closure_id: ClosureId,
) -> Result<(), RepositoryError> {
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))",
        [format!("ledgerline:series:{client_id}:{closure_id}").into()],
    ))
    .await?;
    Ok(())
}

async fn demote_series(
    txn: &DatabaseTransaction,
    client_id: ClientId,
    closure_id: ClosureId,
) -> Result<(), RepositoryError> {
    uploads::Entity::update_many()
        .col_expr(uploads::Column::IsPrincipal, Expr::value(false))
        .filter(uploads::Column::ClientId.eq(client_id.into_inner()))
        .filter(uploads::Column::ClosureId.eq(closure_id.into_inner()))
        .filter(uploads::Column::IsPrincipal.eq(true))
        .exec(txn)
        .await?;
    Ok(())
}

/// Demotes the series, then promotes `upload`. Caller holds the series lock.
pub(crate) async fn promote_in(
    txn: &DatabaseTransaction,
    upload: &UploadRecord,
) -> Result<(), RepositoryError> {
    demote_series(txn, upload.client_id, upload.closure_id).await?;
    uploads::Entity::update_many()
        .col_expr(uploads::Column::IsPrincipal, Expr::value(true))
        .filter(uploads::Column::Id.eq(upload.id.into_inner()))
        .exec(txn)
        .await?;
    Ok(())
}

pub(crate) async fn update_status_in<C: ConnectionTrait>(
    conn: &C,
    upload: &UploadRecord,
) -> Result<(), RepositoryError> {
    let summary = upload
        .summary
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;
    let result = uploads::Entity::update_many()
        .col_expr(uploads::Column::State, Expr::value(upload.state.as_str()))
        .col_expr(uploads::Column::Error, Expr::value(upload.error.clone()))
        .col_expr(uploads::Column::Summary, Expr::value(summary))
        .col_expr(
            uploads::Column::UpdatedAt,
            Expr::value(chrono::DateTime::<chrono::FixedOffset>::from(upload.updated_at)),
        )
        .filter(uploads::Column::Id.eq(upload.id.into_inner()))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(RepositoryError::not_found("upload", upload.id));
    }
    Ok(())
}

fn to_active(upload: &UploadRecord) -> Result<uploads::ActiveModel, RepositoryError> {
    let summary = upload
        .summary
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;
    let iteration = i32::try_from(upload.iteration)
        .map_err(|_| RepositoryError::invalid("iteration", upload.iteration))?;
    Ok(uploads::ActiveModel {
        id: Set(upload.id.into_inner()),
        client_id: Set(upload.client_id.into_inner()),
        closure_id: Set(upload.closure_id.into_inner()),
        period: Set(upload.period.to_string()),
        original_filename: Set(upload.original_filename.clone()),
        storage_path: Set(upload.storage_path.clone()),
        content_hash: Set(upload.content_hash.clone()),
        state: Set(upload.state.as_str().to_string()),
        error: Set(upload.error.clone()),
        summary: Set(summary),
        iteration: Set(iteration),
        is_principal: Set(upload.is_principal),
        source_upload_id: Set(upload.source_upload_id.into_inner()),
        reprocess_reason: Set(upload.reprocess_reason.clone()),
        reprocessed_by: Set(upload.reprocessed_by.clone()),
        created_at: Set(upload.created_at.into()),
        updated_at: Set(upload.updated_at.into()),
    })
}

pub(crate) fn to_record(model: uploads::Model) -> Result<UploadRecord, RepositoryError> {
    let period: Period = model
        .period
        .parse()
        .map_err(|_| RepositoryError::invalid("period", &model.period))?;
    let state = UploadState::parse(&model.state)
        .ok_or_else(|| RepositoryError::invalid("state", &model.state))?;
    let summary: Option<ProcessingSummary> =
        model.summary.map(serde_json::from_value).transpose()?;
    let iteration = u32::try_from(model.iteration)
        .map_err(|_| RepositoryError::invalid("iteration", model.iteration))?;

    Ok(UploadRecord {
        id: UploadId::from_uuid(model.id),
        client_id: ClientId::from_uuid(model.client_id),
        closure_id: ClosureId::from_uuid(model.closure_id),
        period,
        original_filename: model.original_filename,
        storage_path: model.storage_path,
        content_hash: model.content_hash,
        state,
        error: model.error,
        summary,
        iteration,
        is_principal: model.is_principal,
        source_upload_id: UploadId::from_uuid(model.source_upload_id),
        reprocess_reason: model.reprocess_reason,
        reprocessed_by: model.reprocessed_by,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
