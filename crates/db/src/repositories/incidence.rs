//! Incidence repository: consolidated incidences and reprocessing history.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};

use ledgerline_core::incidence::{ConsolidatedIncidence, IncidenceKind, Severity};
use ledgerline_core::iteration::ReprocessingHistoryEntry;
use ledgerline_shared::types::{ClientId, ClosureId, HistoryEntryId, IncidenceId, UploadId};

use crate::entities::{incidences, reprocessing_history};
use crate::error::RepositoryError;

/// Incidence and history repository.
#[derive(Debug, Clone)]
pub struct IncidenceRepository {
    db: DatabaseConnection,
}

impl IncidenceRepository {
    /// Creates a new incidence repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Active incidences of an upload, most severe first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be mapped.
    pub async fn active(&self, upload_id: UploadId) -> Result<Vec<ConsolidatedIncidence>, RepositoryError> {
        incidences::Entity::find()
            .filter(incidences::Column::UploadId.eq(upload_id.into_inner()))
            .filter(incidences::Column::Active.eq(true))
            .order_by_desc(incidences::Column::AffectedCount)
            .order_by_asc(incidences::Column::Kind)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_incidence)
            .collect()
    }

    /// Replaces the incidences of an upload in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is written then.
    pub async fn replace(
        &self,
        upload_id: UploadId,
        incidences: &[ConsolidatedIncidence],
    ) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;
        replace_in(&txn, upload_id, incidences).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Reprocessing history of a series, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be mapped.
    pub async fn history(
        &self,
        client_id: ClientId,
        closure_id: ClosureId,
    ) -> Result<Vec<ReprocessingHistoryEntry>, RepositoryError> {
        reprocessing_history::Entity::find()
            .filter(reprocessing_history::Column::ClientId.eq(client_id.into_inner()))
            .filter(reprocessing_history::Column::ClosureId.eq(closure_id.into_inner()))
            .order_by_asc(reprocessing_history::Column::Iteration)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_history)
            .collect()
    }
}

pub(crate) async fn replace_in(
    txn: &DatabaseTransaction,
    upload_id: UploadId,
    rows: &[ConsolidatedIncidence],
) -> Result<(), RepositoryError> {
    incidences::Entity::delete_many()
        .filter(incidences::Column::UploadId.eq(upload_id.into_inner()))
        .exec(txn)
        .await?;
    if rows.is_empty() {
        return Ok(());
    }
    let models = rows
        .iter()
        .map(to_active)
        .collect::<Result<Vec<_>, _>>()?;
    incidences::Entity::insert_many(models).exec(txn).await?;
    Ok(())
}

/// Marks every incidence of an upload inactive.
pub(crate) async fn obsolete_in(
    txn: &DatabaseTransaction,
    upload_id: UploadId,
) -> Result<u64, RepositoryError> {
    let result = incidences::Entity::update_many()
        .col_expr(incidences::Column::Active, Expr::value(false))
        .filter(incidences::Column::UploadId.eq(upload_id.into_inner()))
        .filter(incidences::Column::Active.eq(true))
        .exec(txn)
        .await?;
    Ok(result.rows_affected)
}

pub(crate) async fn append_history_in(
    txn: &DatabaseTransaction,
    client_id: ClientId,
    closure_id: ClosureId,
    entry: &ReprocessingHistoryEntry,
) -> Result<(), RepositoryError> {
    let count = |n: usize| i32::try_from(n).unwrap_or(i32::MAX);
    let row = reprocessing_history::ActiveModel {
        id: Set(entry.id.into_inner()),
        client_id: Set(client_id.into_inner()),
        closure_id: Set(closure_id.into_inner()),
        upload_id: Set(entry.upload_id.into_inner()),
        previous_upload_id: Set(entry.previous_upload_id.into_inner()),
        iteration: Set(i32::try_from(entry.iteration).unwrap_or(i32::MAX)),
        previous_incidences: Set(count(entry.previous_incidences)),
        current_incidences: Set(count(entry.current_incidences)),
        new_incidences: Set(count(entry.new_incidences)),
        resolved_incidences: Set(count(entry.resolved_incidences)),
        worsened_incidences: Set(count(entry.worsened_incidences)),
        movements_corrected: Set(count(entry.movements_corrected)),
        duration_ms: Set(i64::try_from(entry.duration_ms).unwrap_or(i64::MAX)),
        reason: Set(entry.reason.clone()),
        actor: Set(entry.actor.clone()),
        diff: Set(serde_json::to_value(&entry.diff)?),
        created_at: Set(entry.created_at.into()),
    };
    reprocessing_history::Entity::insert(row).exec(txn).await?;
    Ok(())
}

fn to_active(incidence: &ConsolidatedIncidence) -> Result<incidences::ActiveModel, RepositoryError> {
    Ok(incidences::ActiveModel {
        id: Set(incidence.id.into_inner()),
        upload_id: Set(incidence.upload_id.into_inner()),
        kind: Set(incidence.kind.as_str().to_string()),
        sub_code: Set(incidence.sub_code.clone()),
        affected_count: Set(i32::try_from(incidence.affected_count).unwrap_or(i32::MAX)),
        severity: Set(incidence.severity.as_str().to_string()),
        sample: Set(serde_json::to_value(&incidence.sample)?),
        statistics: Set(serde_json::to_value(&incidence.statistics)?),
        active: Set(incidence.active),
        created_at: Set(incidence.created_at.into()),
    })
}

fn to_incidence(row: incidences::Model) -> Result<ConsolidatedIncidence, RepositoryError> {
    Ok(ConsolidatedIncidence {
        id: IncidenceId::from_uuid(row.id),
        upload_id: UploadId::from_uuid(row.upload_id),
        kind: IncidenceKind::parse(&row.kind).ok_or_else(|| RepositoryError::invalid("kind", &row.kind))?,
        sub_code: row.sub_code,
        affected_count: usize::try_from(row.affected_count)
            .map_err(|_| RepositoryError::invalid("affected_count", row.affected_count))?,
        severity: Severity::parse(&row.severity)
            .ok_or_else(|| RepositoryError::invalid("severity", &row.severity))?,
        sample: serde_json::from_value(row.sample)?,
        statistics: serde_json::from_value(row.statistics)?,
        active: row.active,
        created_at: row.created_at.with_timezone(&Utc),
    })
}

fn to_history(row: reprocessing_history::Model) -> Result<ReprocessingHistoryEntry, RepositoryError> {
    let count = |n: i32| usize::try_from(n).unwrap_or_default();
    Ok(ReprocessingHistoryEntry {
        id: HistoryEntryId::from_uuid(row.id),
        upload_id: UploadId::from_uuid(row.upload_id),
        previous_upload_id: UploadId::from_uuid(row.previous_upload_id),
        iteration: u32::try_from(row.iteration)
            .map_err(|_| RepositoryError::invalid("iteration", row.iteration))?,
        previous_incidences: count(row.previous_incidences),
        current_incidences: count(row.current_incidences),
        new_incidences: count(row.new_incidences),
        resolved_incidences: count(row.resolved_incidences),
        worsened_incidences: count(row.worsened_incidences),
        movements_corrected: count(row.movements_corrected),
        duration_ms: u64::try_from(row.duration_ms).unwrap_or_default(),
        reason: row.reason,
        actor: row.actor,
        diff: serde_json::from_value(row.diff)?,
        created_at: row.created_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_core::incidence::IncidenceStatistics;
    use rust_decimal_macros::dec;

    fn incidence() -> ConsolidatedIncidence {
        ConsolidatedIncidence {
            id: IncidenceId::new(),
            upload_id: UploadId::new(),
            kind: IncidenceKind::UnrecognizedDocumentType,
            sub_code: Some("99".to_string()),
            affected_count: 12,
            severity: Severity::from_count(12),
            sample: Vec::new(),
            statistics: IncidenceStatistics {
                total_affected: 12,
                total_amount: dec!(1500.25),
                distinct_accounts: 3,
            },
            active: true,
            created_at: Utc::now(),
        }
    }

    fn model_of(active: incidences::ActiveModel) -> incidences::Model {
        incidences::Model {
            id: active.id.unwrap(),
            upload_id: active.upload_id.unwrap(),
            kind: active.kind.unwrap(),
            sub_code: active.sub_code.unwrap(),
            affected_count: active.affected_count.unwrap(),
            severity: active.severity.unwrap(),
            sample: active.sample.unwrap(),
            statistics: active.statistics.unwrap(),
            active: active.active.unwrap(),
            created_at: active.created_at.unwrap(),
        }
    }

    #[test]
    fn test_incidence_row_mapping_preserves_statistics() {
        let original = incidence();
        let back = to_incidence(model_of(to_active(&original).unwrap())).unwrap();
        assert_eq!(back, original);
        assert_eq!(back.severity, Severity::Medium);
    }

    #[test]
    fn test_unknown_kind_is_invalid() {
        let mut row = model_of(to_active(&incidence()).unwrap());
        row.kind = "duplicate_movement".to_string();
        assert!(matches!(
            to_incidence(row),
            Err(RepositoryError::InvalidData { field: "kind", .. })
        ));
    }
}
