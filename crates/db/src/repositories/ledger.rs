//! Ledger repository: accounts, opening balances and movements.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use ledgerline_core::ledger::{Account, Movement, OpeningBalance};
use ledgerline_core::parser::ParsedLedger;
use ledgerline_core::store::LedgerWrite;
use ledgerline_core::upload::UploadRecord;
use ledgerline_core::validation::EnrichmentOutcome;
use ledgerline_shared::types::{AccountId, ClientId, ClosureId, MovementId, UploadId};

use crate::entities::{accounts, incidences, movements, opening_balances};
use crate::error::RepositoryError;

/// Rows per multi-row INSERT.
const INSERT_CHUNK: usize = 1_000;

/// Upserts one opening balance. A row owned by another upload is kept in
/// the `previous_*` columns; re-running the same upload keeps what it
/// displaced the first time.
const UPSERT_OPENING: &str = r"
INSERT INTO opening_balances (id, closure_id, account_id, account_code, balance, upload_id)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (closure_id, account_id) DO UPDATE SET
    balance = EXCLUDED.balance,
    account_code = EXCLUDED.account_code,
    upload_id = EXCLUDED.upload_id,
    previous_upload_id = CASE WHEN opening_balances.upload_id = EXCLUDED.upload_id
        THEN opening_balances.previous_upload_id ELSE opening_balances.upload_id END,
    previous_balance = CASE WHEN opening_balances.upload_id = EXCLUDED.upload_id
        THEN opening_balances.previous_balance ELSE opening_balances.balance END";

/// Gives displaced opening balances back to their previous upload.
const RESTORE_OPENINGS: &str = r"
UPDATE opening_balances
SET upload_id = previous_upload_id,
    balance = previous_balance,
    previous_upload_id = NULL,
    previous_balance = NULL
WHERE upload_id = $1
  AND previous_upload_id IS NOT NULL
  AND previous_balance IS NOT NULL";

/// Ledger repository.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Replaces the ledger rows of an upload in one transaction.
    ///
    /// Existing movements and opening balances of the upload are deleted
    /// first, so running it twice leaves the same rows. Unknown account
    /// codes are created with `created_by_upload` set to the upload.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is written then.
    pub async fn replace(
        &self,
        upload: &UploadRecord,
        ledger: &ParsedLedger,
    ) -> Result<LedgerWrite, RepositoryError> {
        let txn = self.db.begin().await?;
        let upload_id = upload.id.into_inner();

        movements::Entity::delete_many()
            .filter(movements::Column::UploadId.eq(upload_id))
            .exec(&txn)
            .await?;
        release_openings(&txn, upload_id).await?;

        let known = ensure_accounts(&txn, upload, ledger).await?;

        let mut write = LedgerWrite {
            accounts: ledger.accounts.len(),
            ..LedgerWrite::default()
        };
        write.new_account_codes = ledger
            .accounts
            .iter()
            .filter(|a| known.get(&a.code).is_some_and(|(_, creator)| *creator == Some(upload_id)))
            .map(|a| a.code.clone())
            .collect();

        for opening in &ledger.opening_balances {
            let Some((account_id, _)) = known.get(&opening.account_code) else {
                return Err(RepositoryError::not_found("account", &opening.account_code));
            };
            txn.execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                UPSERT_OPENING,
                [
                    Uuid::now_v7().into(),
                    upload.closure_id.into_inner().into(),
                    (*account_id).into(),
                    opening.account_code.clone().into(),
                    opening.balance.into(),
                    upload_id.into(),
                ],
            ))
            .await?;
            write.opening_balances += 1;
        }

        let mut rows = Vec::with_capacity(ledger.movements.len());
        for parsed in &ledger.movements {
            let Some((account_id, _)) = known.get(&parsed.account_code) else {
                return Err(RepositoryError::not_found("account", &parsed.account_code));
            };
            rows.push(movements::ActiveModel {
                id: Set(MovementId::new().into_inner()),
                client_id: Set(upload.client_id.into_inner()),
                closure_id: Set(upload.closure_id.into_inner()),
                upload_id: Set(upload_id),
                account_id: Set(*account_id),
                account_code: Set(parsed.account_code.clone()),
                movement_date: Set(parsed.date),
                document_type: Set(parsed.document_type.clone()),
                document_type_ref: Set(None),
                document_number: Set(parsed.document_number.clone()),
                debit: Set(parsed.debit),
                credit: Set(parsed.credit),
                description: Set(parsed.description.clone()),
                cost_center: Set(parsed.cost_center.clone()),
                auxiliary: Set(parsed.auxiliary.clone()),
                internal_number: Set(parsed.internal_number.clone()),
                row_number: Set(i32::try_from(parsed.row_number).unwrap_or(i32::MAX)),
                incomplete: Set(false),
            });
        }
        write.movements = rows.len();
        while !rows.is_empty() {
            let rest = rows.split_off(rows.len().min(INSERT_CHUNK));
            movements::Entity::insert_many(rows).exec(&txn).await?;
            rows = rest;
        }

        txn.commit().await?;
        debug!(
            upload_id = %upload.id,
            movements = write.movements,
            openings = write.opening_balances,
            new_accounts = write.new_account_codes.len(),
            "ledger rows replaced"
        );
        Ok(write)
    }

    /// Deletes the movements, opening balances and incidences of an upload,
    /// and the accounts it created that nothing references any more.
    /// Opening balances the upload displaced are restored.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is deleted then.
    pub async fn discard(&self, upload_id: UploadId) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;
        let id = upload_id.into_inner();

        movements::Entity::delete_many()
            .filter(movements::Column::UploadId.eq(id))
            .exec(&txn)
            .await?;
        release_openings(&txn, id).await?;
        incidences::Entity::delete_many()
            .filter(incidences::Column::UploadId.eq(id))
            .exec(&txn)
            .await?;
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"DELETE FROM accounts a
              WHERE a.created_by_upload = $1
                AND NOT EXISTS (SELECT 1 FROM movements m WHERE m.account_id = a.id)
                AND NOT EXISTS (SELECT 1 FROM opening_balances o WHERE o.account_id = a.id)",
            [id.into()],
        ))
        .await?;

        txn.commit().await?;
        Ok(())
    }

    /// All accounts of a client, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a classification cannot be read.
    pub async fn accounts(&self, client_id: ClientId) -> Result<Vec<Account>, RepositoryError> {
        accounts::Entity::find()
            .filter(accounts::Column::ClientId.eq(client_id.into_inner()))
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_account)
            .collect()
    }

    /// Movements of an upload in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn movements(&self, upload_id: UploadId) -> Result<Vec<Movement>, RepositoryError> {
        let rows = movements::Entity::find()
            .filter(movements::Column::UploadId.eq(upload_id.into_inner()))
            .order_by_asc(movements::Column::RowNumber)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_movement).collect())
    }

    /// Opening balances of a closure, ordered by account code.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn opening_balances(
        &self,
        closure_id: ClosureId,
    ) -> Result<Vec<OpeningBalance>, RepositoryError> {
        let rows = opening_balances::Entity::find()
            .filter(opening_balances::Column::ClosureId.eq(closure_id.into_inner()))
            .order_by_asc(opening_balances::Column::AccountCode)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| OpeningBalance {
                closure_id: ClosureId::from_uuid(row.closure_id),
                account_id: AccountId::from_uuid(row.account_id),
                account_code: row.account_code,
                balance: row.balance,
            })
            .collect())
    }

    /// Writes account enrichment and movement flags in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any update fails; nothing is written then.
    pub async fn apply_enrichment(&self, outcome: &EnrichmentOutcome) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;
        apply_enrichment_in(&txn, outcome).await?;
        txn.commit().await?;
        Ok(())
    }
}

/// Drops the opening balances an upload owns, handing displaced rows back
/// to their previous upload first.
async fn release_openings(txn: &DatabaseTransaction, upload_id: Uuid) -> Result<(), RepositoryError> {
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        RESTORE_OPENINGS,
        [upload_id.into()],
    ))
    .await?;
    opening_balances::Entity::delete_many()
        .filter(opening_balances::Column::UploadId.eq(upload_id))
        .exec(txn)
        .await?;
    Ok(())
}

/// Creates every account code the ledger references that the client does
/// not have yet. Returns code -> (account id, creating upload).
async fn ensure_accounts(
    txn: &DatabaseTransaction,
    upload: &UploadRecord,
    ledger: &ParsedLedger,
) -> Result<HashMap<String, (Uuid, Option<Uuid>)>, RepositoryError> {
    let mut known: HashMap<String, (Uuid, Option<Uuid>)> = accounts::Entity::find()
        .filter(accounts::Column::ClientId.eq(upload.client_id.into_inner()))
        .all(txn)
        .await?
        .into_iter()
        .map(|row| (row.code, (row.id, row.created_by_upload)))
        .collect();

    let names: HashMap<&str, &str> = ledger
        .accounts
        .iter()
        .map(|a| (a.code.as_str(), a.name.as_str()))
        .collect();
    let referenced = ledger
        .accounts
        .iter()
        .map(|a| a.code.as_str())
        .chain(ledger.opening_balances.iter().map(|o| o.account_code.as_str()))
        .chain(ledger.movements.iter().map(|m| m.account_code.as_str()));

    let now: chrono::DateTime<chrono::FixedOffset> = Utc::now().into();
    let mut created = Vec::new();
    for code in referenced {
        if known.contains_key(code) {
            continue;
        }
        let id = AccountId::new().into_inner();
        known.insert(code.to_string(), (id, Some(upload.id.into_inner())));
        created.push(accounts::ActiveModel {
            id: Set(id),
            client_id: Set(upload.client_id.into_inner()),
            code: Set(code.to_string()),
            name: Set(names.get(code).copied().unwrap_or_default().to_string()),
            english_name: Set(None),
            classification: Set(serde_json::json!({})),
            created_by_upload: Set(Some(upload.id.into_inner())),
            created_at: Set(now),
            updated_at: Set(now),
        });
    }

    if !created.is_empty() {
        accounts::Entity::insert_many(created).exec(txn).await?;
    }
    Ok(known)
}

/// Applies account updates and movement flags. Movements are updated in
/// groups sharing the same (incomplete, document type reference).
pub(crate) async fn apply_enrichment_in(
    txn: &DatabaseTransaction,
    outcome: &EnrichmentOutcome,
) -> Result<(), RepositoryError> {
    let now: chrono::DateTime<chrono::FixedOffset> = Utc::now().into();
    for update in &outcome.account_updates {
        let mut query = accounts::Entity::update_many()
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(update.account_id.into_inner()));
        if let Some(name) = &update.english_name {
            query = query.col_expr(accounts::Column::EnglishName, Expr::value(name.clone()));
        }
        if let Some(classification) = &update.classification {
            query = query.col_expr(
                accounts::Column::Classification,
                Expr::value(serde_json::to_value(classification)?),
            );
        }
        query.exec(txn).await?;
    }

    let mut groups: BTreeMap<(bool, Option<&str>), Vec<Uuid>> = BTreeMap::new();
    for movement in &outcome.movements {
        groups
            .entry((movement.incomplete, movement.document_type_ref.as_deref()))
            .or_default()
            .push(movement.movement_id.into_inner());
    }
    for ((incomplete, document_type_ref), ids) in groups {
        for chunk in ids.chunks(INSERT_CHUNK) {
            movements::Entity::update_many()
                .col_expr(movements::Column::Incomplete, Expr::value(incomplete))
                .col_expr(
                    movements::Column::DocumentTypeRef,
                    Expr::value(document_type_ref.map(str::to_string)),
                )
                .filter(movements::Column::Id.is_in(chunk.iter().copied()))
                .exec(txn)
                .await?;
        }
    }
    Ok(())
}

fn to_account(row: accounts::Model) -> Result<Account, RepositoryError> {
    let classification: BTreeMap<String, String> = serde_json::from_value(row.classification)?;
    Ok(Account {
        id: AccountId::from_uuid(row.id),
        client_id: ClientId::from_uuid(row.client_id),
        code: row.code,
        name: row.name,
        english_name: row.english_name,
        classification,
        created_by_upload: row.created_by_upload.map(UploadId::from_uuid),
    })
}

fn to_movement(row: movements::Model) -> Movement {
    Movement {
        id: MovementId::from_uuid(row.id),
        client_id: ClientId::from_uuid(row.client_id),
        closure_id: ClosureId::from_uuid(row.closure_id),
        upload_id: UploadId::from_uuid(row.upload_id),
        account_id: AccountId::from_uuid(row.account_id),
        account_code: row.account_code,
        date: row.movement_date,
        document_type: row.document_type,
        document_type_ref: row.document_type_ref,
        document_number: row.document_number,
        debit: row.debit,
        credit: row.credit,
        description: row.description,
        cost_center: row.cost_center,
        auxiliary: row.auxiliary,
        internal_number: row.internal_number,
        row_number: u32::try_from(row.row_number).unwrap_or_default(),
        incomplete: row.incomplete,
    }
}
