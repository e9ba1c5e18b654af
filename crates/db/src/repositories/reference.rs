//! Reference data consumed by the pipeline: client profiles, catalogs and
//! validation exceptions. The pipeline only reads these tables; revocation
//! is the one write it supports.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::warn;

use ledgerline_core::catalog::{
    CatalogSnapshot, ClassificationCatalog, DocumentTypeCatalog, EnglishNameCatalog,
};
use ledgerline_core::ledger::ClientProfile;
use ledgerline_core::validation::{ExceptionKind, ExceptionSet, ValidationException};
use ledgerline_shared::types::ClientId;

use crate::entities::{
    classifications, clients, document_types, english_names, validation_exceptions,
};
use crate::error::RepositoryError;

/// Reference data repository.
#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    db: DatabaseConnection,
}

impl ReferenceRepository {
    /// Creates a new reference repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Loads a client profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such client exists.
    pub async fn client_profile(&self, client_id: ClientId) -> Result<ClientProfile, RepositoryError> {
        let client = clients::Entity::find_by_id(client_id.into_inner())
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::not_found("client", client_id))?;
        Ok(ClientProfile {
            id: client_id,
            tax_id: client.tax_id,
            name: client.name,
            bilingual: client.bilingual,
        })
    }

    /// Loads the document-type catalog and the client's English-name and
    /// classification catalogs.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three queries fails.
    pub async fn catalogs(&self, client_id: ClientId) -> Result<CatalogSnapshot, RepositoryError> {
        let document_types = document_types::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| (row.code, row.description));

        let english_names = english_names::Entity::find()
            .filter(english_names::Column::ClientId.eq(client_id.into_inner()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| (row.account_code, row.english_name));

        let classifications = classifications::Entity::find()
            .filter(classifications::Column::ClientId.eq(client_id.into_inner()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| (row.account_code, row.classification_set, row.option));

        Ok(CatalogSnapshot {
            document_types: DocumentTypeCatalog::new(document_types),
            english_names: EnglishNameCatalog::new(english_names),
            classifications: ClassificationCatalog::new(classifications),
        })
    }

    /// Loads the client's non-revoked exceptions. Rows with an unknown kind
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn exceptions(&self, client_id: ClientId) -> Result<ExceptionSet, RepositoryError> {
        let rows = validation_exceptions::Entity::find()
            .filter(validation_exceptions::Column::ClientId.eq(client_id.into_inner()))
            .filter(validation_exceptions::Column::RevokedAt.is_null())
            .all(&self.db)
            .await?;

        let exceptions = rows.into_iter().filter_map(|row| {
            let Some(kind) = ExceptionKind::parse(&row.kind) else {
                warn!(exception_id = %row.id, kind = %row.kind, "skipping exception with unknown kind");
                return None;
            };
            Some(ValidationException {
                client_id,
                account_code: row.account_code,
                kind,
            })
        });
        Ok(ExceptionSet::new(exceptions))
    }

    /// Revokes every active exception for (client, account, kind). Returns
    /// the number of rows revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn revoke_exception(
        &self,
        client_id: ClientId,
        account_code: &str,
        kind: ExceptionKind,
    ) -> Result<u64, RepositoryError> {
        let now: chrono::DateTime<chrono::FixedOffset> = Utc::now().into();
        let result = validation_exceptions::Entity::update_many()
            .col_expr(validation_exceptions::Column::RevokedAt, Expr::value(now))
            .filter(validation_exceptions::Column::ClientId.eq(client_id.into_inner()))
            .filter(validation_exceptions::Column::AccountCode.eq(account_code))
            .filter(validation_exceptions::Column::Kind.eq(kind.as_str()))
            .filter(validation_exceptions::Column::RevokedAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
