//! Initial schema: clients, reference catalogs, uploads, ledger rows,
//! incidences and reprocessing history.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(SCHEMA_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r"
-- ============================================================
-- CLIENTS & REFERENCE CATALOGS (read-only to the pipeline)
-- ============================================================
CREATE TABLE clients (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tax_id VARCHAR(20) NOT NULL UNIQUE,
    name VARCHAR(255) NOT NULL,
    bilingual BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE document_types (
    code VARCHAR(20) PRIMARY KEY,
    description VARCHAR(255) NOT NULL
);

CREATE TABLE english_names (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    account_code VARCHAR(50) NOT NULL,
    english_name VARCHAR(255) NOT NULL,
    CONSTRAINT uq_english_names UNIQUE (client_id, account_code)
);

CREATE TABLE classifications (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    account_code VARCHAR(50) NOT NULL,
    classification_set VARCHAR(100) NOT NULL,
    option VARCHAR(255) NOT NULL,
    CONSTRAINT uq_classifications UNIQUE (client_id, account_code, classification_set)
);

CREATE TABLE validation_exceptions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    account_code VARCHAR(50) NOT NULL,
    kind VARCHAR(30) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    revoked_at TIMESTAMPTZ,
    CONSTRAINT chk_exception_kind CHECK (
        kind IN ('document_type', 'english_name', 'classification', 'new_account')
    )
);

CREATE INDEX idx_validation_exceptions_active
    ON validation_exceptions(client_id) WHERE revoked_at IS NULL;

-- ============================================================
-- UPLOADS (one row per iteration of a client closure)
-- ============================================================
CREATE TABLE uploads (
    id UUID PRIMARY KEY,
    client_id UUID NOT NULL REFERENCES clients(id),
    closure_id UUID NOT NULL,
    period CHAR(6) NOT NULL,
    original_filename VARCHAR(255) NOT NULL,
    storage_path VARCHAR(1024) NOT NULL,
    content_hash CHAR(64) NOT NULL,
    state VARCHAR(20) NOT NULL,
    error TEXT,
    summary JSONB,
    iteration INTEGER NOT NULL,
    is_principal BOOLEAN NOT NULL DEFAULT false,
    source_upload_id UUID NOT NULL,
    reprocess_reason TEXT,
    reprocessed_by VARCHAR(255),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_upload_state CHECK (
        state IN ('received', 'processing', 'reprocessing', 'completed', 'error')
    ),
    CONSTRAINT chk_upload_iteration CHECK (iteration >= 1),
    CONSTRAINT chk_upload_period CHECK (period ~ '^[0-9]{4}(0[1-9]|1[0-2])$'),
    CONSTRAINT uq_upload_iteration UNIQUE (client_id, closure_id, iteration)
);

-- At most one principal iteration per series
CREATE UNIQUE INDEX uq_upload_principal
    ON uploads(client_id, closure_id) WHERE is_principal;

CREATE INDEX idx_uploads_client_period ON uploads(client_id, period DESC);

-- ============================================================
-- LEDGER ROWS
-- ============================================================
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    client_id UUID NOT NULL REFERENCES clients(id),
    code VARCHAR(50) NOT NULL,
    name VARCHAR(255) NOT NULL DEFAULT '',
    english_name VARCHAR(255),
    classification JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_by_upload UUID REFERENCES uploads(id) ON DELETE SET NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_account_code UNIQUE (client_id, code)
);

CREATE TABLE opening_balances (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    closure_id UUID NOT NULL,
    account_id UUID NOT NULL REFERENCES accounts(id),
    account_code VARCHAR(50) NOT NULL,
    balance NUMERIC(19, 4) NOT NULL,
    upload_id UUID NOT NULL REFERENCES uploads(id) ON DELETE CASCADE,
    previous_upload_id UUID REFERENCES uploads(id) ON DELETE SET NULL,
    previous_balance NUMERIC(19, 4),
    CONSTRAINT uq_opening_balance UNIQUE (closure_id, account_id)
);

CREATE TABLE movements (
    id UUID PRIMARY KEY,
    client_id UUID NOT NULL REFERENCES clients(id),
    closure_id UUID NOT NULL,
    upload_id UUID NOT NULL REFERENCES uploads(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id),
    account_code VARCHAR(50) NOT NULL,
    movement_date DATE NOT NULL,
    document_type VARCHAR(20),
    document_type_ref VARCHAR(20),
    document_number VARCHAR(50),
    debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    description TEXT,
    cost_center VARCHAR(100),
    auxiliary VARCHAR(255),
    internal_number VARCHAR(50),
    row_number INTEGER NOT NULL,
    incomplete BOOLEAN NOT NULL DEFAULT false
);

CREATE INDEX idx_movements_upload ON movements(upload_id, row_number);
CREATE INDEX idx_movements_account ON movements(account_id);
CREATE INDEX idx_movements_incomplete ON movements(upload_id) WHERE incomplete;

-- ============================================================
-- INCIDENCES & HISTORY
-- ============================================================
CREATE TABLE incidences (
    id UUID PRIMARY KEY,
    upload_id UUID NOT NULL REFERENCES uploads(id) ON DELETE CASCADE,
    kind VARCHAR(50) NOT NULL,
    sub_code VARCHAR(50),
    affected_count INTEGER NOT NULL,
    severity VARCHAR(10) NOT NULL,
    sample JSONB NOT NULL DEFAULT '[]'::jsonb,
    statistics JSONB NOT NULL DEFAULT '{}'::jsonb,
    active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_incidence_severity CHECK (severity IN ('low', 'medium', 'high', 'critical')),
    CONSTRAINT chk_incidence_count CHECK (affected_count > 0)
);

CREATE INDEX idx_incidences_active ON incidences(upload_id) WHERE active;

CREATE TABLE reprocessing_history (
    id UUID PRIMARY KEY,
    client_id UUID NOT NULL REFERENCES clients(id),
    closure_id UUID NOT NULL,
    upload_id UUID NOT NULL REFERENCES uploads(id),
    previous_upload_id UUID NOT NULL REFERENCES uploads(id),
    iteration INTEGER NOT NULL,
    previous_incidences INTEGER NOT NULL,
    current_incidences INTEGER NOT NULL,
    new_incidences INTEGER NOT NULL,
    resolved_incidences INTEGER NOT NULL,
    worsened_incidences INTEGER NOT NULL,
    movements_corrected INTEGER NOT NULL,
    duration_ms BIGINT NOT NULL,
    reason TEXT NOT NULL,
    actor VARCHAR(255) NOT NULL,
    diff JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_reprocessing_history_series
    ON reprocessing_history(client_id, closure_id, iteration);

-- History is append-only
CREATE OR REPLACE FUNCTION prevent_history_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'reprocessing_history is append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_reprocessing_history_immutable
    BEFORE UPDATE OR DELETE ON reprocessing_history
    FOR EACH ROW EXECUTE FUNCTION prevent_history_mutation();
";

const DROP_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_reprocessing_history_immutable ON reprocessing_history;
DROP FUNCTION IF EXISTS prevent_history_mutation();
DROP TABLE IF EXISTS reprocessing_history CASCADE;
DROP TABLE IF EXISTS incidences CASCADE;
DROP TABLE IF EXISTS movements CASCADE;
DROP TABLE IF EXISTS opening_balances CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP TABLE IF EXISTS uploads CASCADE;
DROP TABLE IF EXISTS validation_exceptions CASCADE;
DROP TABLE IF EXISTS classifications CASCADE;
DROP TABLE IF EXISTS english_names CASCADE;
DROP TABLE IF EXISTS document_types CASCADE;
DROP TABLE IF EXISTS clients CASCADE;
";
