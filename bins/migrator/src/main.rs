//! Database migration runner for the ledger store.
//!
//! Usage:
//!   migrator up      - Apply the ledger schema
//!   migrator down    - Drop the ledger schema
//!   migrator status  - Show which migrations are applied
//!   migrator fresh   - Drop everything and apply again
//!
//! Reads `DATABASE_URL` from the environment or `.env`.

use ledgerline_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    cli::run_cli(Migrator).await;
}
