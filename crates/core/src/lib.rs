//! Core pipeline logic for Ledgerline.
//!
//! This crate turns uploaded general-ledger workbooks into accounts, opening
//! balances and movements, flags data-quality incidences and keeps an
//! iteration history per (client, closure). It has ZERO database
//! dependencies: persistence goes through the [`store::LedgerStore`] trait.
//!
//! # Modules
//!
//! - `intake` - Filename convention and content checks
//! - `reader` - CSV/XLSX/XLS reading and header detection
//! - `parser` - Row-by-row ledger parsing
//! - `ledger` - Clients, accounts, opening balances, movements, balances
//! - `catalog` - Document types, English names and classifications
//! - `validation` - Movement enrichment and validation exceptions
//! - `incidence` - Incidence detection and consolidation
//! - `upload` - Upload records and their state machine
//! - `iteration` - Reprocessing requests, diffs and history
//! - `pipeline` - Stage orchestration for ingestion and reprocessing
//! - `storage` - Object storage for uploaded files
//! - `store` - Persistence seam and in-memory store
//! - `cache` - Financial snapshot cache with retention
//! - `locks` - Keyed async leases

pub mod cache;
pub mod catalog;
pub mod incidence;
pub mod intake;
pub mod iteration;
pub mod ledger;
pub mod locks;
pub mod parser;
pub mod pipeline;
pub mod reader;
pub mod storage;
pub mod store;
pub mod upload;
pub mod validation;

#[cfg(test)]
mod fixtures;
