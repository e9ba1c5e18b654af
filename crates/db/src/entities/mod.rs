//! `SeaORM` entities, one module per table.

pub mod prelude;

pub mod accounts;
pub mod classifications;
pub mod clients;
pub mod document_types;
pub mod english_names;
pub mod incidences;
pub mod movements;
pub mod opening_balances;
pub mod reprocessing_history;
pub mod uploads;
pub mod validation_exceptions;
