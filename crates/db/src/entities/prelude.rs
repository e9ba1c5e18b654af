//! Entity re-exports.

pub use super::accounts::Entity as Accounts;
pub use super::classifications::Entity as Classifications;
pub use super::clients::Entity as Clients;
pub use super::document_types::Entity as DocumentTypes;
pub use super::english_names::Entity as EnglishNames;
pub use super::incidences::Entity as Incidences;
pub use super::movements::Entity as Movements;
pub use super::opening_balances::Entity as OpeningBalances;
pub use super::reprocessing_history::Entity as ReprocessingHistory;
pub use super::uploads::Entity as Uploads;
pub use super::validation_exceptions::Entity as ValidationExceptions;
