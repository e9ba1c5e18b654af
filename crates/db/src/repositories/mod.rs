//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod incidence;
pub mod ledger;
pub mod reference;
pub mod upload;

pub use incidence::IncidenceRepository;
pub use ledger::LedgerRepository;
pub use reference::ReferenceRepository;
pub use upload::UploadRepository;
