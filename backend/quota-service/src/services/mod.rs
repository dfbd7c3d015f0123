/// Business logic layer for quota-service
pub mod consumers;
pub mod ledger;
pub mod queries;

pub use consumers::QuotaConsumers;
pub use ledger::LedgerService;
pub use queries::{EventGalleryService, QueryService};
