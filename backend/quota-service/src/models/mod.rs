/// Quota ledger and the read-models projected from it
pub mod aggregates;
pub mod ledger;

pub use aggregates::{
    EventGalleryStats, Projection, QueryAggregate, QueryGallery, StorageAggregate, StorageView,
    UsageAggregate, UsageView,
};
pub use ledger::{EntryKind, LedgerEntry, QuotaLedger, StorageTotals, UsageTotals};

pub const LEDGER_NOT_FOUND_MSG: &str = "Ledger not found";
pub const STORAGE_NOT_FOUND_MSG: &str = "Storage record not found";
pub const USAGE_NOT_FOUND_MSG: &str = "Usage record not found";
pub const QUERY_NOT_FOUND_MSG: &str = "User not found";
pub const EVENT_GALLERY_NOT_FOUND_MSG: &str = "Event gallery not found";
