/// Service layer for galleries
///
/// - Gallery service: upload and delete validators, gallery reads, counter refresh
/// - Gallery consumer: events delivered to `/videos/events`
pub mod events;
pub mod gallery;

pub use events::GalleryConsumer;
pub use gallery::{GalleryService, UploadedFile};
