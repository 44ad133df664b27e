pub mod history;
pub mod record;
pub mod tracker;

pub use history::{CollectionHistory, DEFAULT_CAPACITY};
pub use record::{CollectionId, CollectionKind, CollectionReason, CollectionRecord};
pub use tracker::CollectionTracker;
