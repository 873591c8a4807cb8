pub mod backoff;
pub mod config;
pub mod event;
pub mod item;
pub mod listing;
pub mod notification;
pub mod sku;
pub mod snapshot;

pub use backoff::Backoff;
pub use config::{FanoutBinding, MqAppConfig};
pub use event::{EventKind, ListingEvent};
pub use listing::{Listing, ListingIntent, MarketplaceListing, NormalizeError, Normalized, SkipReason};
pub use notification::{Notification, SnapshotHandled};
pub use snapshot::{Snapshot, SnapshotListing};
