use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::listing::Listing;

/// Destination for listings written by an update event or a snapshot.
pub const LISTING_UPDATED: &str = "bptf-listing.updated";
/// Destination for listings written by a delete event.
pub const LISTING_DELETED: &str = "bptf-listing.deleted";
/// Destination for snapshot completion notices.
pub const SNAPSHOT_HANDLED: &str = "bptf-snapshot.handled";

/// Summary published after a snapshot has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotHandled {
    pub sku: String,
    pub created_at: DateTime<Utc>,
    /// Number of listings the snapshot actually changed.
    pub written: usize,
}

/// Normalized change notification emitted downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ListingUpdated(Listing),
    ListingDeleted(Listing),
    SnapshotHandled(SnapshotHandled),
}

impl Notification {
    /// Notification for a freshly written listing row.
    pub fn for_listing(listing: Listing) -> Self {
        if listing.is_deleted {
            Self::ListingDeleted(listing)
        } else {
            Self::ListingUpdated(listing)
        }
    }

    pub fn destination(&self) -> &'static str {
        match self {
            Self::ListingUpdated(_) => LISTING_UPDATED,
            Self::ListingDeleted(_) => LISTING_DELETED,
            Self::SnapshotHandled(_) => SNAPSHOT_HANDLED,
        }
    }

    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::ListingUpdated(listing) | Self::ListingDeleted(listing) => {
                serde_json::to_value(listing)
            }
            Self::SnapshotHandled(handled) => serde_json::to_value(handled),
        }
    }
}
