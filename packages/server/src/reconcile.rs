//! Last-write-wins decision shared by every listing store.

use chrono::{DateTime, Utc};
use common::Listing;

/// Ordering fields of a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl From<&Listing> for Stamp {
    fn from(listing: &Listing) -> Self {
        Self {
            first_seen_at: listing.first_seen_at,
            last_seen_at: listing.last_seen_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The stored row is as new as the candidate or newer.
    Stale,
    /// Write the listing. `first_seen_at` already carries the stored value.
    Write(Listing),
}

/// Decide whether `candidate` may replace the row currently stored under its id.
pub fn resolve(existing: Option<Stamp>, mut candidate: Listing) -> Resolution {
    match existing {
        None => Resolution::Write(candidate),
        Some(stamp) if stamp.last_seen_at >= candidate.last_seen_at => Resolution::Stale,
        Some(stamp) => {
            candidate.first_seen_at = stamp.first_seen_at;
            Resolution::Write(candidate)
        }
    }
}
