use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::listing::MarketplaceListing;

/// Exchange single-listing change notifications are published on.
pub const EVENT_EXCHANGE: &str = "bptf-event.created";

/// Exchange and routing key of per-SKU snapshots.
pub const SNAPSHOT_EXCHANGE: &str = "bptf-snapshot.created";
pub const SNAPSHOT_ROUTING_KEY: &str = "snapshot";

/// Routing keys of single-listing change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "listing-update")]
    ListingUpdate,
    #[serde(rename = "listing-delete")]
    ListingDelete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListingUpdate => "listing-update",
            Self::ListingDelete => "listing-delete",
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::ListingDelete)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single listing change notification from the marketplace feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingEvent {
    /// Opaque, monotonically increasing event id (12-byte object id, hex).
    pub id: String,
    pub event: EventKind,
    pub payload: MarketplaceListing,
}

impl ListingEvent {
    /// Time the event was created upstream.
    pub fn event_time(&self) -> Result<DateTime<Utc>, EventIdError> {
        event_time(&self.id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventIdError {
    #[error("event id must be 24 hex characters, got {0} characters")]
    Length(usize),
    #[error("event id is not hex: {0}")]
    NotHex(String),
    #[error("event id timestamp {0} is out of range")]
    Timestamp(u32),
}

/// Extract the creation time embedded in an object id.
///
/// The first four bytes hold the creation time in seconds since the Unix
/// epoch, big-endian.
pub fn event_time(id: &str) -> Result<DateTime<Utc>, EventIdError> {
    if id.len() != 24 {
        return Err(EventIdError::Length(id.len()));
    }
    let bytes = hex::decode(id).map_err(|e| EventIdError::NotHex(e.to_string()))?;
    let seconds = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    DateTime::from_timestamp(i64::from(seconds), 0).ok_or(EventIdError::Timestamp(seconds))
}
