//! Authoritative current-state table of listings.

mod memory;
mod postgres;

pub use memory::MemoryListingStore;
pub use postgres::PgListingStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Listing, ListingIntent};
use sea_orm::DbErr;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Stored listing {id} is invalid: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Listing {0} missing after write")]
    Vanished(String),
}

/// Result of offering a candidate to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// The row as stored after the write, with its true `first_seen_at`.
    Written(Listing),
    /// The stored row is as new or newer. Nothing was written.
    Stale,
}

/// Identifies one snapshot of one SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMarker {
    pub sku: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// A snapshot at least as new was already applied.
    Stale { current: DateTime<Utc> },
    /// Rows that won their per-listing comparison, ordered by listing id.
    Applied { written: Vec<Listing> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, utoipa::ToSchema)]
pub enum SortOrder {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[default]
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, utoipa::ToSchema)]
pub enum ListingOrderBy {
    #[default]
    #[serde(rename = "lastSeenAt")]
    LastSeenAt,
    #[serde(rename = "lastCheckedAt")]
    LastCheckedAt,
}

/// Filter, ordering and page of a listing read.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub sku: Option<String>,
    pub intent: Option<ListingIntent>,
    pub deleted: Option<bool>,
    pub order: SortOrder,
    pub order_by: ListingOrderBy,
    /// 1-based.
    pub page: u64,
    pub limit: u64,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            sku: None,
            intent: None,
            deleted: None,
            order: SortOrder::default(),
            order_by: ListingOrderBy::default(),
            page: 1,
            limit: 100,
        }
    }
}

impl ListingQuery {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// Storage of listings and snapshot markers.
///
/// Every write goes through the last-write-wins comparison on `last_seen_at`:
/// a candidate never replaces a row that is as new or newer.
/// Reads never return the comment.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn upsert(&self, candidate: Listing) -> Result<UpsertOutcome, StoreError>;

    /// Apply a whole snapshot atomically, unless one at least as new was
    /// already applied for the same SKU.
    async fn apply_snapshot(
        &self,
        marker: SnapshotMarker,
        candidates: Vec<Listing>,
    ) -> Result<SnapshotOutcome, StoreError>;

    async fn snapshot_marker(&self, sku: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Listing>, StoreError>;

    async fn list(&self, query: &ListingQuery) -> Result<Vec<Listing>, StoreError>;

    /// Flag a listing as deleted without touching its ordering fields.
    /// Returns whether a row existed.
    async fn mark_deleted(&self, id: &str) -> Result<bool, StoreError>;
}
