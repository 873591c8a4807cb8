use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Listing;
use tokio::sync::Mutex;

use super::{
    ListingOrderBy, ListingQuery, ListingStore, SnapshotMarker, SnapshotOutcome, SortOrder,
    StoreError, UpsertOutcome,
};
use crate::reconcile::{Resolution, Stamp, resolve};

#[derive(Default)]
struct Tables {
    listings: HashMap<String, Listing>,
    snapshots: HashMap<String, DateTime<Utc>>,
}

impl Tables {
    fn upsert(&mut self, candidate: Listing) -> Option<Listing> {
        let stamp = self.listings.get(&candidate.id).map(Stamp::from);
        match resolve(stamp, candidate) {
            Resolution::Stale => None,
            Resolution::Write(row) => {
                self.listings.insert(row.id.clone(), row.clone());
                Some(row)
            }
        }
    }
}

/// Listing store held in process memory. One lock serializes every write.
#[derive(Default)]
pub struct MemoryListingStore {
    tables: Mutex<Tables>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, deleted ones included.
    pub async fn len(&self) -> usize {
        self.tables.lock().await.listings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stored row including its comment.
    pub async fn raw(&self, id: &str) -> Option<Listing> {
        self.tables.lock().await.listings.get(id).cloned()
    }
}

fn without_comment(mut listing: Listing) -> Listing {
    listing.comment = None;
    listing
}

fn compare(a: &Listing, b: &Listing, query: &ListingQuery) -> Ordering {
    let key = match query.order_by {
        ListingOrderBy::LastSeenAt => a.last_seen_at.cmp(&b.last_seen_at),
        ListingOrderBy::LastCheckedAt => a.last_checked_at.cmp(&b.last_checked_at),
    };
    let ordering = if query.sku.is_none() {
        key.then_with(|| a.id.cmp(&b.id))
    } else {
        key
    };
    match query.order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn upsert(&self, candidate: Listing) -> Result<UpsertOutcome, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(match tables.upsert(candidate) {
            Some(row) => UpsertOutcome::Written(row),
            None => UpsertOutcome::Stale,
        })
    }

    async fn apply_snapshot(
        &self,
        marker: SnapshotMarker,
        candidates: Vec<Listing>,
    ) -> Result<SnapshotOutcome, StoreError> {
        let mut tables = self.tables.lock().await;

        if let Some(&current) = tables.snapshots.get(&marker.sku)
            && current >= marker.created_at
        {
            return Ok(SnapshotOutcome::Stale { current });
        }

        let mut candidates = candidates;
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        let written = candidates
            .into_iter()
            .filter_map(|candidate| tables.upsert(candidate))
            .collect();
        tables.snapshots.insert(marker.sku, marker.created_at);

        Ok(SnapshotOutcome::Applied { written })
    }

    async fn snapshot_marker(&self, sku: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.tables.lock().await.snapshots.get(sku).copied())
    }

    async fn get(&self, id: &str) -> Result<Option<Listing>, StoreError> {
        Ok(self.raw(id).await.map(without_comment))
    }

    async fn list(&self, query: &ListingQuery) -> Result<Vec<Listing>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<&Listing> = tables
            .listings
            .values()
            .filter(|l| query.sku.as_ref().is_none_or(|sku| &l.sku == sku))
            .filter(|l| query.intent.is_none_or(|intent| l.intent == intent))
            .filter(|l| query.deleted.is_none_or(|deleted| l.is_deleted == deleted))
            .collect();
        rows.sort_by(|a, b| compare(a, b, query));

        Ok(rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .cloned()
            .map(without_comment)
            .collect())
    }

    async fn mark_deleted(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(match tables.listings.get_mut(id) {
            Some(listing) => {
                listing.is_deleted = true;
                true
            }
            None => false,
        })
    }
}
