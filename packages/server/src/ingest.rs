//! Turns inbound listing events and snapshots into store writes and
//! downstream notifications.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::snapshot::dedup_latest;
use common::{
    Listing, ListingEvent, MarketplaceListing, Normalized, Notification, SkipReason, Snapshot,
    SnapshotHandled,
};
use mq::{HandlerError, MqError, Publisher};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::store::{ListingStore, SnapshotMarker, SnapshotOutcome, StoreError, UpsertOutcome};
use crate::tradeoffer::{TradeOfferUrl, TradeOfferUrlForwarder};

#[derive(Debug, Error)]
pub enum IngestError {
    /// Input that will never succeed, however often it is retried.
    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Publish error: {0}")]
    Publish(#[from] MqError),
}

impl From<IngestError> for HandlerError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Malformed(reason) => HandlerError::Malformed(reason),
            other => HandlerError::transient(other),
        }
    }
}

fn log_skip(listing_id: &str, reason: &SkipReason) {
    if reason.is_warning() {
        warn!(listing_id, reason = %reason, "Listing not saved");
    } else {
        debug!(listing_id, reason = %reason, "Listing ignored");
    }
}

pub struct Ingestor {
    store: Arc<dyn ListingStore>,
    publisher: Arc<dyn Publisher>,
    forwarder: Option<TradeOfferUrlForwarder>,
    app_id: u32,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ListingStore>, publisher: Arc<dyn Publisher>, app_id: u32) -> Self {
        Self {
            store,
            publisher,
            forwarder: None,
            app_id,
        }
    }

    pub fn with_forwarder(mut self, forwarder: TradeOfferUrlForwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    /// Handle one change notification, ordered by the time embedded in its id.
    #[instrument(skip(self, event), fields(event_id = %event.id, listing_id = %event.payload.id))]
    pub async fn handle_event(
        &self,
        event: ListingEvent,
        is_deleted: bool,
    ) -> Result<Option<Listing>, IngestError> {
        if event.event.is_delete() != is_deleted {
            warn!(kind = %event.event, is_deleted, "Event kind does not match its route");
        }
        let time = event
            .event_time()
            .map_err(|e| IngestError::Malformed(e.to_string()))?;
        self.save_listing(&event.payload, is_deleted, time).await
    }

    /// Save a feed listing observed at `time`.
    ///
    /// Returns the stored row when this call changed it, `None` when the
    /// listing was filtered out or the store already held newer state.
    pub async fn save_listing(
        &self,
        listing: &MarketplaceListing,
        is_deleted: bool,
        time: DateTime<Utc>,
    ) -> Result<Option<Listing>, IngestError> {
        let normalized = listing
            .normalize(self.app_id, is_deleted, time)
            .map_err(|e| IngestError::Malformed(e.to_string()))?;

        let candidate = match normalized {
            Normalized::Candidate(candidate) => candidate,
            Normalized::Skipped(reason) => {
                log_skip(&listing.id, &reason);
                return Ok(None);
            }
        };

        let row = match self.store.upsert(candidate).await? {
            UpsertOutcome::Written(row) => row,
            UpsertOutcome::Stale => {
                debug!(listing_id = %listing.id, "Stored listing is newer, ignoring");
                return Ok(None);
            }
        };

        self.publisher
            .notify(&Notification::for_listing(row.clone()))
            .await?;

        if !is_deleted {
            self.forward_trade_offer_url(listing).await;
        }

        Ok(Some(row))
    }

    async fn forward_trade_offer_url(&self, listing: &MarketplaceListing) {
        let Some(ref forwarder) = self.forwarder else {
            return;
        };
        let Some(record) = listing
            .user
            .trade_offer_url
            .as_deref()
            .and_then(|url| TradeOfferUrl::parse(&listing.user.id, url))
        else {
            return;
        };

        if let Err(e) = forwarder.forward(&record).await {
            warn!(steamid64 = %record.steamid64, error = %e, "Failed to forward trade offer URL");
        }
    }

    /// Apply a full snapshot of one SKU.
    #[instrument(
        skip(self, snapshot),
        fields(sku = %snapshot.sku, created_at = %snapshot.created_at, entries = snapshot.listings.len())
    )]
    pub async fn handle_snapshot(&self, snapshot: Snapshot) -> Result<SnapshotOutcome, IngestError> {
        let mut candidates = Vec::with_capacity(snapshot.listings.len());
        for entry in &snapshot.listings {
            match entry.normalize(&snapshot) {
                Ok(Normalized::Candidate(candidate)) => candidates.push(candidate),
                Ok(Normalized::Skipped(reason)) => log_skip(&entry.id, &reason),
                Err(e) => warn!(listing_id = %entry.id, error = %e, "Dropping invalid snapshot entry"),
            }
        }
        let candidates = dedup_latest(candidates);

        let marker = SnapshotMarker {
            sku: snapshot.sku.clone(),
            created_at: snapshot.created_at,
        };
        let outcome = self.store.apply_snapshot(marker, candidates).await?;

        match outcome {
            SnapshotOutcome::Stale { current } => {
                info!(current = %current, "Snapshot is not newer than the last applied one, ignoring");
            }
            SnapshotOutcome::Applied { ref written } => {
                for row in written {
                    self.publisher
                        .notify(&Notification::for_listing(row.clone()))
                        .await?;
                }
                self.publisher
                    .notify(&Notification::SnapshotHandled(SnapshotHandled {
                        sku: snapshot.sku.clone(),
                        created_at: snapshot.created_at,
                        written: written.len(),
                    }))
                    .await?;
                info!(written = written.len(), "Snapshot applied");
            }
        }

        Ok(outcome)
    }
}
