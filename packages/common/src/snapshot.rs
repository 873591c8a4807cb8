use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::Item;
use crate::listing::{
    CompositeKey, Listing, ListingIntent, NormalizeError, Normalized, SkipReason, truncate_comment,
};
use crate::sku::sku_from_item;

/// Full point-in-time listing set for one SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub name: Option<String>,
    pub sku: String,
    pub created_at: DateTime<Utc>,
    pub listings: Vec<SnapshotListing>,
}

/// One entry of a snapshot. Prices are already in store units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotListing {
    pub id: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub steamid64: String,
    pub item: serde_json::Value,
    pub intent: String,
    pub is_automatic: bool,
    pub is_buyout: bool,
    pub is_offers: bool,
    #[serde(default, alias = "details")]
    pub comment: Option<String>,
    pub currencies_keys: f64,
    pub currencies_half_scrap: i64,
    pub created_at: DateTime<Utc>,
    pub bumped_at: DateTime<Utc>,
}

impl SnapshotListing {
    /// Normalize a snapshot entry into a store candidate.
    ///
    /// The SKU is recomputed from the item; entries whose item cannot be
    /// canonicalized keep the SKU they were filed under.
    pub fn normalize(&self, snapshot: &Snapshot) -> Result<Normalized, NormalizeError> {
        let sku = Item::from_value(&self.item)
            .ok()
            .and_then(|item| sku_from_item(&item))
            .or_else(|| self.sku.clone())
            .unwrap_or_else(|| snapshot.sku.clone());

        let Ok(half_scrap) = i32::try_from(self.currencies_half_scrap) else {
            return Ok(Normalized::Skipped(SkipReason::PriceOutOfRange(
                self.currencies_half_scrap as f64,
            )));
        };

        let steamid64 = self
            .steamid64
            .parse::<i64>()
            .map_err(|_| NormalizeError::InvalidOwner(self.steamid64.clone()))?;

        let intent = if self.intent == "buy" {
            ListingIntent::Buy
        } else {
            ListingIntent::Sell
        };

        Ok(Normalized::Candidate(Listing {
            id: self.id.clone(),
            sku,
            steamid64,
            item: self.item.clone(),
            intent,
            is_automatic: self.is_automatic,
            is_buyout: self.is_buyout,
            is_offers: self.is_offers,
            currencies_keys: self.currencies_keys,
            currencies_half_scrap: half_scrap,
            comment: self.comment.as_deref().map(truncate_comment),
            created_at: self.created_at,
            bumped_at: self.bumped_at,
            first_seen_at: snapshot.created_at,
            last_seen_at: snapshot.created_at,
            last_checked_at: snapshot.created_at,
            is_deleted: false,
        }))
    }
}

/// Keep only the entry with the greatest `created_at` per composite key.
///
/// Survivors keep the position of the first entry seen for their key; on a
/// `created_at` tie the earlier entry wins.
pub fn dedup_latest(candidates: Vec<Listing>) -> Vec<Listing> {
    let mut slots: HashMap<CompositeKey, usize> = HashMap::new();
    let mut kept: Vec<Listing> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match slots.get(&candidate.composite_key()) {
            Some(&slot) => {
                if candidate.created_at > kept[slot].created_at {
                    kept[slot] = candidate;
                }
            }
            None => {
                slots.insert(candidate.composite_key(), kept.len());
                kept.push(candidate);
            }
        }
    }

    kept
}
