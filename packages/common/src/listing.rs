use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::Item;
use crate::sku::sku_from_item;

/// Maximum length of a stored comment, in characters.
pub const MAX_COMMENT_CHARS: usize = 200;

/// Half-scrap units per refined metal (9 scrap per refined, 2 halves per scrap).
pub const HALF_SCRAP_PER_METAL: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingIntent {
    Buy,
    Sell,
}

impl ListingIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for ListingIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ListingIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(format!("Invalid intent '{}'. Must be 'buy' or 'sell'", s)),
        }
    }
}

/// Listing as delivered by the marketplace feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceListing {
    pub id: String,
    pub appid: u32,
    pub listed_at: i64,
    pub bumped_at: i64,
    #[serde(default)]
    pub buyout_only: Option<bool>,
    #[serde(default)]
    pub trade_offers_preferred: Option<bool>,
    pub currencies: Currencies,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    pub intent: String,
    pub item: serde_json::Value,
    #[serde(default)]
    pub user_agent: Option<UserAgent>,
    pub user: MarketplaceUser,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Currencies {
    #[serde(default)]
    pub keys: Option<f64>,
    #[serde(default)]
    pub metal: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAgent {
    pub client: String,
    #[serde(default)]
    pub last_pulse: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceUser {
    pub id: String,
    #[serde(default)]
    pub trade_offer_url: Option<String>,
}

/// Current state of one listing, as stored and republished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub sku: String,
    pub steamid64: i64,
    pub item: serde_json::Value,
    pub intent: ListingIntent,
    pub is_automatic: bool,
    pub is_buyout: bool,
    pub is_offers: bool,
    pub currencies_keys: f64,
    pub currencies_half_scrap: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub bumped_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// Key used to collapse duplicate snapshot entries for the same asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub sku: String,
    pub steamid64: i64,
    pub asset_id: String,
}

impl Listing {
    /// Owner-and-asset identity of this listing.
    ///
    /// Buy orders carry no asset, so the listing id stands in for it.
    pub fn composite_key(&self) -> CompositeKey {
        let asset_id = Item::from_value(&self.item)
            .ok()
            .and_then(|item| item.id)
            .unwrap_or_else(|| self.id.clone());

        CompositeKey {
            sku: self.sku.clone(),
            steamid64: self.steamid64,
            asset_id,
        }
    }
}

/// Outcome of normalizing an inbound listing into a store candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Candidate(Listing),
    Skipped(SkipReason),
}

/// Inputs that are valid but not worth storing.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Listing belongs to another game.
    ForeignApp(u32),
    /// Neither a key nor a metal price.
    Unpriced,
    /// Item has no resolvable quality.
    NoQuality,
    /// Metal price does not fit the store's 32-bit half-scrap column.
    PriceOutOfRange(f64),
}

impl SkipReason {
    /// Whether the skip deserves an operator-visible warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::PriceOutOfRange(_))
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignApp(appid) => write!(f, "listing is for app {appid}"),
            Self::Unpriced => f.write_str("listing has no key or metal price"),
            Self::NoQuality => f.write_str("item has no quality"),
            Self::PriceOutOfRange(v) => write!(f, "half-scrap value {v} out of range"),
        }
    }
}

/// Inbound data that cannot be turned into a listing at all.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid owner steamid64 '{0}'")]
    InvalidOwner(String),
    #[error("timestamp {0} out of range")]
    Timestamp(i64),
    #[error("invalid item payload: {0}")]
    Item(#[from] serde_json::Error),
}

/// Convert a metal amount to half-scrap units.
///
/// `None` when the rounded value does not fit a signed 32-bit integer.
pub fn metal_to_half_scrap(metal: f64) -> Option<i32> {
    let half_scrap = (metal * HALF_SCRAP_PER_METAL).round();
    if half_scrap.is_finite()
        && half_scrap >= f64::from(i32::MIN)
        && half_scrap <= f64::from(i32::MAX)
    {
        Some(half_scrap as i32)
    } else {
        None
    }
}

/// First `MAX_COMMENT_CHARS` characters of a comment.
pub fn truncate_comment(comment: &str) -> String {
    comment.chars().take(MAX_COMMENT_CHARS).collect()
}

impl MarketplaceListing {
    /// Normalize a feed listing into a store candidate observed at `seen_at`.
    pub fn normalize(
        &self,
        app_id: u32,
        is_deleted: bool,
        seen_at: DateTime<Utc>,
    ) -> Result<Normalized, NormalizeError> {
        if self.appid != app_id {
            return Ok(Normalized::Skipped(SkipReason::ForeignApp(self.appid)));
        }
        if self.currencies.keys.is_none() && self.currencies.metal.is_none() {
            return Ok(Normalized::Skipped(SkipReason::Unpriced));
        }

        let item = Item::from_value(&self.item)?;
        let Some(sku) = sku_from_item(&item) else {
            return Ok(Normalized::Skipped(SkipReason::NoQuality));
        };

        let half_scrap = match self.currencies.metal {
            None => 0,
            Some(metal) => match metal_to_half_scrap(metal) {
                Some(v) => v,
                None => {
                    return Ok(Normalized::Skipped(SkipReason::PriceOutOfRange(
                        metal * HALF_SCRAP_PER_METAL,
                    )));
                }
            },
        };

        let steamid64 = self
            .user
            .id
            .parse::<i64>()
            .map_err(|_| NormalizeError::InvalidOwner(self.user.id.clone()))?;

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
            is_automatic: self.user_agent.is_some(),
            is_buyout: self.buyout_only.unwrap_or(true),
            is_offers: self.trade_offers_preferred.unwrap_or(true),
            currencies_keys: self.currencies.keys.unwrap_or(0.0),
            currencies_half_scrap: half_scrap,
            comment: self
                .details
                .as_ref()
                .and_then(|d| d.as_str())
                .map(truncate_comment),
            created_at: from_unix(self.listed_at)?,
            bumped_at: from_unix(self.bumped_at)?,
            first_seen_at: seen_at,
            last_seen_at: seen_at,
            last_checked_at: seen_at,
            is_deleted,
        }))
    }
}

fn from_unix(seconds: i64) -> Result<DateTime<Utc>, NormalizeError> {
    DateTime::from_timestamp(seconds, 0).ok_or(NormalizeError::Timestamp(seconds))
}
