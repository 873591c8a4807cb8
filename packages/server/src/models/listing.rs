use chrono::{DateTime, Utc};
use common::{Listing, ListingIntent, MarketplaceListing};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::recheck::RecheckRequest;
use crate::store::{ListingOrderBy, ListingQuery, SortOrder};

/// Largest page a listing read may request.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Query parameters of listing reads.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListingListQuery {
    /// 1-based page number. Default: 1.
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Page size, 1-100. Default: 100.
    #[param(example = 100)]
    pub limit: Option<u64>,
    /// Filter by intent: `buy` or `sell`.
    #[param(example = "sell")]
    pub intent: Option<String>,
    /// Filter by deletion flag.
    pub deleted: Option<bool>,
    /// Sort direction: `ASC` or `DESC` (default).
    pub order: Option<SortOrder>,
    /// Sort field: `lastSeenAt` (default) or `lastCheckedAt`.
    pub order_by: Option<ListingOrderBy>,
}

impl ListingListQuery {
    /// Validate and turn into a store query, optionally scoped to one SKU.
    pub fn into_query(self, sku: Option<String>) -> Result<ListingQuery, AppError> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::Validation("page must be a positive integer".into()));
        }
        let limit = self.limit.unwrap_or(MAX_PAGE_SIZE);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if (page - 1)
            .checked_mul(limit)
            .is_none_or(|offset| offset > i64::MAX as u64)
        {
            return Err(AppError::Validation("page is out of range".into()));
        }
        let intent = self
            .intent
            .as_deref()
            .map(str::parse::<ListingIntent>)
            .transpose()
            .map_err(AppError::Validation)?;

        Ok(ListingQuery {
            sku,
            intent,
            deleted: self.deleted,
            order: self.order.unwrap_or_default(),
            order_by: self.order_by.unwrap_or_default(),
            page,
            limit,
        })
    }
}

/// A stored listing.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    #[schema(example = "440_76561198012345678_0123456789abcdef0123456789abcdef")]
    pub id: String,
    #[schema(example = "5021;6")]
    pub sku: String,
    /// Owner's 64-bit Steam id.
    #[schema(example = 76561198012345678_i64)]
    pub steamid64: i64,
    /// Item as delivered by the feed.
    #[schema(value_type = Object)]
    pub item: serde_json::Value,
    #[schema(example = "sell")]
    pub intent: String,
    pub is_automatic: bool,
    pub is_buyout: bool,
    pub is_offers: bool,
    #[schema(example = 2.0)]
    pub currencies_keys: f64,
    /// Metal price in half-scrap units (1 ref = 18).
    #[schema(example = 27)]
    pub currencies_half_scrap: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub bumped_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl From<Listing> for ListingResponse {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            sku: listing.sku,
            steamid64: listing.steamid64,
            item: listing.item,
            intent: listing.intent.as_str().to_string(),
            is_automatic: listing.is_automatic,
            is_buyout: listing.is_buyout,
            is_offers: listing.is_offers,
            currencies_keys: listing.currencies_keys,
            currencies_half_scrap: listing.currencies_half_scrap,
            comment: listing.comment,
            created_at: listing.created_at,
            bumped_at: listing.bumped_at,
            first_seen_at: listing.first_seen_at,
            last_seen_at: listing.last_seen_at,
            last_checked_at: listing.last_checked_at,
            is_deleted: listing.is_deleted,
        }
    }
}

/// Page metadata. No total count is computed.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// Number of items on this page.
    #[schema(example = 100)]
    pub item_count: u64,
    #[schema(example = 100)]
    pub items_per_page: u64,
    #[schema(example = 1)]
    pub current_page: u64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ListingPage {
    pub items: Vec<ListingResponse>,
    pub meta: PageMeta,
}

impl ListingPage {
    pub fn new(items: Vec<Listing>, query: &ListingQuery) -> Self {
        Self {
            meta: PageMeta {
                item_count: items.len() as u64,
                items_per_page: query.limit,
                current_page: query.page,
            },
            items: items.into_iter().map(ListingResponse::from).collect(),
        }
    }
}

/// Query parameters of a recheck request.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckListingQuery {
    /// Milliseconds to wait before the check may run.
    #[param(example = 60000)]
    pub delay: Option<i64>,
    /// Lower runs first. Unset runs after any value.
    #[param(example = 1)]
    pub priority: Option<i32>,
    /// Whether an existing job may be replaced or promoted. Default: true.
    pub replace: Option<bool>,
}

impl CheckListingQuery {
    pub fn into_request(self) -> Result<RecheckRequest, AppError> {
        if let Some(delay) = self.delay
            && delay < 0
        {
            return Err(AppError::Validation("delay must be >= 0".into()));
        }
        Ok(RecheckRequest {
            delay_ms: self.delay,
            priority: self.priority,
            replace: self.replace.unwrap_or(true),
        })
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EnqueueResponse {
    /// Whether a new job was created.
    pub enqueued: bool,
}

/// Request body for saving a feed listing by hand.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SaveListingRequest {
    /// Time the listing was observed. Orders this write against others.
    #[schema(example = "2020-09-13T12:26:40Z")]
    pub time: DateTime<Utc>,
    /// Listing in the marketplace feed format.
    #[schema(value_type = Object)]
    pub listing: MarketplaceListing,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SaveListingResponse {
    /// Whether the store changed.
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<ListingResponse>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DeletedResponse {
    #[schema(example = "440_1234567890")]
    pub id: String,
}

/// Whether `id` has the shape of a listing id in the default app namespace:
/// `440_<number>` or `440_<number>_<md5 hex>`.
///
/// `<number>` only needs to start with an integer.
pub fn is_valid_listing_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("440_") else {
        return false;
    };

    let parts: Vec<&str> = rest.split('_').collect();
    match parts.as_slice() {
        [number] => has_leading_integer(number),
        [number, hash] => has_leading_integer(number) && is_md5_hex(hash),
        _ => false,
    }
}

fn has_leading_integer(s: &str) -> bool {
    let s = s.trim_start();
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    s.starts_with(|c: char| c.is_ascii_digit())
}

fn is_md5_hex(s: &str) -> bool {
    s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit())
}
