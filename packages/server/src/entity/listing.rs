use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Current state of one marketplace listing.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "listing")]
pub struct Model {
    /// Marketplace listing id.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub sku: String,

    pub steamid64: i64,

    /// Raw item payload as delivered by the feed.
    #[sea_orm(column_type = "JsonBinary")]
    pub item: Json,

    /// One of: buy, sell
    pub intent: String,

    pub is_automatic: bool,
    pub is_buyout: bool,
    pub is_offers: bool,

    pub currencies_keys: f64,
    /// Metal price in half-scrap units (metal * 18).
    pub currencies_half_scrap: i32,

    pub comment: Option<String>,

    pub created_at: DateTimeUtc,
    pub bumped_at: DateTimeUtc,

    /// Earliest local observation. Never overwritten.
    pub first_seen_at: DateTimeUtc,
    /// Event time of the state this row reflects; the conflict-resolution key.
    pub last_seen_at: DateTimeUtc,
    #[sea_orm(indexed)]
    pub last_checked_at: DateTimeUtc,

    #[sea_orm(default_value = false)]
    pub is_deleted: bool,
}

impl ActiveModelBehavior for ActiveModel {}
