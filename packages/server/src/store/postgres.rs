use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Listing;
use sea_orm::sea_query::{Expr, LockType, OnConflict};
use sea_orm::*;
use tracing::debug;

use super::{
    ListingOrderBy, ListingQuery, ListingStore, SnapshotMarker, SnapshotOutcome, SortOrder,
    StoreError, UpsertOutcome,
};
use crate::entity::{listing, snapshot};
use crate::reconcile::{Resolution, Stamp, resolve};

/// Columns overwritten when a newer candidate replaces a stored row.
/// `first_seen_at` is never overwritten.
const MUTABLE_COLUMNS: [listing::Column; 15] = [
    listing::Column::Sku,
    listing::Column::Steamid64,
    listing::Column::Item,
    listing::Column::Intent,
    listing::Column::IsAutomatic,
    listing::Column::IsBuyout,
    listing::Column::IsOffers,
    listing::Column::CurrenciesKeys,
    listing::Column::CurrenciesHalfScrap,
    listing::Column::Comment,
    listing::Column::CreatedAt,
    listing::Column::BumpedAt,
    listing::Column::LastSeenAt,
    listing::Column::LastCheckedAt,
    listing::Column::IsDeleted,
];

/// Every column except the comment.
const READ_COLUMNS: [listing::Column; 16] = [
    listing::Column::Id,
    listing::Column::Sku,
    listing::Column::Steamid64,
    listing::Column::Item,
    listing::Column::Intent,
    listing::Column::IsAutomatic,
    listing::Column::IsBuyout,
    listing::Column::IsOffers,
    listing::Column::CurrenciesKeys,
    listing::Column::CurrenciesHalfScrap,
    listing::Column::CreatedAt,
    listing::Column::BumpedAt,
    listing::Column::FirstSeenAt,
    listing::Column::LastSeenAt,
    listing::Column::LastCheckedAt,
    listing::Column::IsDeleted,
];

/// Listing row as returned by reads.
#[derive(Debug, FromQueryResult)]
struct ListingRow {
    id: String,
    sku: String,
    steamid64: i64,
    item: serde_json::Value,
    intent: String,
    is_automatic: bool,
    is_buyout: bool,
    is_offers: bool,
    currencies_keys: f64,
    currencies_half_scrap: i32,
    created_at: DateTime<Utc>,
    bumped_at: DateTime<Utc>,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    last_checked_at: DateTime<Utc>,
    is_deleted: bool,
}

impl TryFrom<ListingRow> for Listing {
    type Error = StoreError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let intent = row.intent.parse().map_err(|reason| StoreError::Corrupt {
            id: row.id.clone(),
            reason,
        })?;
        Ok(Listing {
            id: row.id,
            sku: row.sku,
            steamid64: row.steamid64,
            item: row.item,
            intent,
            is_automatic: row.is_automatic,
            is_buyout: row.is_buyout,
            is_offers: row.is_offers,
            currencies_keys: row.currencies_keys,
            currencies_half_scrap: row.currencies_half_scrap,
            comment: None,
            created_at: row.created_at,
            bumped_at: row.bumped_at,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
            last_checked_at: row.last_checked_at,
            is_deleted: row.is_deleted,
        })
    }
}

impl TryFrom<listing::Model> for Listing {
    type Error = StoreError;

    fn try_from(model: listing::Model) -> Result<Self, Self::Error> {
        let intent = model.intent.parse().map_err(|reason| StoreError::Corrupt {
            id: model.id.clone(),
            reason,
        })?;
        Ok(Listing {
            id: model.id,
            sku: model.sku,
            steamid64: model.steamid64,
            item: model.item,
            intent,
            is_automatic: model.is_automatic,
            is_buyout: model.is_buyout,
            is_offers: model.is_offers,
            currencies_keys: model.currencies_keys,
            currencies_half_scrap: model.currencies_half_scrap,
            comment: model.comment,
            created_at: model.created_at,
            bumped_at: model.bumped_at,
            first_seen_at: model.first_seen_at,
            last_seen_at: model.last_seen_at,
            last_checked_at: model.last_checked_at,
            is_deleted: model.is_deleted,
        })
    }
}

fn active_model(listing: &Listing) -> listing::ActiveModel {
    listing::ActiveModel {
        id: Set(listing.id.clone()),
        sku: Set(listing.sku.clone()),
        steamid64: Set(listing.steamid64),
        item: Set(listing.item.clone()),
        intent: Set(listing.intent.as_str().to_string()),
        is_automatic: Set(listing.is_automatic),
        is_buyout: Set(listing.is_buyout),
        is_offers: Set(listing.is_offers),
        currencies_keys: Set(listing.currencies_keys),
        currencies_half_scrap: Set(listing.currencies_half_scrap),
        comment: Set(listing.comment.clone()),
        created_at: Set(listing.created_at),
        bumped_at: Set(listing.bumped_at),
        first_seen_at: Set(listing.first_seen_at),
        last_seen_at: Set(listing.last_seen_at),
        last_checked_at: Set(listing.last_checked_at),
        is_deleted: Set(listing.is_deleted),
    }
}

/// Write one candidate on `conn`, which must be inside a transaction.
///
/// Locks the stored row, decides, then inserts with an `ON CONFLICT` update
/// guarded on `last_seen_at` so a row inserted concurrently by an older
/// candidate is still replaced and a newer one is not.
async fn upsert_locked<C: ConnectionTrait>(
    conn: &C,
    candidate: Listing,
) -> Result<Option<Listing>, StoreError> {
    let existing = listing::Entity::find_by_id(candidate.id.clone())
        .lock(LockType::Update)
        .one(conn)
        .await?;

    let stamp = existing.map(|row| Stamp {
        first_seen_at: row.first_seen_at,
        last_seen_at: row.last_seen_at,
    });
    let Resolution::Write(row) = resolve(stamp, candidate) else {
        return Ok(None);
    };

    let result = listing::Entity::insert(active_model(&row))
        .on_conflict(
            OnConflict::column(listing::Column::Id)
                .update_columns(MUTABLE_COLUMNS)
                .action_and_where(Expr::cust("listing.last_seen_at < EXCLUDED.last_seen_at"))
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await;

    match result {
        Ok(0) | Err(DbErr::RecordNotInserted) => {
            debug!(listing_id = %row.id, "Concurrent newer write won");
            return Ok(None);
        }
        Ok(_) => {}
        Err(e) => return Err(e.into()),
    }

    let stored = listing::Entity::find_by_id(row.id.clone())
        .one(conn)
        .await?
        .ok_or_else(|| StoreError::Vanished(row.id.clone()))?;

    Listing::try_from(stored).map(Some)
}

pub struct PgListingStore {
    db: DatabaseConnection,
}

impl PgListingStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn upsert(&self, candidate: Listing) -> Result<UpsertOutcome, StoreError> {
        let txn = self.db.begin().await?;
        let written = upsert_locked(&txn, candidate).await?;
        txn.commit().await?;

        Ok(match written {
            Some(row) => UpsertOutcome::Written(row),
            None => UpsertOutcome::Stale,
        })
    }

    async fn apply_snapshot(
        &self,
        marker: SnapshotMarker,
        candidates: Vec<Listing>,
    ) -> Result<SnapshotOutcome, StoreError> {
        let txn = self.db.begin().await?;

        // The marker row may not exist yet, so row locks alone cannot
        // serialize the first snapshot of a sku.
        txn.execute_raw(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock(hashtext($1))",
            [marker.sku.clone().into()],
        ))
        .await?;

        let current = snapshot::Entity::find_by_id(marker.sku.clone())
            .lock(LockType::Update)
            .one(&txn)
            .await?;

        if let Some(current) = current
            && current.created_at >= marker.created_at
        {
            txn.commit().await?;
            return Ok(SnapshotOutcome::Stale {
                current: current.created_at,
            });
        }

        let mut candidates = candidates;
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        let mut written = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Some(row) = upsert_locked(&txn, candidate).await? {
                written.push(row);
            }
        }

        let result = snapshot::Entity::insert(snapshot::ActiveModel {
            sku: Set(marker.sku.clone()),
            created_at: Set(marker.created_at),
        })
        .on_conflict(
            OnConflict::column(snapshot::Column::Sku)
                .update_column(snapshot::Column::CreatedAt)
                .action_and_where(Expr::cust("snapshot.created_at < EXCLUDED.created_at"))
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e.into()),
        }

        txn.commit().await?;
        Ok(SnapshotOutcome::Applied { written })
    }

    async fn snapshot_marker(&self, sku: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(snapshot::Entity::find_by_id(sku.to_string())
            .one(&self.db)
            .await?
            .map(|s| s.created_at))
    }

    async fn get(&self, id: &str) -> Result<Option<Listing>, StoreError> {
        listing::Entity::find_by_id(id.to_string())
            .select_only()
            .columns(READ_COLUMNS)
            .into_model::<ListingRow>()
            .one(&self.db)
            .await?
            .map(Listing::try_from)
            .transpose()
    }

    async fn list(&self, query: &ListingQuery) -> Result<Vec<Listing>, StoreError> {
        let mut select = listing::Entity::find();

        if let Some(ref sku) = query.sku {
            select = select.filter(listing::Column::Sku.eq(sku.as_str()));
        }
        if let Some(intent) = query.intent {
            select = select.filter(listing::Column::Intent.eq(intent.as_str()));
        }
        if let Some(deleted) = query.deleted {
            select = select.filter(listing::Column::IsDeleted.eq(deleted));
        }

        let order = match query.order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        let order_column = match query.order_by {
            ListingOrderBy::LastSeenAt => listing::Column::LastSeenAt,
            ListingOrderBy::LastCheckedAt => listing::Column::LastCheckedAt,
        };
        select = select.order_by(order_column, order.clone());
        if query.sku.is_none() {
            select = select.order_by(listing::Column::Id, order);
        }

        select
            .select_only()
            .columns(READ_COLUMNS)
            .offset(Some(query.offset()))
            .limit(Some(query.limit))
            .into_model::<ListingRow>()
            .all(&self.db)
            .await?
            .into_iter()
            .map(Listing::try_from)
            .collect()
    }

    async fn mark_deleted(&self, id: &str) -> Result<bool, StoreError> {
        let result = listing::Entity::update_many()
            .col_expr(listing::Column::IsDeleted, Expr::value(true))
            .filter(listing::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
