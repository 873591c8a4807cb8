use std::sync::Arc;

use sea_orm::EntityTrait;
use server::entity::listing as listing_entity;
use server::store::{
    ListingOrderBy, ListingQuery, ListingStore, PgListingStore, SnapshotMarker, SnapshotOutcome,
    SortOrder, UpsertOutcome,
};

use crate::common::{at, listing, test_db};

const SKU: &str = "5021;6";

#[tokio::test]
async fn upsert_orders_by_last_seen_and_keeps_first_seen() {
    let Some(db) = test_db().await else { return };
    let store = PgListingStore::new(db.clone());

    let UpsertOutcome::Written(first) = store.upsert(listing("440_1", SKU, 100)).await.unwrap()
    else {
        panic!("first write must land");
    };
    assert_eq!(first.first_seen_at, at(100));

    assert_eq!(
        store.upsert(listing("440_1", SKU, 50)).await.unwrap(),
        UpsertOutcome::Stale
    );
    assert_eq!(
        store.upsert(listing("440_1", SKU, 100)).await.unwrap(),
        UpsertOutcome::Stale
    );

    let mut newer = listing("440_1", SKU, 200);
    newer.currencies_half_scrap = 36;
    let UpsertOutcome::Written(row) = store.upsert(newer).await.unwrap() else {
        panic!("newer write must land");
    };
    assert_eq!(row.first_seen_at, at(100));
    assert_eq!(row.last_seen_at, at(200));
    assert_eq!(row.currencies_half_scrap, 36);
    assert_eq!(row.comment, None);

    let raw = listing_entity::Entity::find_by_id("440_1".to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(raw.comment.as_deref(), Some("selling"));
}

#[tokio::test]
async fn concurrent_upserts_converge_on_newest() {
    let Some(db) = test_db().await else { return };
    let store = Arc::new(PgListingStore::new(db));

    let mut tasks = Vec::new();
    for seen in [300, 100, 500, 200, 400, 150, 450, 250] {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            let mut candidate = listing("440_2", SKU, seen);
            candidate.currencies_half_scrap = seen as i32;
            store.upsert(candidate).await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stored = store.get("440_2").await.unwrap().unwrap();
    assert_eq!(stored.last_seen_at, at(500));
    assert_eq!(stored.currencies_half_scrap, 500);
}

#[tokio::test]
async fn snapshot_is_applied_once_per_marker() {
    let Some(db) = test_db().await else { return };
    let store = PgListingStore::new(db);

    store.upsert(listing("440_3", SKU, 900)).await.unwrap();

    let marker = SnapshotMarker {
        sku: SKU.into(),
        created_at: at(1_000),
    };
    let outcome = store
        .apply_snapshot(
            marker.clone(),
            vec![listing("440_3", SKU, 800), listing("440_4", SKU, 1_000)],
        )
        .await
        .unwrap();
    let SnapshotOutcome::Applied { written } = outcome else {
        panic!("first snapshot must apply");
    };
    assert_eq!(
        written.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(),
        vec!["440_4"]
    );
    assert_eq!(store.snapshot_marker(SKU).await.unwrap(), Some(at(1_000)));

    let replay = store
        .apply_snapshot(marker, vec![listing("440_5", SKU, 2_000)])
        .await
        .unwrap();
    assert_eq!(replay, SnapshotOutcome::Stale { current: at(1_000) });
    assert!(store.get("440_5").await.unwrap().is_none());
}

#[tokio::test]
async fn list_filters_and_pages() {
    let Some(db) = test_db().await else { return };
    let store = PgListingStore::new(db);

    for (id, sku, seen) in [
        ("440_10", SKU, 10),
        ("440_11", SKU, 30),
        ("440_12", "5002;6", 20),
        ("440_13", SKU, 20),
    ] {
        store.upsert(listing(id, sku, seen)).await.unwrap();
    }
    store.mark_deleted("440_13").await.unwrap();

    let newest_first = store.list(&ListingQuery::default()).await.unwrap();
    assert_eq!(
        newest_first.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(),
        vec!["440_11", "440_13", "440_12", "440_10"]
    );

    let page = store
        .list(&ListingQuery {
            sku: Some(SKU.into()),
            deleted: Some(false),
            order: SortOrder::Asc,
            order_by: ListingOrderBy::LastCheckedAt,
            page: 2,
            limit: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, "440_11");
    assert!(page.iter().all(|l| l.comment.is_none()));

    let deleted = store.get("440_13").await.unwrap().unwrap();
    assert!(deleted.is_deleted);
    assert_eq!(deleted.last_seen_at, at(20));
    assert!(!store.mark_deleted("440_404").await.unwrap());
}

#[tokio::test]
async fn concurrent_first_snapshots_apply_once() {
    let Some(db) = test_db().await else { return };
    let store = Arc::new(PgListingStore::new(db));

    let marker = SnapshotMarker {
        sku: SKU.into(),
        created_at: at(1_000),
    };
    let mut tasks = Vec::new();
    for ids in [["440_20", "440_21"], ["440_21", "440_20"]] {
        let store = Arc::clone(&store);
        let marker = marker.clone();
        tasks.push(tokio::spawn(async move {
            let batch = ids.iter().map(|id| listing(id, SKU, 1_000)).collect();
            store.apply_snapshot(marker, batch).await.unwrap()
        }));
    }

    let mut applied = 0;
    for task in tasks {
        match task.await.unwrap() {
            SnapshotOutcome::Applied { written } => {
                applied += 1;
                assert_eq!(written.len(), 2);
            }
            SnapshotOutcome::Stale { current } => assert_eq!(current, at(1_000)),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(store.snapshot_marker(SKU).await.unwrap(), Some(at(1_000)));
}
