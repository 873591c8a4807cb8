//! Broker routes feeding the ingestor.

use std::sync::Arc;

use common::event::{EVENT_EXCHANGE, SNAPSHOT_EXCHANGE, SNAPSHOT_ROUTING_KEY};
use common::{EventKind, ListingEvent, MqAppConfig, Snapshot};
use mq::{HandlerError, Router};
use tracing::error;

use crate::ingest::Ingestor;

/// Build the routing table: listing updates, listing deletes and snapshots,
/// each consumed from its own configured queue.
pub fn build_router(ingestor: Arc<Ingestor>, config: &MqAppConfig) -> Router {
    let updates = Arc::clone(&ingestor);
    let deletes = Arc::clone(&ingestor);
    let snapshots = ingestor;

    Router::new()
        .route(
            EVENT_EXCHANGE,
            EventKind::ListingUpdate.as_str(),
            &config.listing_update_queue,
            move |event: ListingEvent| {
                let ingestor = Arc::clone(&updates);
                async move { handle_event(&ingestor, event, false).await }
            },
        )
        .route(
            EVENT_EXCHANGE,
            EventKind::ListingDelete.as_str(),
            &config.listing_delete_queue,
            move |event: ListingEvent| {
                let ingestor = Arc::clone(&deletes);
                async move { handle_event(&ingestor, event, true).await }
            },
        )
        .route(
            SNAPSHOT_EXCHANGE,
            SNAPSHOT_ROUTING_KEY,
            &config.snapshot_queue,
            move |snapshot: Snapshot| {
                let ingestor = Arc::clone(&snapshots);
                async move {
                    let sku = snapshot.sku.clone();
                    ingestor.handle_snapshot(snapshot).await.map(drop).map_err(|e| {
                        error!(sku = %sku, error = %e, "Failed to handle snapshot");
                        HandlerError::from(e)
                    })
                }
            },
        )
}

async fn handle_event(
    ingestor: &Ingestor,
    event: ListingEvent,
    is_deleted: bool,
) -> Result<(), HandlerError> {
    let event_id = event.id.clone();
    let listing_id = event.payload.id.clone();

    ingestor
        .handle_event(event, is_deleted)
        .await
        .map(drop)
        .map_err(|e| {
            error!(
                event_id = %event_id,
                listing_id = %listing_id,
                error = %e,
                "Failed to handle listing event"
            );
            HandlerError::from(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ListingStore, MemoryListingStore};
    use common::notification::{LISTING_DELETED, LISTING_UPDATED, SNAPSHOT_HANDLED};
    use mq::{MemoryPublisher, RouteKey};
    use serde_json::{Value, json};

    const LISTING_ID: &str = "440_76561198012345678_0123456789abcdef0123456789abcdef";

    fn setup() -> (Router, Arc<MemoryListingStore>, Arc<MemoryPublisher>) {
        let store = Arc::new(MemoryListingStore::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let ingestor = Arc::new(Ingestor::new(store.clone(), publisher.clone(), 440));
        let router = build_router(ingestor, &MqAppConfig::default());
        (router, store, publisher)
    }

    fn event(id: &str, kind: &str) -> Value {
        json!({
            "id": id,
            "event": kind,
            "payload": {
                "id": LISTING_ID,
                "appid": 440,
                "listedAt": 1000,
                "bumpedAt": 1000,
                "currencies": { "keys": 2, "metal": 1.5 },
                "intent": "sell",
                "item": { "appid": 440, "id": "1234", "defindex": 5021, "quality": { "id": 6 }, "craftable": true },
                "user": { "id": "76561198012345678" }
            }
        })
    }

    #[test]
    fn test_routes_use_configured_queues() {
        let (router, _, _) = setup();
        let mut queues: Vec<_> = router.routes().map(|r| r.queue.clone()).collect();
        queues.sort();
        assert_eq!(
            queues,
            vec![
                "deleteListingsFromEvents",
                "saveListingsFromEvents",
                "saveListingsFromSnapshots"
            ]
        );
    }

    #[tokio::test]
    async fn test_update_then_delete() {
        let (router, store, publisher) = setup();

        router
            .dispatch(
                &RouteKey::new(EVENT_EXCHANGE, "listing-update"),
                event("5f5e1000aaaaaaaaaaaaaaaa", "listing-update"),
            )
            .await
            .unwrap();
        router
            .dispatch(
                &RouteKey::new(EVENT_EXCHANGE, "listing-delete"),
                event("5f5e2000aaaaaaaaaaaaaaaa", "listing-delete"),
            )
            .await
            .unwrap();

        let stored = store.get(LISTING_ID).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert_eq!(publisher.destinations(), vec![LISTING_UPDATED, LISTING_DELETED]);
    }

    #[tokio::test]
    async fn test_bad_event_id_is_dropped() {
        let (router, store, _) = setup();
        let err = router
            .dispatch(
                &RouteKey::new(EVENT_EXCHANGE, "listing-update"),
                event("not-an-object-id", "listing-update"),
            )
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_route() {
        let (router, _, publisher) = setup();
        router
            .dispatch(
                &RouteKey::new(SNAPSHOT_EXCHANGE, SNAPSHOT_ROUTING_KEY),
                json!({ "sku": "5021;6", "createdAt": "2020-09-13T12:26:40Z", "listings": [] }),
            )
            .await
            .unwrap();
        assert_eq!(publisher.destinations(), vec![SNAPSHOT_HANDLED]);
    }
}
