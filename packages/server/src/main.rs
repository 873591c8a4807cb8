use std::sync::Arc;

use anyhow::Context;
use mq::{BrokerPublisher, MqConfig, init_mq};
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::consumers;
use server::database::{ensure_indexes, init_db};
use server::ingest::Ingestor;
use server::recheck::{DbJobQueue, RecheckScheduler};
use server::state::AppState;
use server::store::PgListingStore;
use server::tradeoffer::TradeOfferUrlForwarder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    ensure_indexes(&db)
        .await
        .context("Failed to create indexes")?;
    info!("Database connected");

    let mq = Arc::new(
        init_mq(MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
        })
        .await
        .context("Failed to initialize MQ")?,
    );
    info!(
        listing_update_queue = %config.mq.listing_update_queue,
        listing_delete_queue = %config.mq.listing_delete_queue,
        snapshot_queue = %config.mq.snapshot_queue,
        "MQ connected"
    );

    let store = Arc::new(PgListingStore::new(db.clone()));
    let publisher = Arc::new(BrokerPublisher::new(Arc::clone(&mq), config.mq.clone()));
    let mut ingestor = Ingestor::new(store, publisher, config.ingest.app_id);
    if let Some(ref base_url) = config.services.tradeofferurl {
        let forwarder =
            TradeOfferUrlForwarder::new(base_url).context("Failed to build HTTP client")?;
        info!(endpoint = %forwarder.endpoint(), "Forwarding trade offer URLs");
        ingestor = ingestor.with_forwarder(forwarder);
    }
    let ingestor = Arc::new(ingestor);

    let router = consumers::build_router(Arc::clone(&ingestor), &config.mq);
    let concurrency = Some(config.mq.concurrency);
    // TODO: Store handle for graceful shutdown. Currently the consumers run until process exit.
    let _consumers = tokio::spawn(router.run(mq, concurrency));

    let scheduler = Arc::new(RecheckScheduler::new(Arc::new(DbJobQueue::new(db))));
    let state = AppState::new(ingestor, scheduler);
    let app = server::build_router(state, &config.server.cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
