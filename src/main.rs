// region:    --- Imports
use bidding_engine::auction::admin::AuctionAdmin;
use bidding_engine::bidding::commands::BidPlacementService;
use bidding_engine::clock::{Clock, SystemClock};
use bidding_engine::closer::AuctionCloser;
use bidding_engine::database::DatabaseManager;
use bidding_engine::effects::{EffectDispatcher, EventPublisher};
use bidding_engine::handlers::{app, AppState};
use bidding_engine::message_broker::{KafkaEventPublisher, KafkaManager, EVENTS_TOPIC};
use bidding_engine::scheduler::AuctionScheduler;
use bidding_engine::settlement::{HttpSettlementBridge, SettlementBridge};
use bidding_engine::store::postgres::PgAuctionStore;
use bidding_engine::store::AuctionStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

// endregion: --- Imports

// region:    --- Main

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let db_manager = Arc::new(DatabaseManager::new().await);
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> database initialization failed: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> database ready", "Main");

    let kafka_manager = Arc::new(KafkaManager::new());
    kafka_manager.create_topic(EVENTS_TOPIC, 5, 1).await?;
    info!("{:<12} --> Kafka ready", "Main");

    // Wiring: one store, one clock, one dispatcher, shared by every service.
    let store: Arc<dyn AuctionStore> = Arc::new(PgAuctionStore::new(db_manager.get_pool()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let publisher: Arc<dyn EventPublisher> = Arc::new(KafkaEventPublisher::new(
        kafka_manager.get_producer(),
        EVENTS_TOPIC,
    ));
    let settlement: Arc<dyn SettlementBridge> = Arc::new(HttpSettlementBridge::from_env());
    let dispatcher = Arc::new(EffectDispatcher::new(publisher, settlement));

    let bids = Arc::new(BidPlacementService::new(
        Arc::clone(&store),
        Arc::clone(&clock),
    ));
    let admin = Arc::new(AuctionAdmin::new(Arc::clone(&store), Arc::clone(&clock)));
    let closer = Arc::new(AuctionCloser::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        Arc::clone(&dispatcher),
    ));

    let scheduler = AuctionScheduler::new(Arc::clone(&closer));
    scheduler.start().await;

    let state = AppState {
        bids,
        admin,
        closer,
        dispatcher,
        store,
    };
    let routes_all = app(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}

// endregion: --- Main
