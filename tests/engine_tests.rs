//! Engine-level tests against the in-memory store with a manually driven
//! clock, covering the bid-placement invariants, anti-sniping extension,
//! the closing sweep, and the admin state machine.

use async_trait::async_trait;
use bidding_engine::auction::admin::AuctionAdmin;
use bidding_engine::auction::events::AuctionEvent;
use bidding_engine::auction::model::{AuctionStatus, Product};
use bidding_engine::bidding::commands::{BidPlacementService, PlaceBidCommand};
use bidding_engine::clock::{Clock, ManualClock};
use bidding_engine::closer::AuctionCloser;
use bidding_engine::effects::{Effect, EffectDispatcher, EventPublisher};
use bidding_engine::error::EngineError;
use bidding_engine::settlement::SettlementBridge;
use bidding_engine::store::memory::MemoryAuctionStore;
use bidding_engine::store::{AuctionStore, AuctionWrite, NewAuction, NewBid};
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};

// region:    --- Test Doubles & Harness

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<AuctionEvent>>,
}

impl RecordingPublisher {
    fn events(&self) -> Vec<AuctionEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &AuctionEvent) -> Result<(), String> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingBridge {
    settlements: Mutex<Vec<(i64, i64, i64)>>,
}

impl RecordingBridge {
    fn settlements(&self) -> Vec<(i64, i64, i64)> {
        self.settlements.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettlementBridge for RecordingBridge {
    async fn create_auction(
        &self,
        _auction: &bidding_engine::auction::model::Auction,
    ) -> Result<(), String> {
        Ok(())
    }

    async fn sync_auction(
        &self,
        _auction: &bidding_engine::auction::model::Auction,
    ) -> Result<(), String> {
        Ok(())
    }

    async fn begin_settlement(
        &self,
        auction_id: i64,
        winner_id: i64,
        amount_minor: i64,
    ) -> Result<(), String> {
        self.settlements
            .lock()
            .unwrap()
            .push((auction_id, winner_id, amount_minor));
        Ok(())
    }
}

struct Harness {
    store: Arc<MemoryAuctionStore>,
    clock: Arc<ManualClock>,
    bids: Arc<BidPlacementService>,
    admin: AuctionAdmin,
    closer: AuctionCloser,
    publisher: Arc<RecordingPublisher>,
    bridge: Arc<RecordingBridge>,
}

fn harness_with(store: Arc<MemoryAuctionStore>) -> Harness {
    let clock = Arc::new(ManualClock::at(Utc::now()));
    let publisher = Arc::new(RecordingPublisher::default());
    let bridge = Arc::new(RecordingBridge::default());
    let store_dyn: Arc<dyn AuctionStore> = store.clone();
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let dispatcher = Arc::new(EffectDispatcher::new(publisher.clone(), bridge.clone()));

    Harness {
        bids: Arc::new(BidPlacementService::new(
            store_dyn.clone(),
            clock_dyn.clone(),
        )),
        admin: AuctionAdmin::new(store_dyn.clone(), clock_dyn.clone()),
        closer: AuctionCloser::new(store_dyn, clock_dyn, dispatcher),
        store,
        clock,
        publisher,
        bridge,
    }
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryAuctionStore::new());
    store
        .insert_product(Product {
            id: 1,
            name: "vintage lens".to_string(),
            stock_qty: 3,
            in_auction: false,
        })
        .await;
    harness_with(store)
}

/// Active auction that opened an hour ago and ends `ends_in` from now.
async fn active_auction(h: &Harness, starting_bid_minor: i64, ends_in: Duration) -> i64 {
    let now = h.clock.now();
    h.store
        .create_auction(NewAuction {
            product_id: 1,
            start_at: now - Duration::hours(1),
            end_at: now + ends_in,
            starting_bid_minor,
            reserve_price_minor: None,
            status: AuctionStatus::Active,
            created_at: now - Duration::hours(1),
        })
        .await
        .unwrap()
        .id
}

fn bid(auction_id: i64, user_id: i64, amount_minor: i64) -> PlaceBidCommand {
    PlaceBidCommand {
        auction_id,
        user_id,
        amount_minor,
    }
}

// endregion: --- Test Doubles & Harness

// region:    --- Bid Placement

#[tokio::test]
async fn first_bid_opens_at_the_starting_price() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::hours(2)).await;

    let (receipt, effects) = h.bids.place_bid(bid(auction_id, 1, 10_000)).await.unwrap();

    assert_eq!(receipt.bid.amount_minor, 10_000);
    assert_eq!(receipt.auction.current_bid_minor, Some(10_000));
    assert_eq!(receipt.auction.winner_id, Some(1));
    assert_eq!(receipt.bid_count, 1);
    assert!(!receipt.extended);
    assert_eq!(effects.len(), 1);
    assert!(matches!(
        &effects[0],
        Effect::Publish(AuctionEvent::BidPlaced { amount_minor: 10_000, .. })
    ));
}

#[tokio::test]
async fn increment_boundary_is_exact() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::hours(2)).await;
    h.bids.place_bid(bid(auction_id, 1, 10_000)).await.unwrap();

    // 5% of 10000 is 500: 10499 is short, 10500 is on the line.
    let err = h
        .bids
        .place_bid(bid(auction_id, 2, 10_499))
        .await
        .unwrap_err();
    match err {
        EngineError::BidTooLow {
            min_bid_minor,
            current_bid_minor,
            ..
        } => {
            assert_eq!(min_bid_minor, 10_500);
            assert_eq!(current_bid_minor, Some(10_000));
        }
        other => panic!("expected BidTooLow, got {other:?}"),
    }

    let (receipt, _) = h.bids.place_bid(bid(auction_id, 2, 10_500)).await.unwrap();
    assert_eq!(receipt.auction.current_bid_minor, Some(10_500));
    assert_eq!(receipt.auction.winner_id, Some(2));
}

#[tokio::test]
async fn bids_at_or_after_the_deadline_are_rejected() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::seconds(100)).await;

    h.clock.advance(Duration::seconds(100));
    let err = h
        .bids
        .place_bid(bid(auction_id, 1, 50_000))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ALREADY_ENDED");

    let auction = h.store.find_auction(auction_id).await.unwrap();
    assert_eq!(auction.current_bid_minor, None);
}

#[tokio::test]
async fn unknown_auction_is_reported_as_not_found() {
    let h = harness().await;
    let err = h.bids.place_bid(bid(999, 1, 10_000)).await.unwrap_err();
    assert!(matches!(err, EngineError::AuctionNotFound(999)));
}

// endregion: --- Bid Placement

// region:    --- Anti-Sniping

#[tokio::test]
async fn late_bids_keep_rearming_the_deadline() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::seconds(200)).await;

    let (receipt, effects) = h.bids.place_bid(bid(auction_id, 1, 10_000)).await.unwrap();
    assert!(receipt.extended);
    assert_eq!(receipt.auction.end_at, h.clock.now() + Duration::seconds(300));
    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::Publish(AuctionEvent::TimeExtended { .. })
    )));

    // 100 seconds later the new deadline is 200 seconds out: still inside
    // the window, so the next bid extends again.
    h.clock.advance(Duration::seconds(100));
    let (receipt, _) = h.bids.place_bid(bid(auction_id, 2, 10_500)).await.unwrap();
    assert!(receipt.extended);
    assert_eq!(receipt.auction.end_at, h.clock.now() + Duration::seconds(300));
}

#[tokio::test]
async fn early_bids_leave_the_deadline_alone() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::hours(2)).await;
    let end_before = h.store.find_auction(auction_id).await.unwrap().end_at;

    let (receipt, effects) = h.bids.place_bid(bid(auction_id, 1, 10_000)).await.unwrap();
    assert!(!receipt.extended);
    assert_eq!(receipt.auction.end_at, end_before);
    assert_eq!(effects.len(), 1);
}

// endregion:  --- Anti-Sniping

// region:    --- Concurrency

#[tokio::test]
async fn concurrent_bids_stay_monotonic_under_the_lock() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::hours(2)).await;

    let mut handles = Vec::new();
    for i in 0..40 {
        let bids = Arc::clone(&h.bids);
        handles.push(tokio::spawn(async move {
            bids.place_bid(bid(auction_id, i + 1, 10_000 + i * 1_000))
                .await
        }));
    }

    let mut accepted = Vec::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok((receipt, _)) => accepted.push(receipt.bid.amount_minor),
            Err(EngineError::BidTooLow { .. }) => rejected += 1,
            Err(other) => panic!("unexpected rejection: {other:?}"),
        }
    }

    assert!(!accepted.is_empty());
    assert_eq!(accepted.len() + rejected, 40);

    // The final price is the highest accepted amount, and the persisted
    // history is non-decreasing in commit order.
    let auction = h.store.find_auction(auction_id).await.unwrap();
    assert_eq!(
        auction.current_bid_minor,
        Some(*accepted.iter().max().unwrap())
    );

    let mut history = h.store.bid_history(auction_id, 100, 0).await.unwrap();
    history.reverse(); // oldest first
    assert_eq!(history.len(), accepted.len());
    for pair in history.windows(2) {
        assert!(pair[1].amount_minor >= pair[0].amount_minor);
    }
    assert_eq!(
        history.last().unwrap().amount_minor,
        auction.current_bid_minor.unwrap()
    );
}

#[tokio::test]
async fn lock_timeout_surfaces_as_retryable_contention() {
    let store = Arc::new(MemoryAuctionStore::with_lock_timeout(
        std::time::Duration::from_millis(50),
    ));
    store
        .insert_product(Product {
            id: 1,
            name: "vintage lens".to_string(),
            stock_qty: 1,
            in_auction: false,
        })
        .await;
    let h = harness_with(store);
    let auction_id = active_auction(&h, 10_000, Duration::hours(2)).await;

    // Park a guard on the auction so the bid cannot get the lock.
    let _guard = h.store.load_for_update(auction_id).await.unwrap();

    let err = h
        .bids
        .place_bid(bid(auction_id, 1, 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Contention));
}

// endregion: --- Concurrency

// region:    --- Closing Sweep

#[tokio::test]
async fn closing_assigns_the_winner_and_starts_settlement() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::hours(1)).await;
    h.bids.place_bid(bid(auction_id, 1, 10_000)).await.unwrap();
    h.bids.place_bid(bid(auction_id, 2, 11_000)).await.unwrap();

    h.clock.advance(Duration::hours(2));
    assert_eq!(h.closer.close_ended().await.unwrap(), 1);

    let auction = h.store.find_auction(auction_id).await.unwrap();
    assert_eq!(auction.status, AuctionStatus::Finished);
    assert_eq!(auction.winner_id, Some(2));
    assert_eq!(auction.current_bid_minor, Some(11_000));

    let product = h.store.product(1).await.unwrap();
    assert!(!product.in_auction);
    assert_eq!(product.stock_qty, 2);

    assert_eq!(h.bridge.settlements(), vec![(auction_id, 2, 11_000)]);
    assert!(h.publisher.events().iter().any(|e| matches!(
        e,
        AuctionEvent::AuctionClosed {
            winner_id: Some(2),
            amount_minor: Some(11_000),
            ..
        }
    )));
}

#[tokio::test]
async fn closing_twice_is_idempotent() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::hours(1)).await;
    h.bids.place_bid(bid(auction_id, 1, 10_000)).await.unwrap();

    h.clock.advance(Duration::hours(2));
    assert_eq!(h.closer.close_ended().await.unwrap(), 1);
    let first_pass = h.store.find_auction(auction_id).await.unwrap();

    // Second sweep: nothing newly processed, nothing re-settled.
    assert_eq!(h.closer.close_ended().await.unwrap(), 0);
    let second_pass = h.store.find_auction(auction_id).await.unwrap();
    assert_eq!(second_pass.status, first_pass.status);
    assert_eq!(second_pass.winner_id, first_pass.winner_id);
    assert_eq!(second_pass.current_bid_minor, first_pass.current_bid_minor);
    assert_eq!(h.bridge.settlements().len(), 1);
    assert_eq!(h.store.product(1).await.unwrap().stock_qty, 2);
}

#[tokio::test]
async fn closing_without_bids_finishes_with_no_winner() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::hours(1)).await;

    h.clock.advance(Duration::hours(2));
    assert_eq!(h.closer.close_ended().await.unwrap(), 1);

    let auction = h.store.find_auction(auction_id).await.unwrap();
    assert_eq!(auction.status, AuctionStatus::Finished);
    assert_eq!(auction.winner_id, None);
    assert_eq!(auction.current_bid_minor, None);

    // No winner: stock untouched, settlement skipped.
    assert_eq!(h.store.product(1).await.unwrap().stock_qty, 3);
    assert!(h.bridge.settlements().is_empty());
    assert!(h.publisher.events().iter().any(|e| matches!(
        e,
        AuctionEvent::AuctionClosed { winner_id: None, .. }
    )));
}

#[tokio::test]
async fn equal_amounts_go_to_the_earliest_bidder() {
    let h = harness().await;
    let auction_id = active_auction(&h, 5_000, Duration::hours(1)).await;

    // Admin-inserted rows can tie; append two equal bids directly, skipping
    // the increment rule.
    let t1 = h.clock.now();
    let t2 = t1 + Duration::seconds(30);
    for (user_id, bid_at) in [(7, t1), (8, t2)] {
        let mut guard = h.store.load_for_update(auction_id).await.unwrap();
        let mut auction = guard.auction().clone();
        auction.current_bid_minor = Some(5_000);
        auction.winner_id = Some(user_id);
        guard
            .commit(AuctionWrite {
                auction,
                new_bid: Some(NewBid {
                    user_id,
                    amount_minor: 5_000,
                    bid_at,
                }),
                product: None,
            })
            .await
            .unwrap();
    }

    h.clock.advance(Duration::hours(2));
    assert_eq!(h.closer.close_ended().await.unwrap(), 1);
    let auction = h.store.find_auction(auction_id).await.unwrap();
    assert_eq!(auction.winner_id, Some(7));
}

#[tokio::test]
async fn pending_auctions_open_once_their_start_time_passes() {
    let h = harness().await;
    let now = h.clock.now();
    let due = h
        .store
        .create_auction(NewAuction {
            product_id: 1,
            start_at: now - Duration::seconds(10),
            end_at: now + Duration::hours(1),
            starting_bid_minor: 10_000,
            reserve_price_minor: None,
            status: AuctionStatus::Pending,
            created_at: now,
        })
        .await
        .unwrap();
    let not_due = h
        .store
        .create_auction(NewAuction {
            product_id: 1,
            start_at: now + Duration::hours(1),
            end_at: now + Duration::hours(2),
            starting_bid_minor: 10_000,
            reserve_price_minor: None,
            status: AuctionStatus::Pending,
            created_at: now,
        })
        .await
        .unwrap();

    assert_eq!(h.closer.activate_pending().await.unwrap(), 1);
    assert_eq!(
        h.store.find_auction(due.id).await.unwrap().status,
        AuctionStatus::Active
    );
    assert_eq!(
        h.store.find_auction(not_due.id).await.unwrap().status,
        AuctionStatus::Pending
    );
}

// endregion: --- Closing Sweep

// region:    --- Admin State Machine

#[tokio::test]
async fn paused_auctions_reject_bids_until_resumed() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::hours(2)).await;

    h.admin.pause(auction_id).await.unwrap();
    assert!(!h.store.product(1).await.unwrap().in_auction);

    let err = h
        .bids
        .place_bid(bid(auction_id, 1, 10_000))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_ACTIVE");

    h.admin.resume(auction_id).await.unwrap();
    assert!(h.store.product(1).await.unwrap().in_auction);
    assert!(h.bids.place_bid(bid(auction_id, 1, 10_000)).await.is_ok());
}

#[tokio::test]
async fn cancelling_keeps_the_bid_history() {
    let h = harness().await;
    let auction_id = active_auction(&h, 10_000, Duration::hours(2)).await;
    h.bids.place_bid(bid(auction_id, 1, 10_000)).await.unwrap();

    let (auction, _) = h.admin.cancel(auction_id).await.unwrap();
    assert_eq!(auction.status, AuctionStatus::Cancelled);
    assert!(!h.store.product(1).await.unwrap().in_auction);
    assert_eq!(h.store.bid_history(auction_id, 10, 0).await.unwrap().len(), 1);

    // Terminal: no bids, no second cancel.
    assert_eq!(
        h.bids
            .place_bid(bid(auction_id, 2, 20_000))
            .await
            .unwrap_err()
            .code(),
        "NOT_ACTIVE"
    );
    assert!(matches!(
        h.admin.cancel(auction_id).await.unwrap_err(),
        EngineError::InvalidTransition { .. }
    ));
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let h = harness().await;
    let now = h.clock.now();
    let pending = h
        .store
        .create_auction(NewAuction {
            product_id: 1,
            start_at: now + Duration::hours(1),
            end_at: now + Duration::hours(2),
            starting_bid_minor: 10_000,
            reserve_price_minor: None,
            status: AuctionStatus::Pending,
            created_at: now,
        })
        .await
        .unwrap();

    assert!(matches!(
        h.admin.pause(pending.id).await.unwrap_err(),
        EngineError::InvalidTransition { .. }
    ));
    assert!(matches!(
        h.admin.resume(pending.id).await.unwrap_err(),
        EngineError::InvalidTransition { .. }
    ));

    let (activated, _) = h.admin.activate(pending.id).await.unwrap();
    assert_eq!(activated.status, AuctionStatus::Active);
}

// endregion: --- Admin State Machine
