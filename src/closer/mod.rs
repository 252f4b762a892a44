/// Closing sweep. Finds active auctions past their deadline, settles each
/// one under the same per-auction lock bid placement uses, and stays
/// idempotent: an auction already finished (or extended meanwhile) is
/// skipped after the re-check under the lock.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::AuctionStatus;
use crate::clock::Clock;
use crate::effects::{Effect, EffectDispatcher};
use crate::error::EngineError;
use crate::store::{AuctionStore, AuctionWrite, ProductFlagUpdate};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

pub struct AuctionCloser {
    store: Arc<dyn AuctionStore>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<EffectDispatcher>,
}

impl AuctionCloser {
    pub fn new(
        store: Arc<dyn AuctionStore>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<EffectDispatcher>,
    ) -> Self {
        Self {
            store,
            clock,
            dispatcher,
        }
    }

    /// Promote pending auctions whose start time has elapsed.
    pub async fn activate_pending(&self) -> Result<u64, EngineError> {
        let opened = self.store.activate_pending(self.clock.now()).await?;
        if opened > 0 {
            info!("{:<12} --> opened {} scheduled auction(s)", "Closer", opened);
        }
        Ok(opened)
    }

    /// Close every expired active auction. Returns how many were closed;
    /// one auction's failure never aborts the rest of the sweep.
    pub async fn close_ended(&self) -> Result<usize, EngineError> {
        let now = self.clock.now();
        let ids = self.store.expired_active_ids(now).await?;
        let mut processed = 0;

        for auction_id in ids {
            match self.close_one(auction_id, now).await {
                Ok(Some(effects)) => {
                    processed += 1;
                    // Strictly post-commit; the lock is already released.
                    self.dispatcher.dispatch(&effects).await;
                }
                Ok(None) => {
                    debug!(
                        "{:<12} --> auction {} no longer closable, skipping",
                        "Closer", auction_id
                    );
                }
                Err(EngineError::Contention) => {
                    warn!(
                        "{:<12} --> auction {} locked by a live bid, deferring to next sweep",
                        "Closer", auction_id
                    );
                }
                Err(e) => {
                    error!(
                        "{:<12} --> failed to close auction {}: {}",
                        "Closer", auction_id, e
                    );
                }
            }
        }

        Ok(processed)
    }

    /// Close a single auction under its lock. `Ok(None)` means the re-check
    /// found nothing to do (already finished, or a late bid extended it).
    async fn close_one(
        &self,
        auction_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<Effect>>, EngineError> {
        let mut guard = self.store.load_for_update(auction_id).await?;
        let auction = guard.auction().clone();

        if auction.status != AuctionStatus::Active || auction.end_at > now {
            return Ok(None);
        }

        let highest = guard.highest_bid().await?;

        let mut updated = auction;
        updated.status = AuctionStatus::Finished;

        let mut effects = Vec::new();
        let product_update = match &highest {
            Some(winning_bid) => {
                updated.winner_id = Some(winning_bid.user_id);
                updated.current_bid_minor = Some(winning_bid.amount_minor);
                effects.push(Effect::Publish(AuctionEvent::AuctionClosed {
                    auction_id: updated.id,
                    winner_id: Some(winning_bid.user_id),
                    amount_minor: Some(winning_bid.amount_minor),
                    timestamp: now,
                }));
                effects.push(Effect::BeginSettlement {
                    auction_id: updated.id,
                    winner_id: winning_bid.user_id,
                    amount_minor: winning_bid.amount_minor,
                });
                ProductFlagUpdate::ClearAndTakeStock
            }
            None => {
                updated.winner_id = None;
                effects.push(Effect::Publish(AuctionEvent::AuctionClosed {
                    auction_id: updated.id,
                    winner_id: None,
                    amount_minor: None,
                    timestamp: now,
                }));
                info!(
                    "{:<12} --> auction {} closed without bids, skipping settlement",
                    "Closer", updated.id
                );
                ProductFlagUpdate::Clear
            }
        };

        guard
            .commit(AuctionWrite {
                auction: updated.clone(),
                new_bid: None,
                product: Some(product_update),
            })
            .await?;

        info!(
            "{:<12} --> auction {} finished, winner: {:?}",
            "Closer", updated.id, updated.winner_id
        );
        Ok(Some(effects))
    }
}
