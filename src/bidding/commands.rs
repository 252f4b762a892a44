/// Bid placement: the concurrency-critical path.
///
/// The store guard serializes everything between the auction snapshot and
/// the commit, so a bid validated against stale state is re-validated here
/// against whatever the previous holder committed. Effects are returned to
/// the caller and must only be dispatched after this function returns.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::{Auction, Bid};
use crate::bidding::{extension, validator};
use crate::clock::Clock;
use crate::effects::Effect;
use crate::error::EngineError;
use crate::store::{AuctionStore, AuctionWrite, NewBid};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Command & Receipt

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub user_id: i64,
    pub amount_minor: i64,
}

/// What a successful placement hands back: the persisted bid, the updated
/// auction snapshot, whether the deadline moved, and the bid count.
#[derive(Debug, Serialize)]
pub struct BidReceipt {
    pub bid: Bid,
    pub auction: Auction,
    pub extended: bool,
    pub bid_count: i64,
}

/// Read-only answer to "what would it take to bid right now".
#[derive(Debug, Serialize)]
pub struct MinBidQuote {
    pub current_bid: Option<i64>,
    pub min_bid: i64,
    pub increment_percent: i64,
}

// endregion: --- Command & Receipt

// region:    --- Service

pub struct BidPlacementService {
    store: Arc<dyn AuctionStore>,
    clock: Arc<dyn Clock>,
}

impl BidPlacementService {
    pub fn new(store: Arc<dyn AuctionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validate and commit one bid under the auction's exclusive lock.
    pub async fn place_bid(
        &self,
        cmd: PlaceBidCommand,
    ) -> Result<(BidReceipt, Vec<Effect>), EngineError> {
        if cmd.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be a positive integer".to_string(),
            ));
        }

        let mut guard = self.store.load_for_update(cmd.auction_id).await?;
        // Time is read under the lock so the window check and the extension
        // agree on a single `now`.
        let now = self.clock.now();
        let auction = guard.auction().clone();

        validator::validate_bid(&auction, cmd.amount_minor, now)?;

        let extended_to = extension::extended_deadline(auction.end_at, now);

        let mut updated = auction;
        updated.current_bid_minor = Some(cmd.amount_minor);
        updated.winner_id = Some(cmd.user_id);
        if let Some(new_end) = extended_to {
            updated.end_at = new_end;
        }

        let outcome = guard
            .commit(AuctionWrite {
                auction: updated.clone(),
                new_bid: Some(NewBid {
                    user_id: cmd.user_id,
                    amount_minor: cmd.amount_minor,
                    bid_at: now,
                }),
                product: None,
            })
            .await?;
        let bid = outcome
            .bid
            .ok_or_else(|| EngineError::Persistence("bid row missing after commit".to_string()))?;

        info!(
            "{:<12} --> bid {} accepted on auction {} at {}{}",
            "Command",
            bid.id,
            updated.id,
            cmd.amount_minor,
            if extended_to.is_some() {
                " (deadline extended)"
            } else {
                ""
            }
        );

        let mut effects = vec![Effect::Publish(AuctionEvent::BidPlaced {
            auction_id: updated.id,
            user_id: cmd.user_id,
            amount_minor: cmd.amount_minor,
            timestamp: now,
        })];
        if let Some(new_end) = extended_to {
            effects.push(Effect::Publish(AuctionEvent::TimeExtended {
                auction_id: updated.id,
                end_at: new_end,
                timestamp: now,
            }));
        }

        Ok((
            BidReceipt {
                bid,
                auction: updated,
                extended: extended_to.is_some(),
                bid_count: outcome.bid_count,
            },
            effects,
        ))
    }

    /// Current minimum without taking the lock.
    pub async fn min_bid(&self, auction_id: i64) -> Result<MinBidQuote, EngineError> {
        let auction = self.store.find_auction(auction_id).await?;
        Ok(MinBidQuote {
            current_bid: auction.current_bid_minor,
            min_bid: validator::min_bid_minor(&auction),
            increment_percent: validator::MIN_INCREMENT_PERCENT,
        })
    }
}

// endregion: --- Service
