/// Persistence seam for auctions and bids.
///
/// `load_for_update` hands back a guard holding an exclusive per-auction
/// lock; `commit` applies the auction update, the optional bid insert and
/// the optional product bookkeeping as one atomic write. Dropping a guard
/// without committing abandons the write. The closing sweep and bid
/// placement go through the same guard, so neither can observe state the
/// other is mid-mutation on.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus, Bid};
use crate::error::EngineError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// endregion: --- Imports

pub mod memory;
pub mod postgres;
pub mod queries;

/// Bound on waiting for the per-auction lock; exceeding it surfaces as a
/// retryable contention error instead of piling requests up behind a
/// sniping burst.
pub const LOCK_TIMEOUT_MS: u64 = 2_000;

/// Fields for a new auction row. `current_bid_minor` and `winner_id` always
/// start unset.
#[derive(Debug, Clone)]
pub struct NewAuction {
    pub product_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub starting_bid_minor: i64,
    pub reserve_price_minor: Option<i64>,
    pub status: AuctionStatus,
    pub created_at: DateTime<Utc>,
}

/// Bid row to append inside a commit.
#[derive(Debug, Clone)]
pub struct NewBid {
    pub user_id: i64,
    pub amount_minor: i64,
    pub bid_at: DateTime<Utc>,
}

/// Product bookkeeping rolled into an auction commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFlagUpdate {
    /// Mark the product as in auction (resume).
    Set,
    /// Clear the in-auction flag (pause, cancel).
    Clear,
    /// Clear the flag and take one unit of stock, skipping products that
    /// are already out of stock (winning close).
    ClearAndTakeStock,
}

/// One atomic write against a locked auction.
#[derive(Debug, Clone)]
pub struct AuctionWrite {
    pub auction: Auction,
    pub new_bid: Option<NewBid>,
    pub product: Option<ProductFlagUpdate>,
}

/// What a commit produced: the persisted bid (when one was appended) and
/// the auction's bid count after the write.
#[derive(Debug)]
pub struct SaveOutcome {
    pub bid: Option<Bid>,
    pub bid_count: i64,
}

/// Exclusive hold on a single auction for a validate-then-write cycle.
#[async_trait]
pub trait AuctionGuard: Send {
    /// Snapshot read under the lock.
    fn auction(&self) -> &Auction;

    /// Highest bid for the locked auction: amount descending, ties broken
    /// by earliest `bid_at`, then lowest id.
    async fn highest_bid(&mut self) -> Result<Option<Bid>, EngineError>;

    /// Apply the write and release the lock. Any error rolls the whole
    /// write back; no partial state survives.
    async fn commit(&mut self, write: AuctionWrite) -> Result<SaveOutcome, EngineError>;
}

#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// Insert an auction and mark its product as in auction.
    async fn create_auction(&self, new: NewAuction) -> Result<Auction, EngineError>;

    async fn find_auction(&self, auction_id: i64) -> Result<Auction, EngineError>;

    /// Remove an auction (bids cascade) and clear the product flag.
    async fn delete_auction(&self, auction_id: i64) -> Result<(), EngineError>;

    /// Bid history, newest first.
    async fn bid_history(
        &self,
        auction_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bid>, EngineError>;

    /// Acquire the per-auction lock, bounded by the lock timeout.
    async fn load_for_update(&self, auction_id: i64)
        -> Result<Box<dyn AuctionGuard>, EngineError>;

    /// Ids of active auctions whose `end_at` has passed.
    async fn expired_active_ids(&self, now: DateTime<Utc>) -> Result<Vec<i64>, EngineError>;

    /// Promote pending auctions whose `start_at` has elapsed; returns how
    /// many were opened.
    async fn activate_pending(&self, now: DateTime<Utc>) -> Result<u64, EngineError>;
}
