/// Administrative auction operations. Outside the bidding hot path, but
/// every mutation still goes through the per-auction lock and the state
/// machine, and hands the settlement collaborator a sync effect.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus};
use crate::clock::Clock;
use crate::effects::Effect;
use crate::error::EngineError;
use crate::store::{AuctionStore, AuctionWrite, NewAuction, ProductFlagUpdate};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Requests

#[derive(Debug, Deserialize)]
pub struct CreateAuctionRequest {
    pub product_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub starting_bid_minor: i64,
    pub reserve_price_minor: Option<i64>,
    pub status: Option<AuctionStatus>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateAuctionRequest {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub starting_bid_minor: Option<i64>,
    pub reserve_price_minor: Option<i64>,
}

// endregion: --- Requests

// region:    --- Admin Service

pub struct AuctionAdmin {
    store: Arc<dyn AuctionStore>,
    clock: Arc<dyn Clock>,
}

impl AuctionAdmin {
    pub fn new(store: Arc<dyn AuctionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create(
        &self,
        req: CreateAuctionRequest,
    ) -> Result<(Auction, Vec<Effect>), EngineError> {
        if req.end_at <= req.start_at {
            return Err(EngineError::Validation(
                "end_at must be after start_at".to_string(),
            ));
        }
        if req.starting_bid_minor <= 0 {
            return Err(EngineError::Validation(
                "starting_bid_minor must be a positive integer".to_string(),
            ));
        }
        if matches!(req.reserve_price_minor, Some(reserve) if reserve <= 0) {
            return Err(EngineError::Validation(
                "reserve_price_minor must be a positive integer".to_string(),
            ));
        }
        let status = req.status.unwrap_or(AuctionStatus::Pending);
        if !matches!(status, AuctionStatus::Pending | AuctionStatus::Active) {
            return Err(EngineError::Validation(
                "new auctions must start out pending or active".to_string(),
            ));
        }

        let auction = self
            .store
            .create_auction(NewAuction {
                product_id: req.product_id,
                start_at: req.start_at,
                end_at: req.end_at,
                starting_bid_minor: req.starting_bid_minor,
                reserve_price_minor: req.reserve_price_minor,
                status,
                created_at: self.clock.now(),
            })
            .await?;

        info!(
            "{:<12} --> auction {} created for product {}",
            "Admin", auction.id, auction.product_id
        );
        Ok((auction.clone(), vec![Effect::RegisterAuction(auction)]))
    }

    pub async fn update(
        &self,
        auction_id: i64,
        req: UpdateAuctionRequest,
    ) -> Result<(Auction, Vec<Effect>), EngineError> {
        let mut guard = self.store.load_for_update(auction_id).await?;
        let mut auction = guard.auction().clone();

        if auction.status.is_terminal() {
            return Err(EngineError::Validation(
                "auction is already closed".to_string(),
            ));
        }

        if let Some(start_at) = req.start_at {
            auction.start_at = start_at;
        }
        if let Some(end_at) = req.end_at {
            auction.end_at = end_at;
        }
        if let Some(starting_bid_minor) = req.starting_bid_minor {
            if starting_bid_minor <= 0 {
                return Err(EngineError::Validation(
                    "starting_bid_minor must be a positive integer".to_string(),
                ));
            }
            auction.starting_bid_minor = starting_bid_minor;
        }
        if let Some(reserve) = req.reserve_price_minor {
            if reserve <= 0 {
                return Err(EngineError::Validation(
                    "reserve_price_minor must be a positive integer".to_string(),
                ));
            }
            auction.reserve_price_minor = Some(reserve);
        }
        if auction.end_at <= auction.start_at {
            return Err(EngineError::Validation(
                "end_at must be after start_at".to_string(),
            ));
        }

        guard
            .commit(AuctionWrite {
                auction: auction.clone(),
                new_bid: None,
                product: None,
            })
            .await?;

        Ok((auction.clone(), vec![Effect::SyncAuction(auction)]))
    }

    pub async fn delete(&self, auction_id: i64) -> Result<(), EngineError> {
        self.store.delete_auction(auction_id).await?;
        info!("{:<12} --> auction {} deleted", "Admin", auction_id);
        Ok(())
    }

    /// Explicit `pending -> active`.
    pub async fn activate(&self, auction_id: i64) -> Result<(Auction, Vec<Effect>), EngineError> {
        self.transition(auction_id, AuctionStatus::Pending, AuctionStatus::Active, None)
            .await
    }

    /// `active -> paused`; the product leaves the in-auction pool.
    pub async fn pause(&self, auction_id: i64) -> Result<(Auction, Vec<Effect>), EngineError> {
        self.transition(
            auction_id,
            AuctionStatus::Active,
            AuctionStatus::Paused,
            Some(ProductFlagUpdate::Clear),
        )
        .await
    }

    /// `paused -> active`; the product flag is restored.
    pub async fn resume(&self, auction_id: i64) -> Result<(Auction, Vec<Effect>), EngineError> {
        self.transition(
            auction_id,
            AuctionStatus::Paused,
            AuctionStatus::Active,
            Some(ProductFlagUpdate::Set),
        )
        .await
    }

    /// Any non-terminal state -> cancelled. Bid history is kept.
    pub async fn cancel(&self, auction_id: i64) -> Result<(Auction, Vec<Effect>), EngineError> {
        let mut guard = self.store.load_for_update(auction_id).await?;
        let mut auction = guard.auction().clone();
        let from = auction.status;

        if !from.can_transition(AuctionStatus::Cancelled) {
            return Err(EngineError::InvalidTransition {
                from,
                to: AuctionStatus::Cancelled,
            });
        }

        auction.status = AuctionStatus::Cancelled;
        guard
            .commit(AuctionWrite {
                auction: auction.clone(),
                new_bid: None,
                product: Some(ProductFlagUpdate::Clear),
            })
            .await?;

        info!("{:<12} --> auction {} cancelled", "Admin", auction.id);
        Ok((auction.clone(), vec![Effect::SyncAuction(auction)]))
    }

    async fn transition(
        &self,
        auction_id: i64,
        required_from: AuctionStatus,
        to: AuctionStatus,
        product: Option<ProductFlagUpdate>,
    ) -> Result<(Auction, Vec<Effect>), EngineError> {
        let mut guard = self.store.load_for_update(auction_id).await?;
        let mut auction = guard.auction().clone();
        let from = auction.status;

        if from != required_from || !from.can_transition(to) {
            return Err(EngineError::InvalidTransition { from, to });
        }

        auction.status = to;
        guard
            .commit(AuctionWrite {
                auction: auction.clone(),
                new_bid: None,
                product,
            })
            .await?;

        info!(
            "{:<12} --> auction {} moved {} -> {}",
            "Admin", auction.id, from, to
        );
        Ok((auction.clone(), vec![Effect::SyncAuction(auction)]))
    }
}

// endregion: --- Admin Service
