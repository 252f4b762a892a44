/// Postgres-backed store. The per-auction lock is the auction row itself:
/// `SELECT ... FOR UPDATE` inside a transaction, bounded by a local
/// `lock_timeout` so contended requests fail fast instead of queueing.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus, Bid};
use crate::error::EngineError;
use crate::store::{
    queries, AuctionGuard, AuctionStore, AuctionWrite, NewAuction, ProductFlagUpdate, SaveOutcome,
    LOCK_TIMEOUT_MS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::Postgres;
use sqlx::{PgPool, Transaction};
use std::sync::Arc;

// endregion: --- Imports

// region:    --- Row Mapping

#[derive(sqlx::FromRow)]
struct AuctionRow {
    id: i64,
    product_id: i64,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    starting_bid_minor: i64,
    reserve_price_minor: Option<i64>,
    current_bid_minor: Option<i64>,
    winner_id: Option<i64>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuctionRow> for Auction {
    type Error = EngineError;

    fn try_from(row: AuctionRow) -> Result<Self, Self::Error> {
        let status = AuctionStatus::parse(&row.status).ok_or_else(|| {
            EngineError::Persistence(format!("unknown auction status '{}'", row.status))
        })?;
        Ok(Auction {
            id: row.id,
            product_id: row.product_id,
            start_at: row.start_at,
            end_at: row.end_at,
            starting_bid_minor: row.starting_bid_minor,
            reserve_price_minor: row.reserve_price_minor,
            current_bid_minor: row.current_bid_minor,
            winner_id: row.winner_id,
            status,
            created_at: row.created_at,
        })
    }
}

// endregion: --- Row Mapping

// region:    --- Store

pub struct PgAuctionStore {
    pool: Arc<PgPool>,
}

impl PgAuctionStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Lock waits that exceed `lock_timeout` come back as SQLSTATE 55P03.
fn map_lock_err(err: sqlx::Error) -> EngineError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("55P03") {
            return EngineError::Contention;
        }
    }
    EngineError::persistence(err)
}

#[async_trait]
impl AuctionStore for PgAuctionStore {
    async fn create_auction(&self, new: NewAuction) -> Result<Auction, EngineError> {
        let mut tx = self.pool.begin().await.map_err(EngineError::persistence)?;

        let product: Option<i64> = sqlx::query_scalar(queries::FIND_PRODUCT_ID)
            .bind(new.product_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(EngineError::persistence)?;
        if product.is_none() {
            return Err(EngineError::Validation(format!(
                "unknown product {}",
                new.product_id
            )));
        }

        let row: AuctionRow = sqlx::query_as(queries::INSERT_AUCTION)
            .bind(new.product_id)
            .bind(new.start_at)
            .bind(new.end_at)
            .bind(new.starting_bid_minor)
            .bind(new.reserve_price_minor)
            .bind(new.status.as_str())
            .bind(new.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(EngineError::persistence)?;

        sqlx::query(queries::SET_PRODUCT_FLAG)
            .bind(new.product_id)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::persistence)?;

        tx.commit().await.map_err(EngineError::persistence)?;
        row.try_into()
    }

    async fn find_auction(&self, auction_id: i64) -> Result<Auction, EngineError> {
        let row: Option<AuctionRow> = sqlx::query_as(queries::FIND_AUCTION)
            .bind(auction_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(EngineError::persistence)?;
        row.ok_or(EngineError::AuctionNotFound(auction_id))?.try_into()
    }

    async fn delete_auction(&self, auction_id: i64) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await.map_err(EngineError::persistence)?;

        let product_id: Option<i64> = sqlx::query_scalar(queries::FIND_AUCTION_PRODUCT)
            .bind(auction_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(EngineError::persistence)?;
        let product_id = product_id.ok_or(EngineError::AuctionNotFound(auction_id))?;

        sqlx::query(queries::DELETE_AUCTION)
            .bind(auction_id)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::persistence)?;
        sqlx::query(queries::CLEAR_PRODUCT_FLAG)
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::persistence)?;

        tx.commit().await.map_err(EngineError::persistence)
    }

    async fn bid_history(
        &self,
        auction_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bid>, EngineError> {
        sqlx::query_as(queries::BID_HISTORY)
            .bind(auction_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&*self.pool)
            .await
            .map_err(EngineError::persistence)
    }

    async fn load_for_update(
        &self,
        auction_id: i64,
    ) -> Result<Box<dyn AuctionGuard>, EngineError> {
        let mut tx = self.pool.begin().await.map_err(EngineError::persistence)?;

        sqlx::query(&format!("SET LOCAL lock_timeout = '{LOCK_TIMEOUT_MS}ms'"))
            .execute(&mut *tx)
            .await
            .map_err(EngineError::persistence)?;

        let row: Option<AuctionRow> = sqlx::query_as(queries::LOAD_AUCTION_FOR_UPDATE)
            .bind(auction_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_lock_err)?;
        let auction: Auction = row.ok_or(EngineError::AuctionNotFound(auction_id))?.try_into()?;

        Ok(Box::new(PgAuctionGuard {
            tx: Some(tx),
            auction,
        }))
    }

    async fn expired_active_ids(&self, now: DateTime<Utc>) -> Result<Vec<i64>, EngineError> {
        sqlx::query_scalar(queries::EXPIRED_ACTIVE_IDS)
            .bind(now)
            .fetch_all(&*self.pool)
            .await
            .map_err(EngineError::persistence)
    }

    async fn activate_pending(&self, now: DateTime<Utc>) -> Result<u64, EngineError> {
        let result = sqlx::query(queries::ACTIVATE_PENDING)
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(EngineError::persistence)?;
        Ok(result.rows_affected())
    }
}

// endregion: --- Store

// region:    --- Guard

/// Holds the open transaction (and with it the row lock) until `commit` or
/// drop; a drop without commit rolls back.
pub struct PgAuctionGuard {
    tx: Option<Transaction<'static, Postgres>>,
    auction: Auction,
}

impl PgAuctionGuard {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, EngineError> {
        self.tx
            .as_mut()
            .ok_or_else(|| EngineError::Persistence("transaction already closed".to_string()))
    }
}

#[async_trait]
impl AuctionGuard for PgAuctionGuard {
    fn auction(&self) -> &Auction {
        &self.auction
    }

    async fn highest_bid(&mut self) -> Result<Option<Bid>, EngineError> {
        let auction_id = self.auction.id;
        let tx = self.tx()?;
        sqlx::query_as(queries::HIGHEST_BID)
            .bind(auction_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(EngineError::persistence)
    }

    async fn commit(&mut self, write: AuctionWrite) -> Result<SaveOutcome, EngineError> {
        let mut tx = self
            .tx
            .take()
            .ok_or_else(|| EngineError::Persistence("transaction already closed".to_string()))?;
        let auction = &write.auction;

        sqlx::query(queries::UPDATE_AUCTION)
            .bind(auction.id)
            .bind(auction.start_at)
            .bind(auction.end_at)
            .bind(auction.starting_bid_minor)
            .bind(auction.reserve_price_minor)
            .bind(auction.current_bid_minor)
            .bind(auction.winner_id)
            .bind(auction.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(EngineError::persistence)?;

        let mut bid = None;
        let mut bid_count = 0;
        if let Some(new_bid) = &write.new_bid {
            let saved: Bid = sqlx::query_as(queries::INSERT_BID)
                .bind(auction.id)
                .bind(new_bid.user_id)
                .bind(new_bid.amount_minor)
                .bind(new_bid.bid_at)
                .fetch_one(&mut *tx)
                .await
                .map_err(EngineError::persistence)?;
            bid_count = sqlx::query_scalar(queries::COUNT_BIDS)
                .bind(auction.id)
                .fetch_one(&mut *tx)
                .await
                .map_err(EngineError::persistence)?;
            bid = Some(saved);
        }

        match write.product {
            Some(ProductFlagUpdate::Set) => {
                sqlx::query(queries::SET_PRODUCT_FLAG)
                    .bind(auction.product_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(EngineError::persistence)?;
            }
            Some(ProductFlagUpdate::Clear) => {
                sqlx::query(queries::CLEAR_PRODUCT_FLAG)
                    .bind(auction.product_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(EngineError::persistence)?;
            }
            Some(ProductFlagUpdate::ClearAndTakeStock) => {
                sqlx::query(queries::CLEAR_PRODUCT_FLAG)
                    .bind(auction.product_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(EngineError::persistence)?;
                sqlx::query(queries::TAKE_PRODUCT_STOCK)
                    .bind(auction.product_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(EngineError::persistence)?;
            }
            None => {}
        }

        tx.commit().await.map_err(EngineError::persistence)?;
        self.auction = write.auction;
        Ok(SaveOutcome { bid, bid_count })
    }
}

// endregion: --- Guard
