/// In-memory store used by the test suite (and handy for local runs without
/// Postgres). Each auction lives behind its own `tokio::sync::Mutex`, which
/// plays the role of the row lock: `load_for_update` waits on it with the
/// same bounded timeout the Postgres store applies.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus, Bid, Product};
use crate::error::EngineError;
use crate::store::{
    AuctionGuard, AuctionStore, AuctionWrite, NewAuction, ProductFlagUpdate, SaveOutcome,
    LOCK_TIMEOUT_MS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

// endregion: --- Imports

#[derive(Debug)]
struct AuctionRecord {
    auction: Auction,
    bids: Vec<Bid>,
}

struct MemoryInner {
    auctions: Mutex<HashMap<i64, Arc<Mutex<AuctionRecord>>>>,
    products: Mutex<HashMap<i64, Product>>,
    next_auction_id: AtomicI64,
    next_bid_id: AtomicI64,
}

pub struct MemoryAuctionStore {
    inner: Arc<MemoryInner>,
    lock_timeout: Duration,
}

impl MemoryAuctionStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(Duration::from_millis(LOCK_TIMEOUT_MS))
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                auctions: Mutex::new(HashMap::new()),
                products: Mutex::new(HashMap::new()),
                next_auction_id: AtomicI64::new(1),
                next_bid_id: AtomicI64::new(1),
            }),
            lock_timeout,
        }
    }

    pub async fn insert_product(&self, product: Product) {
        self.inner
            .products
            .lock()
            .await
            .insert(product.id, product);
    }

    pub async fn product(&self, product_id: i64) -> Option<Product> {
        self.inner.products.lock().await.get(&product_id).cloned()
    }

    async fn record(&self, auction_id: i64) -> Result<Arc<Mutex<AuctionRecord>>, EngineError> {
        self.inner
            .auctions
            .lock()
            .await
            .get(&auction_id)
            .cloned()
            .ok_or(EngineError::AuctionNotFound(auction_id))
    }
}

impl Default for MemoryAuctionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuctionStore for MemoryAuctionStore {
    async fn create_auction(&self, new: NewAuction) -> Result<Auction, EngineError> {
        {
            let mut products = self.inner.products.lock().await;
            let product = products.get_mut(&new.product_id).ok_or_else(|| {
                EngineError::Validation(format!("unknown product {}", new.product_id))
            })?;
            product.in_auction = true;
        }

        let id = self.inner.next_auction_id.fetch_add(1, Ordering::SeqCst);
        let auction = Auction {
            id,
            product_id: new.product_id,
            start_at: new.start_at,
            end_at: new.end_at,
            starting_bid_minor: new.starting_bid_minor,
            reserve_price_minor: new.reserve_price_minor,
            current_bid_minor: None,
            winner_id: None,
            status: new.status,
            created_at: new.created_at,
        };
        self.inner.auctions.lock().await.insert(
            id,
            Arc::new(Mutex::new(AuctionRecord {
                auction: auction.clone(),
                bids: Vec::new(),
            })),
        );
        Ok(auction)
    }

    async fn find_auction(&self, auction_id: i64) -> Result<Auction, EngineError> {
        let record = self.record(auction_id).await?;
        let record = record.lock().await;
        Ok(record.auction.clone())
    }

    async fn delete_auction(&self, auction_id: i64) -> Result<(), EngineError> {
        let record = self
            .inner
            .auctions
            .lock()
            .await
            .remove(&auction_id)
            .ok_or(EngineError::AuctionNotFound(auction_id))?;
        let product_id = record.lock().await.auction.product_id;
        if let Some(product) = self.inner.products.lock().await.get_mut(&product_id) {
            product.in_auction = false;
        }
        Ok(())
    }

    async fn bid_history(
        &self,
        auction_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bid>, EngineError> {
        let record = self.record(auction_id).await?;
        let record = record.lock().await;
        Ok(record
            .bids
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn load_for_update(
        &self,
        auction_id: i64,
    ) -> Result<Box<dyn AuctionGuard>, EngineError> {
        let record = self.record(auction_id).await?;
        let guard = tokio::time::timeout(self.lock_timeout, record.lock_owned())
            .await
            .map_err(|_| EngineError::Contention)?;
        Ok(Box::new(MemoryAuctionGuard {
            record: guard,
            inner: Arc::clone(&self.inner),
        }))
    }

    async fn expired_active_ids(&self, now: DateTime<Utc>) -> Result<Vec<i64>, EngineError> {
        let auctions = self.inner.auctions.lock().await;
        let mut ids = Vec::new();
        for (id, record) in auctions.iter() {
            // A record locked by an in-flight bid is left for the next tick.
            if let Ok(record) = record.try_lock() {
                if record.auction.status == AuctionStatus::Active && record.auction.end_at <= now {
                    ids.push(*id);
                }
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    async fn activate_pending(&self, now: DateTime<Utc>) -> Result<u64, EngineError> {
        let auctions = self.inner.auctions.lock().await;
        let mut opened = 0;
        for record in auctions.values() {
            if let Ok(mut record) = record.try_lock() {
                if record.auction.status == AuctionStatus::Pending
                    && record.auction.start_at <= now
                {
                    record.auction.status = AuctionStatus::Active;
                    opened += 1;
                }
            }
        }
        Ok(opened)
    }
}

struct MemoryAuctionGuard {
    record: OwnedMutexGuard<AuctionRecord>,
    inner: Arc<MemoryInner>,
}

#[async_trait]
impl AuctionGuard for MemoryAuctionGuard {
    fn auction(&self) -> &Auction {
        &self.record.auction
    }

    async fn highest_bid(&mut self) -> Result<Option<Bid>, EngineError> {
        let mut best: Option<&Bid> = None;
        for bid in &self.record.bids {
            best = match best {
                None => Some(bid),
                Some(current) => {
                    if bid.amount_minor > current.amount_minor
                        || (bid.amount_minor == current.amount_minor
                            && (bid.bid_at < current.bid_at
                                || (bid.bid_at == current.bid_at && bid.id < current.id)))
                    {
                        Some(bid)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        Ok(best.cloned())
    }

    async fn commit(&mut self, write: AuctionWrite) -> Result<SaveOutcome, EngineError> {
        self.record.auction = write.auction.clone();

        let mut bid = None;
        let mut bid_count = 0;
        if let Some(new_bid) = &write.new_bid {
            let saved = Bid {
                id: self.inner.next_bid_id.fetch_add(1, Ordering::SeqCst),
                auction_id: write.auction.id,
                user_id: new_bid.user_id,
                amount_minor: new_bid.amount_minor,
                bid_at: new_bid.bid_at,
            };
            self.record.bids.push(saved.clone());
            bid_count = self.record.bids.len() as i64;
            bid = Some(saved);
        }

        if let Some(update) = write.product {
            let mut products = self.inner.products.lock().await;
            if let Some(product) = products.get_mut(&write.auction.product_id) {
                match update {
                    ProductFlagUpdate::Set => product.in_auction = true,
                    ProductFlagUpdate::Clear => product.in_auction = false,
                    ProductFlagUpdate::ClearAndTakeStock => {
                        product.in_auction = false;
                        if product.stock_qty > 0 {
                            product.stock_qty -= 1;
                        }
                    }
                }
            }
        }

        Ok(SaveOutcome { bid, bid_count })
    }
}
