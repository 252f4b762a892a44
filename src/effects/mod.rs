/// Post-commit side effects.
///
/// The core services return effects as plain data instead of talking to
/// collaborators themselves; the dispatcher runs them only after the
/// transaction has committed, and a collaborator failure is logged, never
/// propagated back into the engine.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::Auction;
use crate::settlement::SettlementBridge;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

// endregion: --- Imports

// region:    --- Effects

#[derive(Debug, Clone)]
pub enum Effect {
    /// Fan a domain event out to the notification layer.
    Publish(AuctionEvent),
    /// Tell the settlement collaborator about a freshly created auction.
    RegisterAuction(Auction),
    /// Re-sync an auction after an admin mutation.
    SyncAuction(Auction),
    /// Kick off escrow for a winning close.
    BeginSettlement {
        auction_id: i64,
        winner_id: i64,
        amount_minor: i64,
    },
}

/// Fire-and-forget event fan-out.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &AuctionEvent) -> Result<(), String>;
}

// endregion: --- Effects

// region:    --- Dispatcher

pub struct EffectDispatcher {
    publisher: Arc<dyn EventPublisher>,
    settlement: Arc<dyn SettlementBridge>,
}

impl EffectDispatcher {
    pub fn new(publisher: Arc<dyn EventPublisher>, settlement: Arc<dyn SettlementBridge>) -> Self {
        Self {
            publisher,
            settlement,
        }
    }

    /// Run the effects in order. Failures are logged and swallowed: the
    /// state they describe is already committed.
    pub async fn dispatch(&self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Publish(event) => {
                    if let Err(e) = self.publisher.publish(event).await {
                        error!(
                            "{:<12} --> failed to publish {} for auction {}: {}",
                            "Dispatch",
                            event.name(),
                            event.auction_id(),
                            e
                        );
                    }
                }
                Effect::RegisterAuction(auction) => {
                    if let Err(e) = self.settlement.create_auction(auction).await {
                        error!(
                            "{:<12} --> failed to register auction {} with settlement: {}",
                            "Dispatch", auction.id, e
                        );
                    }
                }
                Effect::SyncAuction(auction) => {
                    if let Err(e) = self.settlement.sync_auction(auction).await {
                        error!(
                            "{:<12} --> failed to sync auction {} with settlement: {}",
                            "Dispatch", auction.id, e
                        );
                    }
                }
                Effect::BeginSettlement {
                    auction_id,
                    winner_id,
                    amount_minor,
                } => {
                    if let Err(e) = self
                        .settlement
                        .begin_settlement(*auction_id, *winner_id, *amount_minor)
                        .await
                    {
                        error!(
                            "{:<12} --> settlement failed for auction {} (winner {}): {}",
                            "Dispatch", auction_id, winner_id, e
                        );
                    }
                }
            }
        }
    }
}

// endregion: --- Dispatcher
