use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events the engine announces after a commit. Consumed by the real-time
/// fan-out layer; the engine never reads them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuctionEvent {
    BidPlaced {
        auction_id: i64,
        user_id: i64,
        amount_minor: i64,
        timestamp: DateTime<Utc>,
    },
    TimeExtended {
        auction_id: i64,
        end_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    AuctionClosed {
        auction_id: i64,
        winner_id: Option<i64>,
        amount_minor: Option<i64>,
        timestamp: DateTime<Utc>,
    },
}

impl AuctionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BidPlaced { .. } => "BidPlaced",
            Self::TimeExtended { .. } => "TimeExtended",
            Self::AuctionClosed { .. } => "AuctionClosed",
        }
    }

    pub fn auction_id(&self) -> i64 {
        match self {
            Self::BidPlaced { auction_id, .. }
            | Self::TimeExtended { auction_id, .. }
            | Self::AuctionClosed { auction_id, .. } => *auction_id,
        }
    }
}
