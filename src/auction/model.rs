use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Auction lifecycle. `Finished` and `Cancelled` are terminal; only the
/// closing sweep may move an auction to `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Pending,
    Active,
    Paused,
    Finished,
    Cancelled,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "finished" => Some(Self::Finished),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Legal edges of the state machine.
    pub fn can_transition(self, next: AuctionStatus) -> bool {
        use AuctionStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Finished)
                | (Pending, Cancelled)
                | (Active, Cancelled)
                | (Paused, Cancelled)
        )
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auction record. Prices are integer minor units; `current_bid_minor` stays
/// unset until the first accepted bid, and `winner_id` is a denormalized
/// pointer at the current highest bidder (the bid rows stay authoritative).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub product_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub starting_bid_minor: i64,
    pub reserve_price_minor: Option<i64>,
    pub current_bid_minor: Option<i64>,
    pub winner_id: Option<i64>,
    pub status: AuctionStatus,
    pub created_at: DateTime<Utc>,
}

/// Accepted bid. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub user_id: i64,
    pub amount_minor: i64,
    pub bid_at: DateTime<Utc>,
}

/// The slice of the product record the engine touches: the in-auction flag
/// and the stock decremented on a winning close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub stock_qty: i64,
    pub in_auction: bool,
}
