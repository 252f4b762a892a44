/// Minimum-bid computation and bid validation.
///
/// Pure over an auction snapshot and a caller-supplied `now`, so the same
/// code backs bid placement (under the auction lock) and the read-only
/// minimum-bid query.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus};
use crate::error::EngineError;
use chrono::{DateTime, Utc};

// endregion: --- Imports

/// Each bid must top the current one by at least this percentage.
pub const MIN_INCREMENT_PERCENT: i64 = 5;

/// Lowest acceptable bid right now: the starting bid while no bid exists,
/// otherwise the current bid plus the increment, rounded up.
pub fn min_bid_minor(auction: &Auction) -> i64 {
    match auction.current_bid_minor {
        None => auction.starting_bid_minor,
        Some(current) => current + (current * MIN_INCREMENT_PERCENT + 99) / 100,
    }
}

/// Validate a proposed amount against an auction snapshot.
pub fn validate_bid(
    auction: &Auction,
    amount_minor: i64,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if amount_minor <= 0 {
        return Err(EngineError::Validation(
            "amount_minor must be a positive integer".to_string(),
        ));
    }

    // Status and time window must both hold.
    if auction.status != AuctionStatus::Active || now < auction.start_at || now >= auction.end_at {
        return Err(EngineError::AuctionNotActive {
            status: auction.status,
            start_at: auction.start_at,
            end_at: auction.end_at,
            now,
        });
    }

    let min_bid = min_bid_minor(auction);
    if amount_minor < min_bid {
        return Err(EngineError::BidTooLow {
            amount_minor,
            min_bid_minor: min_bid,
            current_bid_minor: auction.current_bid_minor,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn auction(current_bid_minor: Option<i64>) -> Auction {
        let now = Utc::now();
        Auction {
            id: 1,
            product_id: 1,
            start_at: now - Duration::hours(1),
            end_at: now + Duration::hours(1),
            starting_bid_minor: 10_000,
            reserve_price_minor: None,
            current_bid_minor,
            winner_id: None,
            status: AuctionStatus::Active,
            created_at: now - Duration::hours(2),
        }
    }

    #[test]
    fn minimum_is_the_starting_bid_before_the_first_bid() {
        assert_eq!(min_bid_minor(&auction(None)), 10_000);
    }

    #[test]
    fn minimum_adds_five_percent_rounded_up() {
        assert_eq!(min_bid_minor(&auction(Some(10_000))), 10_500);
        // 5% of 10001 is 500.05 -> ceil 501
        assert_eq!(min_bid_minor(&auction(Some(10_001))), 10_502);
        assert_eq!(min_bid_minor(&auction(Some(1))), 2);
    }

    #[test]
    fn bid_exactly_at_the_minimum_is_accepted() {
        let a = auction(Some(10_000));
        assert!(validate_bid(&a, 10_500, Utc::now()).is_ok());
    }

    #[test]
    fn bid_below_the_minimum_is_rejected_with_the_quote() {
        let a = auction(Some(10_000));
        match validate_bid(&a, 10_499, Utc::now()) {
            Err(EngineError::BidTooLow {
                min_bid_minor,
                current_bid_minor,
                ..
            }) => {
                assert_eq!(min_bid_minor, 10_500);
                assert_eq!(current_bid_minor, Some(10_000));
            }
            other => panic!("expected BidTooLow, got {other:?}"),
        }
    }

    #[test]
    fn non_positive_amounts_are_invalid() {
        let a = auction(None);
        assert!(matches!(
            validate_bid(&a, 0, Utc::now()),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            validate_bid(&a, -500, Utc::now()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn bids_outside_the_time_window_are_rejected() {
        let a = auction(None);

        let before = a.start_at - Duration::seconds(1);
        let err = validate_bid(&a, 10_000, before).unwrap_err();
        assert_eq!(err.code(), "NOT_STARTED");

        // end_at itself is already out of the window
        let err = validate_bid(&a, 10_000, a.end_at).unwrap_err();
        assert_eq!(err.code(), "ALREADY_ENDED");
    }

    #[test]
    fn bids_against_non_active_statuses_are_rejected() {
        for status in [
            AuctionStatus::Pending,
            AuctionStatus::Paused,
            AuctionStatus::Finished,
            AuctionStatus::Cancelled,
        ] {
            let mut a = auction(None);
            a.status = status;
            let err = validate_bid(&a, 10_000, Utc::now()).unwrap_err();
            assert_eq!(err.code(), "NOT_ACTIVE");
        }
    }
}
