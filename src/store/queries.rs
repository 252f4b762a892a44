/// Auction lookup.
pub const FIND_AUCTION: &str =
    "SELECT id, product_id, start_at, end_at, starting_bid_minor, reserve_price_minor, current_bid_minor, winner_id, status, created_at FROM auctions WHERE id = $1";

/// Auction lookup with the row lock held for the rest of the transaction.
pub const LOAD_AUCTION_FOR_UPDATE: &str =
    "SELECT id, product_id, start_at, end_at, starting_bid_minor, reserve_price_minor, current_bid_minor, winner_id, status, created_at FROM auctions WHERE id = $1 FOR UPDATE";

/// Insert a new auction.
pub const INSERT_AUCTION: &str = r#"
    INSERT INTO auctions (product_id, start_at, end_at, starting_bid_minor, reserve_price_minor, status, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING id, product_id, start_at, end_at, starting_bid_minor, reserve_price_minor, current_bid_minor, winner_id, status, created_at
"#;

/// Full update of the mutable auction columns.
pub const UPDATE_AUCTION: &str = r#"
    UPDATE auctions
    SET start_at = $2, end_at = $3, starting_bid_minor = $4, reserve_price_minor = $5,
        current_bid_minor = $6, winner_id = $7, status = $8
    WHERE id = $1
"#;

/// Delete an auction; bids cascade.
pub const DELETE_AUCTION: &str = "DELETE FROM auctions WHERE id = $1";

/// Auction's product id.
pub const FIND_AUCTION_PRODUCT: &str = "SELECT product_id FROM auctions WHERE id = $1";

/// Append a bid.
pub const INSERT_BID: &str = r#"
    INSERT INTO bids (auction_id, user_id, amount_minor, bid_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id, auction_id, user_id, amount_minor, bid_at
"#;

/// Bid count for an auction.
pub const COUNT_BIDS: &str = "SELECT COUNT(*) FROM bids WHERE auction_id = $1";

/// Winning bid: highest amount, ties to the earliest bidder.
pub const HIGHEST_BID: &str = r#"
    SELECT id, auction_id, user_id, amount_minor, bid_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY amount_minor DESC, bid_at ASC, id ASC
    LIMIT 1
"#;

/// Bid history, newest first.
pub const BID_HISTORY: &str = r#"
    SELECT id, auction_id, user_id, amount_minor, bid_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY bid_at DESC, id DESC
    LIMIT $2 OFFSET $3
"#;

/// Active auctions whose deadline has passed.
pub const EXPIRED_ACTIVE_IDS: &str =
    "SELECT id FROM auctions WHERE status = 'active' AND end_at <= $1 ORDER BY id";

/// Pending auctions whose start time has elapsed become active.
pub const ACTIVATE_PENDING: &str =
    "UPDATE auctions SET status = 'active' WHERE status = 'pending' AND start_at <= $1";

/// Product existence check.
pub const FIND_PRODUCT_ID: &str = "SELECT id FROM products WHERE id = $1";

/// Mark a product as in auction.
pub const SET_PRODUCT_FLAG: &str = "UPDATE products SET in_auction = TRUE WHERE id = $1";

/// Clear a product's in-auction flag.
pub const CLEAR_PRODUCT_FLAG: &str = "UPDATE products SET in_auction = FALSE WHERE id = $1";

/// Best-effort stock decrement; rows already at zero are left alone.
pub const TAKE_PRODUCT_STOCK: &str =
    "UPDATE products SET stock_qty = stock_qty - 1 WHERE id = $1 AND stock_qty > 0";
