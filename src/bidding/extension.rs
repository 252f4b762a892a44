/// Anti-sniping time extension.
// region:    --- Imports
use chrono::{DateTime, Duration, Utc};

// endregion: --- Imports

/// A bid accepted with no more than this many seconds left re-arms the
/// deadline.
pub const ANTI_SNIPING_WINDOW_SECS: i64 = 300;

/// How far past `now` the deadline moves when a bid lands in the window.
pub const ANTI_SNIPING_EXTENSION_SECS: i64 = 300;

/// New deadline for an accepted bid, if the bid landed inside the sniping
/// window. There is no cap on repeated extensions: every qualifying bid
/// re-arms the window.
pub fn extended_deadline(end_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if end_at - now <= Duration::seconds(ANTI_SNIPING_WINDOW_SECS) {
        Some(now + Duration::seconds(ANTI_SNIPING_EXTENSION_SECS))
    } else {
        None
    }
}
