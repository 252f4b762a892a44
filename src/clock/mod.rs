use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Time source for the engine.
///
/// Every component that reads the current time takes a `Clock` instead of
/// calling `Utc::now()` directly, so expiry and anti-sniping boundaries can
/// be pinned down in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests. Starts at a fixed origin and only moves
/// when `advance` is called.
#[derive(Debug)]
pub struct ManualClock {
    origin: DateTime<Utc>,
    offset_ms: AtomicI64,
}

impl ManualClock {
    pub fn at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            offset_ms: AtomicI64::new(0),
        }
    }

    pub fn advance(&self, delta: Duration) {
        self.offset_ms
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin + Duration::milliseconds(self.offset_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_on_advance() {
        let clock = ManualClock::at(Utc::now());
        let first = clock.now();
        assert_eq!(first, clock.now());

        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now() - first, Duration::seconds(90));
    }
}
