/// Periodic trigger for the closing sweep. The scheduler is deliberately
/// dumb: it only calls the same functions the manual HTTP trigger calls, so
/// overlapping ticks and manual invocations are all equally safe.
// region:    --- Imports
use crate::closer::AuctionCloser;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

// endregion: --- Imports

// region:    --- Auction Scheduler

pub struct AuctionScheduler {
    closer: Arc<AuctionCloser>,
    period: Duration,
}

impl AuctionScheduler {
    pub fn new(closer: Arc<AuctionCloser>) -> Self {
        let secs = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        Self {
            closer,
            period: Duration::from_secs(secs),
        }
    }

    pub async fn start(&self) {
        let closer = Arc::clone(&self.closer);
        let period = self.period;
        tokio::spawn(async move {
            let mut interval = interval(period);
            loop {
                interval.tick().await;

                if let Err(e) = closer.activate_pending().await {
                    error!(
                        "{:<12} --> failed to open scheduled auctions: {}",
                        "Scheduler", e
                    );
                }

                match closer.close_ended().await {
                    Ok(count) if count > 0 => {
                        info!("{:<12} --> closed {} auction(s)", "Scheduler", count);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("{:<12} --> closing sweep failed: {}", "Scheduler", e);
                    }
                }
            }
        });
    }
}

// endregion: --- Auction Scheduler
