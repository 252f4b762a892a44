/// Escrow / smart-contract collaborator.
///
/// The engine only knows the call contract; return values are logged, never
/// interpreted. The production bridge POSTs JSON to the settlement service.
// region:    --- Imports
use crate::auction::model::Auction;
use async_trait::async_trait;
use tracing::info;

// endregion: --- Imports

// region:    --- Bridge Trait

#[async_trait]
pub trait SettlementBridge: Send + Sync {
    async fn create_auction(&self, auction: &Auction) -> Result<(), String>;

    async fn sync_auction(&self, auction: &Auction) -> Result<(), String>;

    async fn begin_settlement(
        &self,
        auction_id: i64,
        winner_id: i64,
        amount_minor: i64,
    ) -> Result<(), String>;
}

// endregion: --- Bridge Trait

// region:    --- Http Bridge

pub struct HttpSettlementBridge {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSettlementBridge {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn from_env() -> Self {
        let base_url =
            std::env::var("SETTLEMENT_URL").unwrap_or_else(|_| "http://localhost:4000".to_string());
        Self::new(base_url)
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<(), String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("settlement request to {url} failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("settlement endpoint {url} returned {status}"));
        }
        info!("{:<12} --> settlement call {} -> {}", "Settlement", url, status);
        Ok(())
    }
}

#[async_trait]
impl SettlementBridge for HttpSettlementBridge {
    async fn create_auction(&self, auction: &Auction) -> Result<(), String> {
        self.post_json("/escrow/auctions", serde_json::json!(auction))
            .await
    }

    async fn sync_auction(&self, auction: &Auction) -> Result<(), String> {
        self.post_json(
            &format!("/escrow/auctions/{}/sync", auction.id),
            serde_json::json!(auction),
        )
        .await
    }

    async fn begin_settlement(
        &self,
        auction_id: i64,
        winner_id: i64,
        amount_minor: i64,
    ) -> Result<(), String> {
        self.post_json(
            "/escrow/settlements",
            serde_json::json!({
                "auction_id": auction_id,
                "winner_id": winner_id,
                "amount_minor": amount_minor,
            }),
        )
        .await
    }
}

// endregion: --- Http Bridge
