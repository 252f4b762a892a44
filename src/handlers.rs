// region:    --- Imports
use crate::auction::admin::{AuctionAdmin, CreateAuctionRequest, UpdateAuctionRequest};
use crate::bidding::commands::{BidPlacementService, MinBidQuote, PlaceBidCommand};
use crate::closer::AuctionCloser;
use crate::effects::EffectDispatcher;
use crate::error::EngineError;
use crate::store::AuctionStore;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

// endregion: --- Imports

// region:    --- App State & Router

#[derive(Clone)]
pub struct AppState {
    pub bids: Arc<BidPlacementService>,
    pub admin: Arc<AuctionAdmin>,
    pub closer: Arc<AuctionCloser>,
    pub dispatcher: Arc<EffectDispatcher>,
    pub store: Arc<dyn AuctionStore>,
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/bids", post(handle_place_bid).get(handle_bid_history))
        .route("/bids/min", get(handle_min_bid))
        .route("/auctions", post(handle_create_auction))
        .route("/auctions/close-ended", post(handle_close_ended))
        .route(
            "/auctions/:id",
            get(handle_get_auction)
                .put(handle_update_auction)
                .delete(handle_delete_auction),
        )
        .route("/auctions/:id/activate", post(handle_activate_auction))
        .route("/auctions/:id/pause", post(handle_pause_auction))
        .route("/auctions/:id/resume", post(handle_resume_auction))
        .route("/auctions/:id/cancel", post(handle_cancel_auction))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

// endregion: --- App State & Router

// region:    --- Command Handlers

/// Place a bid.
pub async fn handle_place_bid(
    State(state): State<AppState>,
    Json(cmd): Json<PlaceBidCommand>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> bid request: {:?}", "Command", cmd);

    let (receipt, effects) = state.bids.place_bid(cmd).await?;
    // The bid is committed; publishing happens outside the lock.
    state.dispatcher.dispatch(&effects).await;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "bid accepted",
            "bid": receipt.bid,
            "auction": receipt.auction,
            "extended": receipt.extended,
            "bid_count": receipt.bid_count,
        })),
    ))
}

/// Run the closing sweep. Wired to the scheduler, but safe to call manually
/// or concurrently.
pub async fn handle_close_ended(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> close-ended sweep requested", "Command");
    let count = state.closer.close_ended().await?;
    Ok(Json(serde_json::json!({
        "message": "close sweep finished",
        "count": count,
    })))
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

#[derive(Debug, Deserialize)]
pub struct AuctionQuery {
    pub auction_id: i64,
}

/// Current minimum bid for an auction.
pub async fn handle_min_bid(
    State(state): State<AppState>,
    Query(query): Query<AuctionQuery>,
) -> Result<Json<MinBidQuote>, EngineError> {
    info!(
        "{:<12} --> min bid query for auction {}",
        "Query", query.auction_id
    );
    Ok(Json(state.bids.min_bid(query.auction_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct BidHistoryQuery {
    pub auction_id: i64,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Bid history, newest first.
pub async fn handle_bid_history(
    State(state): State<AppState>,
    Query(query): Query<BidHistoryQuery>,
) -> Result<impl IntoResponse, EngineError> {
    info!(
        "{:<12} --> bid history query for auction {}",
        "Query", query.auction_id
    );
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // Distinguish an unknown auction from an empty history.
    state.store.find_auction(query.auction_id).await?;
    let bids = state
        .store
        .bid_history(query.auction_id, per_page, offset)
        .await?;

    Ok(Json(serde_json::json!({
        "auction_id": query.auction_id,
        "page": page,
        "per_page": per_page,
        "bids": bids,
    })))
}

/// Auction snapshot.
pub async fn handle_get_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> auction snapshot for {}", "Query", auction_id);
    Ok(Json(state.store.find_auction(auction_id).await?))
}

// endregion: --- Query Handlers

// region:    --- Admin Handlers

pub async fn handle_create_auction(
    State(state): State<AppState>,
    Json(req): Json<CreateAuctionRequest>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> create auction: {:?}", "Admin", req);
    let (auction, effects) = state.admin.create(req).await?;
    state.dispatcher.dispatch(&effects).await;
    Ok((StatusCode::CREATED, Json(auction)))
}

pub async fn handle_update_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(req): Json<UpdateAuctionRequest>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> update auction {}: {:?}", "Admin", auction_id, req);
    let (auction, effects) = state.admin.update(auction_id, req).await?;
    state.dispatcher.dispatch(&effects).await;
    Ok(Json(auction))
}

pub async fn handle_delete_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> delete auction {}", "Admin", auction_id);
    state.admin.delete(auction_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_activate_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> activate auction {}", "Admin", auction_id);
    let (auction, effects) = state.admin.activate(auction_id).await?;
    state.dispatcher.dispatch(&effects).await;
    Ok(Json(auction))
}

pub async fn handle_pause_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> pause auction {}", "Admin", auction_id);
    let (auction, effects) = state.admin.pause(auction_id).await?;
    state.dispatcher.dispatch(&effects).await;
    Ok(Json(auction))
}

pub async fn handle_resume_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> resume auction {}", "Admin", auction_id);
    let (auction, effects) = state.admin.resume(auction_id).await?;
    state.dispatcher.dispatch(&effects).await;
    Ok(Json(auction))
}

pub async fn handle_cancel_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    info!("{:<12} --> cancel auction {}", "Admin", auction_id);
    let (auction, effects) = state.admin.cancel(auction_id).await?;
    state.dispatcher.dispatch(&effects).await;
    Ok(Json(auction))
}

// endregion: --- Admin Handlers
