// region:    --- Imports
use crate::auction::model::AuctionStatus;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::error;

// endregion: --- Imports

// region:    --- Engine Error

/// Errors raised by the bidding engine. Everything that escapes the atomic
/// section maps onto one of these; the HTTP layer renders them through the
/// single `IntoResponse` impl below.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("auction {0} not found")]
    AuctionNotFound(i64),

    #[error("auction is not open for bidding")]
    AuctionNotActive {
        status: AuctionStatus,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("bid of {amount_minor} is below the minimum of {min_bid_minor}")]
    BidTooLow {
        amount_minor: i64,
        min_bid_minor: i64,
        current_bid_minor: Option<i64>,
    },

    #[error("auction is locked by a concurrent request")]
    Contention,

    #[error("status change {from} -> {to} is not allowed")]
    InvalidTransition {
        from: AuctionStatus,
        to: AuctionStatus,
    },

    #[error("storage failure: {0}")]
    Persistence(String),
}

impl EngineError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Machine-readable code surfaced in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_REQUEST",
            Self::AuctionNotFound(_) => "NOT_FOUND",
            Self::AuctionNotActive {
                status,
                start_at,
                now,
                ..
            } => {
                if *status != AuctionStatus::Active {
                    "NOT_ACTIVE"
                } else if now < start_at {
                    "NOT_STARTED"
                } else {
                    "ALREADY_ENDED"
                }
            }
            Self::BidTooLow { .. } => "LOW_BID",
            Self::Contention => "CONTENTION",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Persistence(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AuctionNotFound(_) => StatusCode::NOT_FOUND,
            Self::AuctionNotActive { .. }
            | Self::BidTooLow { .. }
            | Self::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Contention => StatusCode::CONFLICT,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        match &self {
            Self::AuctionNotActive {
                status,
                start_at,
                end_at,
                ..
            } => {
                body["status"] = serde_json::json!(status);
                body["start_at"] = serde_json::json!(start_at);
                body["end_at"] = serde_json::json!(end_at);
            }
            Self::BidTooLow {
                current_bid_minor,
                min_bid_minor,
                ..
            } => {
                body["current_bid"] = serde_json::json!(current_bid_minor);
                body["min_bid"] = serde_json::json!(min_bid_minor);
            }
            Self::Contention => {
                body["retryable"] = serde_json::json!(true);
            }
            Self::Persistence(detail) => {
                error!("{:<12} --> storage failure: {}", "Error", detail);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

// endregion: --- Engine Error
