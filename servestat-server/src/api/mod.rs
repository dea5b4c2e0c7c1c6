// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP API
//!
//! ```text
//! POST /stats          intake of one delivery record (echoed back)
//! GET  /stats/query    rollup counts for a resolution and time window
//! GET  /ping           liveness
//! GET  /health         aggregator counters
//! ```

pub mod health;
pub mod ingest;
pub mod query;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use servestat_core::StatsError;
use servestat_storage::Aggregator;
use std::sync::Arc;

pub use health::{health_check, ping};
pub use ingest::{ingest_stats, LogRecord};
pub use query::{query_stats, StatsQuery};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<StatsError> for ApiError {
    fn from(e: StatsError) -> Self {
        match e {
            StatsError::UnknownResolution(_)
            | StatsError::InvalidResolution(_)
            | StatsError::TimestampOutOfRange(_) => {
                ApiError::BadRequest(e.to_string())
            }
            e => {
                if e.is_integrity() {
                    tracing::error!("Integrity error while serving request: {}", e);
                }
                ApiError::Internal(e.to_string())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }
}

/// All API routes, without transport layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stats", post(ingest_stats))
        .route("/stats/query", get(query_stats))
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .with_state(state)
}
