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

use axum::{extract::State, Json};
use serde::Serialize;
use servestat_storage::AggregatorStats;

use crate::api::AppState;

/// GET /ping
pub async fn ping() -> &'static str {
    "pong"
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub buffered_destinations: usize,
    pub saves: u64,
    pub flushes: u64,
    pub records_written: u64,
    pub records_failed: u64,
}

/// GET /health - Aggregator counters since startup
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let AggregatorStats {
        saves,
        flushes,
        records_written,
        records_failed,
    } = state.aggregator.stats();

    Json(HealthResponse {
        status: if records_failed == 0 { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        buffered_destinations: state.aggregator.in_memory().len(),
        saves,
        flushes,
        records_written,
        records_failed,
    })
}
