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

//! Range queries over the aggregate store

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use servestat_core::BucketCount;
use std::sync::Arc;

use crate::api::{ApiError, AppState};

/// Query string for GET /stats/query
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Resolution name; defaults to the first configured one
    pub resolution: Option<String>,
    /// File name; absent or empty selects every file
    #[serde(default)]
    pub fname: String,
    /// Destination host; absent or empty selects every host
    #[serde(default)]
    pub dest: String,
    /// Window start (RFC 3339), inclusive
    pub from: DateTime<Utc>,
    /// Window end (RFC 3339), inclusive
    pub to: DateTime<Utc>,
}

/// GET /stats/query - Non-empty buckets in `[from, to]`, ascending
///
/// # Example
/// ```text
/// GET /stats/query?resolution=1h&dest=edge-1&from=2017-12-20T00:00:00Z&to=2017-12-21T00:00:00Z
/// ```
pub async fn query_stats(
    State(state): State<AppState>,
    params: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<Vec<BucketCount>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let aggregator = Arc::clone(&state.aggregator);

    // redb reads are synchronous
    let buckets = tokio::task::spawn_blocking(move || {
        let store = aggregator.persistent();
        let resolution = match params.resolution {
            Some(name) => name,
            None => store
                .resolutions()
                .next()
                .map(|r| r.name().to_string())
                .ok_or_else(|| ApiError::Internal("No resolutions configured".to_string()))?,
        };
        store
            .query(&resolution, &params.fname, &params.dest, params.from, params.to)
            .map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Query task failed: {}", e)))??;

    Ok(Json(buckets))
}
