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

//! Intake of delivery records sent by the load balancer

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use servestat_core::StatRecord;
use std::sync::Arc;
use tracing::debug;

use crate::api::{ApiError, AppState};

/// One delivery as reported by the load balancer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRecord {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub from_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
    pub fname: String,
    #[serde(rename = "dest")]
    pub dest_host: String,
}

impl From<&LogRecord> for StatRecord {
    fn from(record: &LogRecord) -> Self {
        StatRecord::new(record.dest_host.clone(), record.fname.clone())
    }
}

/// POST /stats - Count one delivery and echo the decoded record
///
/// # Response Codes
/// - 200: Accepted, body is the decoded record
/// - 400: Body is not a valid record
///
/// The save waits on the aggregator's lock, which a flush holds across disk
/// commits, so it runs on the blocking pool.
pub async fn ingest_stats(
    State(state): State<AppState>,
    payload: Result<Json<LogRecord>, JsonRejection>,
) -> Result<Json<LogRecord>, ApiError> {
    let Json(record) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    debug!("Delivery of {} to {} from {}", record.fname, record.dest_host, record.from_ip);
    let stat = StatRecord::from(&record);
    let aggregator = Arc::clone(&state.aggregator);
    tokio::task::spawn_blocking(move || aggregator.save(&stat))
        .await
        .map_err(|e| ApiError::Internal(format!("Save task failed: {}", e)))?;

    Ok(Json(record))
}
