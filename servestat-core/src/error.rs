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

//! Error types shared by the buffer, the aggregate store and the server

use thiserror::Error;

/// Result type for servestat operations
pub type Result<T> = std::result::Result<T, StatsError>;

/// Errors that can occur while buffering, aggregating or querying counts
#[derive(Debug, Error)]
pub enum StatsError {
    /// No buffered entry exists for this destination host.
    /// Callers are expected to branch on this, it is not fatal.
    #[error("Destination can't be found: {0}")]
    DestinationNotFound(String),

    /// Resolution name could not be parsed into a bucket width
    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),

    /// Resolution is valid but the store was not opened with it
    #[error("Unknown resolution: {0}")]
    UnknownResolution(String),

    /// Stored count is not 8 bytes wide
    #[error("Corrupt count for key {key}: expected 8 bytes, found {len}")]
    CorruptCount { key: String, len: usize },

    /// Timestamp has no fixed-width bucket name (before year 0 or after 9999)
    #[error("Timestamp out of bucket range: {0}")]
    TimestampOutOfRange(String),

    /// Bucket name in the store does not parse as a bucket timestamp
    #[error("Corrupt bucket name: {0}")]
    CorruptBucket(String),

    /// Error reported by the embedded key-value store
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StatsError {
    /// Integrity errors mean stored history can no longer be trusted.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            StatsError::CorruptCount { .. } | StatsError::CorruptBucket(_)
        )
    }
}
