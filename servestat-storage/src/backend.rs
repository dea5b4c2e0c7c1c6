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

//! Storage traits the aggregator is written against
//!
//! The write buffer and the durable rollup store are two separate tiers.
//! [`crate::Aggregator`] owns one of each and only talks to them through
//! these traits.

use chrono::{DateTime, Utc};
use servestat_core::{BucketCount, Destination, Result, RollupKey, StatAggregation};

/// Fast in-process tier absorbing one increment per delivery
pub trait InMemoryStore: Send + Sync {
    /// Increment the count for `(host, fname)` by one
    fn add(&self, host: &str, fname: &str);

    /// Snapshot of the buffered counts for `host`
    fn get(&self, host: &str) -> Result<Destination>;

    /// Reset the file counts of `host` without removing the host
    fn clear(&self, host: &str) -> Result<()>;

    /// Remove `host` entirely
    fn delete(&self, host: &str) -> Result<()>;

    /// Atomically take every buffered entry, leaving the buffer empty
    fn pop(&self) -> Vec<Destination>;
}

/// Durable multi-resolution rollup tier
pub trait PersistentStore: Send + Sync {
    /// Accumulate `agg` into every configured resolution.
    ///
    /// Each resolution commits independently; a failure in one does not
    /// stop the others and the first error is returned.
    fn save(&self, agg: &StatAggregation) -> Result<()>;

    /// Non-empty buckets for `key` with names in `[from, to]`, ascending
    fn get(
        &self,
        resolution: &str,
        key: &RollupKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BucketCount>>;
}
