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

//! Records exchanged between intake, the counter buffer and the aggregate store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One observed delivery: a file served to a destination host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatRecord {
    pub dest_host: String,
    pub fname: String,
}

impl StatRecord {
    pub fn new(dest_host: impl Into<String>, fname: impl Into<String>) -> Self {
        Self {
            dest_host: dest_host.into(),
            fname: fname.into(),
        }
    }
}

/// Buffered request count for a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRequest {
    pub fname: String,
    pub count: u64,
}

/// Buffered file counts for one destination host
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub requests: HashMap<String, FileRequest>,
}

impl Destination {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            requests: HashMap::new(),
        }
    }

    /// Increment the count for `fname`, creating the entry on first use
    #[inline]
    pub fn record(&mut self, fname: &str) {
        match self.requests.get_mut(fname) {
            Some(request) => request.count += 1,
            None => {
                self.requests.insert(
                    fname.to_string(),
                    FileRequest {
                        fname: fname.to_string(),
                        count: 1,
                    },
                );
            }
        }
    }

    /// Count buffered for `fname`, zero if never seen
    pub fn count(&self, fname: &str) -> u64 {
        self.requests.get(fname).map(|r| r.count).unwrap_or(0)
    }

    /// Sum of every buffered file count
    pub fn total(&self) -> u64 {
        self.requests.values().map(|r| r.count).sum()
    }

    /// Turn every buffered file count into an aggregation record stamped `ts`
    pub fn aggregations(&self, ts: DateTime<Utc>) -> impl Iterator<Item = StatAggregation> + '_ {
        self.requests.values().map(move |r| StatAggregation {
            fname: r.fname.clone(),
            dest_host: self.host.clone(),
            count: r.count,
            ts,
        })
    }
}

/// Unit written into the aggregate store: `count` deliveries of `fname`
/// to `dest_host`, stamped with the flush time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatAggregation {
    pub fname: String,
    pub dest_host: String,
    pub count: u64,
    pub ts: DateTime<Utc>,
}

impl StatAggregation {
    pub fn new(
        fname: impl Into<String>,
        dest_host: impl Into<String>,
        count: u64,
        ts: DateTime<Utc>,
    ) -> Self {
        Self {
            fname: fname.into(),
            dest_host: dest_host.into(),
            count,
            ts,
        }
    }
}

/// One non-empty bucket returned by a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCount {
    pub ts: DateTime<Utc>,
    pub count: u64,
}
