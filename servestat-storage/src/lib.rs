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

//! Servestat Storage
//!
//! The aggregation engine: a lock-guarded in-memory counter buffer, a durable
//! multi-resolution rollup store on redb, and the aggregator that drains one
//! into the other on a timer.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use servestat_storage::{AggregateStore, Aggregator, CounterBuffer};
//! use servestat_core::StatRecord;
//! use std::time::Duration;
//!
//! let store = AggregateStore::open_with_names("stats.db", &["1m", "1h"])?;
//! let aggregator = Aggregator::start(Duration::from_secs(1), CounterBuffer::new(), store);
//!
//! aggregator.save(&StatRecord::new("edge-1", "a.mp3"));
//! // ...
//! aggregator.shutdown().await;
//! ```

pub mod aggregate_store;
pub mod aggregator;
pub mod backend;
pub mod counter_buffer;

pub use aggregate_store::AggregateStore;
pub use aggregator::{Aggregator, AggregatorStats, FlushReport};
pub use backend::{InMemoryStore, PersistentStore};
pub use counter_buffer::CounterBuffer;
