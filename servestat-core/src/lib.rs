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

//! Servestat Core
//!
//! Domain types shared by the counter buffer, the aggregate store and the
//! intake server: delivery records, rollup keys, resolutions and the stored
//! count encoding.

pub mod codec;
pub mod error;
pub mod key;
pub mod record;
pub mod resolution;

pub use codec::{decode_count, encode_count, COUNT_WIDTH};
pub use error::{Result, StatsError};
pub use key::{Dimension, RollupKey};
pub use record::{BucketCount, Destination, FileRequest, StatAggregation, StatRecord};
pub use resolution::{
    clamp_to_bucket_range, format_bucket, parse_bucket, Resolution, BUCKET_FORMAT,
};
