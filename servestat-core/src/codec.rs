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

//! Stored count encoding: fixed 8-byte big-endian `u64`

use crate::error::{Result, StatsError};

/// Width of a stored count
pub const COUNT_WIDTH: usize = 8;

#[inline]
pub fn encode_count(count: u64) -> [u8; COUNT_WIDTH] {
    count.to_be_bytes()
}

/// Decode a stored count.
///
/// Missing or zero-length values mean nothing was accumulated yet and read
/// as `0`. Any other width is corruption and is reported, never zeroed.
pub fn decode_count(key: &str, raw: Option<&[u8]>) -> Result<u64> {
    match raw {
        None => Ok(0),
        Some(bytes) if bytes.is_empty() => Ok(0),
        Some(bytes) => {
            let fixed: [u8; COUNT_WIDTH] =
                bytes.try_into().map_err(|_| StatsError::CorruptCount {
                    key: key.to_string(),
                    len: bytes.len(),
                })?;
            Ok(u64::from_be_bytes(fixed))
        }
    }
}
