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

//! Time resolutions and bucket naming
//!
//! A resolution is named by a duration string (`1m`, `15m`, `1h`, `24h`,
//! compound forms such as `1h30m`). Timestamps are floored to a multiple of
//! the width counted from the Unix epoch (UTC) and rendered as a fixed-width
//! `YYYY-MM-DD HH:MM` string, so lexicographic order of bucket names is
//! chronological order.

use crate::error::{Result, StatsError};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use std::collections::HashSet;
use std::fmt;

/// Bucket name format (minute precision, fixed width)
pub const BUCKET_FORMAT: &str = "%Y-%m-%d %H:%M";

const SECS_PER_MINUTE: i64 = 60;

/// Years whose bucket names keep the fixed `YYYY` width
const MIN_BUCKET_YEAR: i32 = 0;
const MAX_BUCKET_YEAR: i32 = 9999;

/// A bucket granularity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resolution {
    name: String,
    width_secs: i64,
}

impl Resolution {
    /// Parse a resolution name.
    ///
    /// The width must be a positive whole number of minutes: bucket names
    /// carry minute precision, so narrower buckets could not be told apart.
    pub fn parse(name: &str) -> Result<Self> {
        let width_secs = parse_duration_secs(name)
            .ok_or_else(|| StatsError::InvalidResolution(name.to_string()))?;

        if width_secs <= 0 || width_secs % SECS_PER_MINUTE != 0 {
            return Err(StatsError::InvalidResolution(name.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            width_secs,
        })
    }

    /// Parse a configured list, rejecting duplicates (they would double count)
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            if !seen.insert(name.to_string()) {
                return Err(StatsError::InvalidResolution(format!("{} (duplicate)", name)));
            }
            out.push(Self::parse(name)?);
        }
        Ok(out)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> TimeDelta {
        TimeDelta::seconds(self.width_secs)
    }

    /// Floor `ts` to the start of its bucket
    pub fn truncate(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let rem = ts.timestamp().rem_euclid(self.width_secs);
        ts.checked_sub_signed(TimeDelta::seconds(rem))
            .and_then(|t| {
                t.checked_sub_signed(TimeDelta::nanoseconds(ts.timestamp_subsec_nanos() as i64))
            })
            .ok_or_else(|| StatsError::TimestampOutOfRange(ts.to_rfc3339()))
    }

    /// Bucket name holding `ts` at this resolution
    pub fn bucket(&self, ts: DateTime<Utc>) -> Result<String> {
        let start = self.truncate(ts)?;
        if !(MIN_BUCKET_YEAR..=MAX_BUCKET_YEAR).contains(&start.year()) {
            return Err(StatsError::TimestampOutOfRange(ts.to_rfc3339()));
        }
        Ok(format_bucket(start))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Render a timestamp as a bucket name (no truncation)
pub fn format_bucket(ts: DateTime<Utc>) -> String {
    ts.format(BUCKET_FORMAT).to_string()
}

/// Clamp a query bound into the span that has fixed-width bucket names
pub fn clamp_to_bucket_range(ts: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(MIN_BUCKET_YEAR, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc());
    let last = NaiveDate::from_ymd_opt(MAX_BUCKET_YEAR, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|t| t.and_utc());

    match (first, last) {
        (Some(first), _) if ts < first => first,
        (_, Some(last)) if ts > last => last,
        _ => ts,
    }
}

/// Parse a stored bucket name back into its start time
pub fn parse_bucket(name: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(name, BUCKET_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| StatsError::CorruptBucket(name.to_string()))
}

/// Parse `<int><unit>` sequences with units `s`, `m`, `h` into seconds
fn parse_duration_secs(name: &str) -> Option<i64> {
    if name.is_empty() {
        return None;
    }

    let mut total: i64 = 0;
    let mut rest = name;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: i64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "s" => 1,
            "m" => SECS_PER_MINUTE,
            "h" => 60 * SECS_PER_MINUTE,
            _ => return None,
        };
        rest = &rest[unit_len..];

        total = total.checked_add(value.checked_mul(unit)?)?;
    }

    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 12, 20, h, m, s).unwrap()
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(Resolution::parse("1m").unwrap().width(), TimeDelta::minutes(1));
        assert_eq!(Resolution::parse("15m").unwrap().width(), TimeDelta::minutes(15));
        assert_eq!(Resolution::parse("1h").unwrap().width(), TimeDelta::hours(1));
        assert_eq!(Resolution::parse("24h").unwrap().width(), TimeDelta::hours(24));
        assert_eq!(Resolution::parse("1h30m").unwrap().width(), TimeDelta::minutes(90));
        assert_eq!(Resolution::parse("120s").unwrap().width(), TimeDelta::minutes(2));
    }

    #[test]
    fn test_parse_rejects() {
        for bad in ["", "m", "15", "0m", "30s", "1d", "1.5h", "-1m", "1m30"] {
            assert!(
                matches!(Resolution::parse(bad), Err(StatsError::InvalidResolution(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_list_rejects_duplicates() {
        assert!(Resolution::parse_list(&["1m", "1h"]).is_ok());
        assert!(Resolution::parse_list(&["1m", "1m"]).is_err());
    }

    #[test]
    fn test_truncate_each_resolution() {
        let ts = at(13, 7, 42);
        assert_eq!(Resolution::parse("1m").unwrap().bucket(ts).unwrap(), "2017-12-20 13:07");
        assert_eq!(Resolution::parse("15m").unwrap().bucket(ts).unwrap(), "2017-12-20 13:00");
        assert_eq!(Resolution::parse("1h").unwrap().bucket(ts).unwrap(), "2017-12-20 13:00");
        assert_eq!(Resolution::parse("24h").unwrap().bucket(ts).unwrap(), "2017-12-20 00:00");

        let late = at(13, 52, 0);
        assert_eq!(Resolution::parse("15m").unwrap().bucket(late).unwrap(), "2017-12-20 13:45");
    }

    #[test]
    fn test_truncate_drops_subseconds() {
        let ts = at(13, 7, 0) + TimeDelta::milliseconds(999);
        assert_eq!(Resolution::parse("1m").unwrap().truncate(ts).unwrap(), at(13, 7, 0));
    }

    #[test]
    fn test_bucket_round_trip() {
        let ts = at(13, 0, 0);
        assert_eq!(parse_bucket(&format_bucket(ts)).unwrap(), ts);
        assert!(matches!(
            parse_bucket("2017-12-20"),
            Err(StatsError::CorruptBucket(_))
        ));
    }

    #[test]
    fn test_bucket_names_sort_chronologically() {
        let r = Resolution::parse("1m").unwrap();
        let earlier = r.bucket(at(9, 59, 0)).unwrap();
        let later = r.bucket(at(10, 0, 0)).unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        for name in ["1m", "7m", "1h", "24h"] {
            let r = Resolution::parse(name).unwrap();
            assert!(matches!(
                r.bucket(DateTime::<Utc>::MIN_UTC),
                Err(StatsError::TimestampOutOfRange(_))
            ));
            assert!(matches!(
                r.bucket(DateTime::<Utc>::MAX_UTC),
                Err(StatsError::TimestampOutOfRange(_))
            ));
        }

        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert!(Resolution::parse("1m").unwrap().bucket(far).is_err());
        let early = Utc.with_ymd_and_hms(-1, 12, 31, 23, 59, 0).unwrap();
        assert!(Resolution::parse("1m").unwrap().bucket(early).is_err());
    }

    #[test]
    fn test_bucket_range_edges_keep_fixed_width() {
        let r = Resolution::parse("1m").unwrap();

        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 30).unwrap();
        let name = r.bucket(last).unwrap();
        assert_eq!(name, "9999-12-31 23:59");
        assert_eq!(parse_bucket(&name).unwrap(), r.truncate(last).unwrap());

        let first = Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(r.bucket(first).unwrap(), "0000-01-01 00:00");
    }

    #[test]
    fn test_clamp_to_bucket_range() {
        let inside = at(13, 7, 0);
        assert_eq!(clamp_to_bucket_range(inside), inside);

        let high = clamp_to_bucket_range(DateTime::<Utc>::MAX_UTC);
        assert_eq!(format_bucket(high), "9999-12-31 23:59");
        let low = clamp_to_bucket_range(DateTime::<Utc>::MIN_UTC);
        assert_eq!(format_bucket(low), "0000-01-01 00:00");
    }
}
