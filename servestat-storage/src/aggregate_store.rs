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

//! Aggregate Store - durable multi-resolution rollup counts
//!
//! Pre-aggregated counts kept per resolution and time bucket, so a report
//! over "all files to host H" or "file F everywhere" is one point read per
//! bucket instead of a scan-and-sum.
//!
//! ## Layout
//!
//! One pair of redb tables per configured resolution (e.g. `1m`, `1h`):
//!
//! ```text
//! counts/{resolution}   (bucket, fname, host) -> u64 big-endian (8 bytes)
//! buckets/{resolution}  bucket                -> ()
//! ```
//!
//! `bucket` is the flush time floored to the resolution and rendered as
//! `YYYY-MM-DD HH:MM`; `fname`/`host` are [`Dimension`] encodings. The bucket
//! directory is what range queries seek through.
//!
//! ## Transactions
//!
//! The four rollup updates of one record commit in a single write
//! transaction, so a crash never leaves a partially applied record. redb
//! admits one writer at a time.

use crate::backend::PersistentStore;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use servestat_core::{
    clamp_to_bucket_range, decode_count, encode_count, format_bucket, parse_bucket, BucketCount,
    Dimension, Resolution, Result, RollupKey, StatAggregation, StatsError,
};
use std::collections::HashSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Table prefix for rollup counts
pub const COUNTS_PREFIX: &str = "counts";
/// Table prefix for the per-resolution bucket directory
pub const BUCKETS_PREFIX: &str = "buckets";

type CountKey = (&'static str, &'static str, &'static str);

fn counts_table(name: &str) -> TableDefinition<'_, CountKey, &'static [u8]> {
    TableDefinition::new(name)
}

fn buckets_table(name: &str) -> TableDefinition<'_, &'static str, ()> {
    TableDefinition::new(name)
}

fn storage_err(e: impl Display) -> StatsError {
    StatsError::Storage(e.to_string())
}

/// Tables backing one resolution
#[derive(Debug, Clone)]
struct Partition {
    resolution: Resolution,
    counts: String,
    buckets: String,
}

impl Partition {
    fn new(resolution: Resolution) -> Self {
        Self {
            counts: format!("{}/{}", COUNTS_PREFIX, resolution.name()),
            buckets: format!("{}/{}", BUCKETS_PREFIX, resolution.name()),
            resolution,
        }
    }
}

/// Durable rollup store
pub struct AggregateStore {
    db: Database,
    path: PathBuf,
    partitions: Vec<Partition>,
}

impl AggregateStore {
    /// Open (or create) the store at `path` with one partition per resolution.
    ///
    /// Missing partitions are created; existing ones are left untouched, so
    /// reopening a populated store is safe. A resolution listed twice is
    /// rejected, since every save would count into it twice.
    pub fn open<P: AsRef<Path>>(path: P, resolutions: Vec<Resolution>) -> Result<Self> {
        let mut seen = HashSet::new();
        for resolution in &resolutions {
            if !seen.insert(resolution.name()) {
                return Err(StatsError::InvalidResolution(format!(
                    "{} (duplicate)",
                    resolution.name()
                )));
            }
        }

        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(&path).map_err(storage_err)?;
        let partitions: Vec<Partition> = resolutions.into_iter().map(Partition::new).collect();

        let txn = db.begin_write().map_err(storage_err)?;
        for partition in &partitions {
            txn.open_table(counts_table(&partition.counts))
                .map_err(storage_err)?;
            txn.open_table(buckets_table(&partition.buckets))
                .map_err(storage_err)?;
        }
        txn.commit().map_err(storage_err)?;

        info!(
            "Opened aggregate store at {:?} with resolutions [{}]",
            path,
            partitions
                .iter()
                .map(|p| p.resolution.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            db,
            path,
            partitions,
        })
    }

    /// Open with resolution names such as `["1m", "15m", "1h", "24h"]`
    pub fn open_with_names<P: AsRef<Path>, S: AsRef<str>>(path: P, names: &[S]) -> Result<Self> {
        Self::open(path, Resolution::parse_list(names)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured resolutions, in configuration order
    pub fn resolutions(&self) -> impl Iterator<Item = &Resolution> {
        self.partitions.iter().map(|p| &p.resolution)
    }

    fn partition(&self, resolution: &str) -> Result<&Partition> {
        self.partitions
            .iter()
            .find(|p| p.resolution.name() == resolution)
            .ok_or_else(|| StatsError::UnknownResolution(resolution.to_string()))
    }

    /// Add `agg.count` to the four rollup keys of `agg` in the bucket holding
    /// `agg.ts` at `resolution`. Durable once this returns `Ok`.
    pub fn accumulate(&self, resolution: &str, agg: &StatAggregation) -> Result<()> {
        self.accumulate_many(resolution, std::slice::from_ref(agg))
    }

    /// Accumulate a batch in one transaction. Equivalent, count for count, to
    /// accumulating each record separately.
    pub fn accumulate_many(&self, resolution: &str, aggs: &[StatAggregation]) -> Result<()> {
        let partition = self.partition(resolution)?;

        let txn = self.db.begin_write().map_err(storage_err)?;
        Self::apply(&txn, partition, aggs)?;
        txn.commit().map_err(storage_err)?;

        debug!(
            "Accumulated {} record(s) into resolution {}",
            aggs.len(),
            resolution
        );
        Ok(())
    }

    /// Read-add-write every rollup key. Any error leaves `txn` uncommitted,
    /// and dropping it aborts.
    fn apply(txn: &WriteTransaction, partition: &Partition, aggs: &[StatAggregation]) -> Result<()> {
        let mut counts = txn
            .open_table(counts_table(&partition.counts))
            .map_err(storage_err)?;
        let mut buckets = txn
            .open_table(buckets_table(&partition.buckets))
            .map_err(storage_err)?;

        for agg in aggs {
            let bucket = partition.resolution.bucket(agg.ts)?;
            buckets.insert(bucket.as_str(), ()).map_err(storage_err)?;

            for key in RollupKey::expand(&agg.fname, &agg.dest_host) {
                let (fname, host) = key.encode();
                let slot = (bucket.as_str(), fname.as_str(), host.as_str());

                let current = {
                    let stored = counts.get(slot).map_err(storage_err)?;
                    decode_count(&key.to_string(), stored.as_ref().map(|v| v.value()))?
                };

                let updated = encode_count(current.saturating_add(agg.count));
                counts.insert(slot, &updated[..]).map_err(storage_err)?;
            }
        }

        Ok(())
    }

    /// Counts for `key` in every bucket named within `[from, to]` at
    /// `resolution`, ascending. Bounds are formatted as bucket names, not
    /// truncated, after clamping to years 0000..=9999. Buckets without a
    /// count for `key` are omitted.
    pub fn range_query(
        &self,
        resolution: &str,
        key: &RollupKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BucketCount>> {
        let partition = self.partition(resolution)?;
        let min = format_bucket(clamp_to_bucket_range(from));
        let max = format_bucket(clamp_to_bucket_range(to));
        if min > max {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read().map_err(storage_err)?;
        let buckets = txn
            .open_table(buckets_table(&partition.buckets))
            .map_err(storage_err)?;
        let counts = txn
            .open_table(counts_table(&partition.counts))
            .map_err(storage_err)?;

        let (fname, host) = key.encode();
        let label = key.to_string();
        let mut results = Vec::new();

        for entry in buckets
            .range(min.as_str()..=max.as_str())
            .map_err(storage_err)?
        {
            let (bucket, _) = entry.map_err(storage_err)?;
            let bucket = bucket.value();

            let stored = counts
                .get((bucket, fname.as_str(), host.as_str()))
                .map_err(storage_err)?;
            let count = decode_count(&label, stored.as_ref().map(|v| v.value()))?;

            if count > 0 {
                results.push(BucketCount {
                    ts: parse_bucket(bucket)?,
                    count,
                });
            }
        }

        Ok(results)
    }

    /// Range query by names; an empty `fname` or `dest_host` selects all
    pub fn query(
        &self,
        resolution: &str,
        fname: &str,
        dest_host: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BucketCount>> {
        self.range_query(resolution, &RollupKey::from_query(fname, dest_host), from, to)
    }

    /// Every key stored in the bucket holding `ts` at `resolution`
    pub fn bucket_entries(
        &self,
        resolution: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<(RollupKey, u64)>> {
        let partition = self.partition(resolution)?;
        let bucket = partition.resolution.bucket(ts)?;

        let txn = self.db.begin_read().map_err(storage_err)?;
        let counts = txn
            .open_table(counts_table(&partition.counts))
            .map_err(storage_err)?;

        let mut entries = Vec::new();
        for entry in counts
            .range((bucket.as_str(), "", "")..)
            .map_err(storage_err)?
        {
            let (slot, value) = entry.map_err(storage_err)?;
            let (slot_bucket, fname, host) = slot.value();
            if slot_bucket != bucket {
                break;
            }

            let key = match (Dimension::decode(fname), Dimension::decode(host)) {
                (Some(fname), Some(host)) => RollupKey::new(fname, host),
                _ => {
                    return Err(StatsError::Storage(format!(
                        "undecodable key ({:?}, {:?}) in bucket {}",
                        fname, host, bucket
                    )))
                }
            };
            let count = decode_count(&key.to_string(), Some(value.value()))?;
            entries.push((key, count));
        }

        Ok(entries)
    }

    /// Bucket names present for `resolution`, ascending
    pub fn buckets(&self, resolution: &str) -> Result<Vec<String>> {
        let partition = self.partition(resolution)?;

        let txn = self.db.begin_read().map_err(storage_err)?;
        let buckets = txn
            .open_table(buckets_table(&partition.buckets))
            .map_err(storage_err)?;

        let mut names = Vec::new();
        for entry in buckets.iter().map_err(storage_err)? {
            let (name, _) = entry.map_err(storage_err)?;
            names.push(name.value().to_string());
        }
        Ok(names)
    }
}

impl PersistentStore for AggregateStore {
    fn save(&self, agg: &StatAggregation) -> Result<()> {
        let mut first_err = None;

        for partition in &self.partitions {
            let name = partition.resolution.name();
            if let Err(e) = self.accumulate(name, agg) {
                warn!(
                    "Failed to accumulate {}_{} into {}: {}",
                    agg.fname, agg.dest_host, name, e
                );
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn get(
        &self,
        resolution: &str,
        key: &RollupKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BucketCount>> {
        self.range_query(resolution, key, from, to)
    }
}
