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

//! End-to-end tests: producers -> counter buffer -> aggregate store

use chrono::{DateTime, TimeZone, Utc};
use servestat_core::{BucketCount, RollupKey, StatRecord};
use servestat_storage::{AggregateStore, Aggregator, CounterBuffer, PersistentStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const RESOLUTIONS: [&str; 4] = ["1m", "15m", "1h", "24h"];

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 12, 20, h, m, 0).unwrap()
}

fn open_store(dir: &TempDir) -> AggregateStore {
    AggregateStore::open_with_names(dir.path().join("stats.db"), &RESOLUTIONS).unwrap()
}

/// Two flushes inside one hour land in the same hourly bucket
#[test]
fn test_flushes_accumulate_into_hour_bucket() {
    let dir = TempDir::new().unwrap();
    let aggregator = Aggregator::new(CounterBuffer::new(), open_store(&dir));

    for _ in 0..3 {
        aggregator.save(&StatRecord::new("H", "a.mp3"));
    }
    aggregator.flush_at(at(13, 10));

    for _ in 0..2 {
        aggregator.save(&StatRecord::new("H", "a.mp3"));
    }
    aggregator.flush_at(at(13, 50));

    let store = aggregator.persistent();
    assert_eq!(
        store.query("1h", "a.mp3", "H", at(13, 0), at(14, 0)).unwrap(),
        vec![BucketCount { ts: at(13, 0), count: 5 }]
    );
    assert_eq!(
        store.query("1m", "a.mp3", "H", at(13, 0), at(14, 0)).unwrap(),
        vec![
            BucketCount { ts: at(13, 10), count: 3 },
            BucketCount { ts: at(13, 50), count: 2 },
        ]
    );
    assert_eq!(
        store.query("15m", "a.mp3", "H", at(13, 0), at(14, 0)).unwrap(),
        vec![
            BucketCount { ts: at(13, 0), count: 3 },
            BucketCount { ts: at(13, 45), count: 2 },
        ]
    );
}

/// Rollup totals agree with the exact counts that feed them
#[test]
fn test_rollups_match_exact_counts() {
    let dir = TempDir::new().unwrap();
    let aggregator = Aggregator::new(CounterBuffer::new(), open_store(&dir));

    let deliveries = [
        ("edge-1", "a.mp3", 4),
        ("edge-1", "b.mp3", 1),
        ("edge-2", "a.mp3", 2),
    ];
    for (host, fname, n) in deliveries {
        for _ in 0..n {
            aggregator.save(&StatRecord::new(host, fname));
        }
    }
    let report = aggregator.flush_at(at(9, 30));
    assert_eq!(report.destinations, 2);
    assert_eq!(report.records, 3);
    assert_eq!(report.failed, 0);

    let store = aggregator.persistent();
    let total = |key: RollupKey| -> u64 {
        store
            .get("24h", &key, at(0, 0), at(0, 0))
            .unwrap()
            .iter()
            .map(|b| b.count)
            .sum()
    };

    assert_eq!(total(RollupKey::exact("a.mp3", "edge-1")), 4);
    assert_eq!(total(RollupKey::from_query("", "edge-1")), 5);
    assert_eq!(total(RollupKey::from_query("a.mp3", "")), 6);
    assert_eq!(total(RollupKey::all()), 7);
}

/// Counts survive a shutdown and a reopen of the database file
#[tokio::test]
async fn test_shutdown_flushes_to_disk() {
    let dir = TempDir::new().unwrap();
    let before = Utc::now();

    {
        let aggregator = Aggregator::start(
            Duration::from_secs(3600),
            CounterBuffer::new(),
            open_store(&dir),
        );
        aggregator.save(&StatRecord::new("H", "a.mp3"));
        aggregator.save(&StatRecord::new("H", "b.mp3"));
        aggregator.shutdown().await;
    }

    let after = Utc::now();
    let store = open_store(&dir);
    let result = store
        .query("24h", "", "H", before - chrono::TimeDelta::days(1), after)
        .unwrap();
    assert_eq!(result.iter().map(|b| b.count).sum::<u64>(), 2);
}

/// Producers on many threads while the background task flushes
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_with_background_flush() {
    let dir = TempDir::new().unwrap();
    let before = Utc::now();
    let aggregator = Arc::new(Aggregator::start(
        Duration::from_millis(5),
        CounterBuffer::new(),
        open_store(&dir),
    ));

    let mut producers = Vec::new();
    for t in 0..4 {
        let aggregator = Arc::clone(&aggregator);
        producers.push(tokio::task::spawn_blocking(move || {
            for i in 0..250 {
                aggregator.save(&StatRecord::new(format!("edge-{}", t), format!("f{}.mp3", i % 5)));
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    aggregator.shutdown().await;
    let after = Utc::now();

    let stats = aggregator.stats();
    assert_eq!(stats.saves, 1000);
    assert_eq!(stats.records_failed, 0);

    let total: u64 = aggregator
        .persistent()
        .query("1m", "", "", before - chrono::TimeDelta::minutes(1), after)
        .unwrap()
        .iter()
        .map(|b| b.count)
        .sum();
    assert_eq!(total, 1000);
}
