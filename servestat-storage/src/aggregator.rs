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

//! Aggregator - ties the counter buffer to the aggregate store
//!
//! Producers call [`Aggregator::save`]; a background task drains the buffer
//! on a fixed period and accumulates every drained count into every
//! configured resolution, stamped with the flush time.
//!
//! `save` and the flush share one orchestration lock: a flush (drain plus all
//! of its store writes) is a single unit relative to producers.
//!
//! Failures are per record. A record the store rejects is logged and counted
//! as failed, and the flush moves on to the next one.

use crate::aggregate_store::AggregateStore;
use crate::backend::{InMemoryStore, PersistentStore};
use crate::counter_buffer::CounterBuffer;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use servestat_core::StatRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one flush cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Destination hosts drained from the buffer
    pub destinations: usize,
    /// Aggregation records handed to the store
    pub records: usize,
    /// Records the store rejected
    pub failed: usize,
}

/// Cumulative counters since the aggregator was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub saves: u64,
    pub flushes: u64,
    pub records_written: u64,
    pub records_failed: u64,
}

#[derive(Debug, Default)]
struct AtomicStats {
    saves: AtomicU64,
    flushes: AtomicU64,
    records_written: AtomicU64,
    records_failed: AtomicU64,
}

struct Inner<M, P> {
    lock: Mutex<()>,
    in_memory: M,
    persistent: P,
    stats: AtomicStats,
}

impl<M: InMemoryStore, P: PersistentStore> Inner<M, P> {
    fn flush_at(&self, now: DateTime<Utc>) -> FlushReport {
        let _guard = self.lock.lock();

        let destinations = self.in_memory.pop();
        let mut report = FlushReport {
            destinations: destinations.len(),
            ..Default::default()
        };

        for destination in &destinations {
            for agg in destination.aggregations(now) {
                report.records += 1;
                if let Err(e) = self.persistent.save(&agg) {
                    report.failed += 1;
                    warn!(
                        "Dropped {} request(s) for {} to {}: {}",
                        agg.count, agg.fname, agg.dest_host, e
                    );
                }
            }
        }

        self.stats.flushes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .records_written
            .fetch_add((report.records - report.failed) as u64, Ordering::Relaxed);
        self.stats
            .records_failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);

        report
    }
}

/// Write buffer plus durable rollup store, with a periodic flush task
pub struct Aggregator<M = CounterBuffer, P = AggregateStore>
where
    M: InMemoryStore + 'static,
    P: PersistentStore + 'static,
{
    inner: Arc<Inner<M, P>>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<M, P> Aggregator<M, P>
where
    M: InMemoryStore + 'static,
    P: PersistentStore + 'static,
{
    /// Create an aggregator without a background task.
    ///
    /// Counts only reach the store through [`Aggregator::flush`] or
    /// [`Aggregator::shutdown`].
    pub fn new(in_memory: M, persistent: P) -> Self {
        Self {
            inner: Arc::new(Inner {
                lock: Mutex::new(()),
                in_memory,
                persistent,
                stats: AtomicStats::default(),
            }),
            shutdown: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Create an aggregator and start flushing every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(interval: Duration, in_memory: M, persistent: P) -> Self {
        let aggregator = Self::new(in_memory, persistent);
        let handle = tokio::spawn(run_flush_loop(
            Arc::clone(&aggregator.inner),
            interval,
            aggregator.shutdown.clone(),
        ));
        *aggregator.task.lock() = Some(handle);

        info!("Aggregator started, flushing every {:?}", interval);
        aggregator
    }

    /// Record one delivery of `record.fname` to `record.dest_host`
    pub fn save(&self, record: &StatRecord) {
        let _guard = self.inner.lock.lock();
        self.inner.in_memory.add(&record.dest_host, &record.fname);
        self.inner.stats.saves.fetch_add(1, Ordering::Relaxed);
    }

    /// Drain the buffer and accumulate it under `now`
    pub fn flush_at(&self, now: DateTime<Utc>) -> FlushReport {
        self.inner.flush_at(now)
    }

    /// Drain the buffer and accumulate it under the current time
    pub fn flush(&self) -> FlushReport {
        self.flush_at(Utc::now())
    }

    /// Stop the background task and flush whatever is still buffered.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self.task.lock().take();
        match handle {
            // The loop performs the final flush before exiting
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!("Aggregator task failed: {}", e);
                }
            }
            None => {
                let inner = Arc::clone(&self.inner);
                match tokio::task::spawn_blocking(move || inner.flush_at(Utc::now())).await {
                    Ok(report) => log_final_flush(&report),
                    Err(e) => error!("Final flush failed: {}", e),
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> AggregatorStats {
        let s = &self.inner.stats;
        AggregatorStats {
            saves: s.saves.load(Ordering::Relaxed),
            flushes: s.flushes.load(Ordering::Relaxed),
            records_written: s.records_written.load(Ordering::Relaxed),
            records_failed: s.records_failed.load(Ordering::Relaxed),
        }
    }

    pub fn in_memory(&self) -> &M {
        &self.inner.in_memory
    }

    pub fn persistent(&self) -> &P {
        &self.inner.persistent
    }
}

impl<M, P> Drop for Aggregator<M, P>
where
    M: InMemoryStore + 'static,
    P: PersistentStore + 'static,
{
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn log_final_flush(report: &FlushReport) {
    info!(
        "Final flush: {} record(s) from {} destination(s), {} failed",
        report.records, report.destinations, report.failed
    );
}

async fn run_flush_loop<M, P>(inner: Arc<Inner<M, P>>, period: Duration, shutdown: CancellationToken)
where
    M: InMemoryStore + 'static,
    P: PersistentStore + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let flush_inner = Arc::clone(&inner);
                match tokio::task::spawn_blocking(move || flush_inner.flush_at(Utc::now())).await {
                    Ok(report) if report.records > 0 => debug!(
                        "Flushed {} record(s) from {} destination(s), {} failed",
                        report.records, report.destinations, report.failed
                    ),
                    Ok(_) => {}
                    Err(e) => error!("Flush failed: {}", e),
                }
            }
        }
    }

    match tokio::task::spawn_blocking(move || inner.flush_at(Utc::now())).await {
        Ok(report) => log_final_flush(&report),
        Err(e) => error!("Final flush failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use servestat_core::{BucketCount, Result, RollupKey, StatAggregation, StatsError};

    /// Keeps every saved aggregation; rejects file names starting with "bad"
    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<StatAggregation>>,
    }

    impl RecordingStore {
        fn saved(&self) -> Vec<StatAggregation> {
            let mut saved = self.saved.lock().clone();
            saved.sort_by(|a, b| (&a.dest_host, &a.fname).cmp(&(&b.dest_host, &b.fname)));
            saved
        }
    }

    impl PersistentStore for RecordingStore {
        fn save(&self, agg: &StatAggregation) -> Result<()> {
            if agg.fname.starts_with("bad") {
                return Err(StatsError::Storage("disk full".to_string()));
            }
            self.saved.lock().push(agg.clone());
            Ok(())
        }

        fn get(
            &self,
            _resolution: &str,
            _key: &RollupKey,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<BucketCount>> {
            Ok(Vec::new())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 12, 20, 13, 7, 0).unwrap()
    }

    #[test]
    fn test_flush_stamps_records_with_flush_time() {
        let aggregator = Aggregator::new(CounterBuffer::new(), RecordingStore::default());
        aggregator.save(&StatRecord::new("H", "a.mp3"));
        aggregator.save(&StatRecord::new("H", "a.mp3"));
        aggregator.save(&StatRecord::new("H2", "b.mp3"));

        let report = aggregator.flush_at(now());
        assert_eq!(
            report,
            FlushReport {
                destinations: 2,
                records: 2,
                failed: 0
            }
        );
        assert_eq!(
            aggregator.persistent().saved(),
            vec![
                StatAggregation::new("a.mp3", "H", 2, now()),
                StatAggregation::new("b.mp3", "H2", 1, now()),
            ]
        );
        assert!(aggregator.in_memory().is_empty());

        // Nothing buffered, nothing written
        assert_eq!(aggregator.flush_at(now()), FlushReport::default());
    }

    #[test]
    fn test_failed_record_does_not_abort_flush() {
        let aggregator = Aggregator::new(CounterBuffer::new(), RecordingStore::default());
        aggregator.save(&StatRecord::new("H", "bad.mp3"));
        aggregator.save(&StatRecord::new("H", "a.mp3"));
        aggregator.save(&StatRecord::new("H2", "b.mp3"));

        let report = aggregator.flush_at(now());
        assert_eq!(report.records, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(aggregator.persistent().saved().len(), 2);

        let stats = aggregator.stats();
        assert_eq!(stats.saves, 3);
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.records_written, 2);
        assert_eq!(stats.records_failed, 1);
    }

    #[tokio::test]
    async fn test_background_task_flushes_periodically() {
        let aggregator = Aggregator::start(
            Duration::from_millis(20),
            CounterBuffer::new(),
            RecordingStore::default(),
        );
        assert!(aggregator.is_running());

        aggregator.save(&StatRecord::new("H", "a.mp3"));

        let mut flushed = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !aggregator.persistent().saved().is_empty() {
                flushed = true;
                break;
            }
        }
        assert!(flushed, "background flush never ran");
        assert_eq!(aggregator.persistent().saved()[0].count, 1);

        aggregator.shutdown().await;
        assert!(!aggregator.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_drains_buffer() {
        let aggregator = Aggregator::start(
            Duration::from_secs(3600),
            CounterBuffer::new(),
            RecordingStore::default(),
        );
        aggregator.save(&StatRecord::new("H", "a.mp3"));
        aggregator.save(&StatRecord::new("H", "a.mp3"));

        aggregator.shutdown().await;

        let saved = aggregator.persistent().saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].count, 2);

        // Second shutdown is a no-op
        aggregator.shutdown().await;
        assert_eq!(aggregator.persistent().saved().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_task_flushes() {
        let aggregator = Aggregator::new(CounterBuffer::new(), RecordingStore::default());
        aggregator.save(&StatRecord::new("H", "a.mp3"));

        aggregator.shutdown().await;

        assert_eq!(aggregator.persistent().saved().len(), 1);
    }
}
