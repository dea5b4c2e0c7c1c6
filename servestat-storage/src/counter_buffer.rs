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

//! Counter Buffer - in-memory write tier
//!
//! Absorbs one increment per delivered file without touching disk. All state
//! sits behind a single mutex, so `add` and `pop` never interleave: an
//! increment lands either in the generation a `pop` returns or in the next
//! one, never in both and never lost.

use crate::backend::InMemoryStore;
use parking_lot::Mutex;
use servestat_core::{Destination, Result, StatsError};
use std::collections::HashMap;

/// Per-destination file counts accumulated since the last drain
#[derive(Debug, Default)]
pub struct CounterBuffer {
    destinations: Mutex<HashMap<String, Destination>>,
}

impl CounterBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of destination hosts currently buffered
    pub fn len(&self) -> usize {
        self.destinations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.lock().is_empty()
    }
}

impl InMemoryStore for CounterBuffer {
    #[inline]
    fn add(&self, host: &str, fname: &str) {
        let mut destinations = self.destinations.lock();
        if let Some(destination) = destinations.get_mut(host) {
            destination.record(fname);
            return;
        }

        let mut destination = Destination::new(host);
        destination.record(fname);
        destinations.insert(host.to_string(), destination);
    }

    fn get(&self, host: &str) -> Result<Destination> {
        self.destinations
            .lock()
            .get(host)
            .cloned()
            .ok_or_else(|| StatsError::DestinationNotFound(host.to_string()))
    }

    fn clear(&self, host: &str) -> Result<()> {
        match self.destinations.lock().get_mut(host) {
            Some(destination) => {
                destination.requests.clear();
                Ok(())
            }
            None => Err(StatsError::DestinationNotFound(host.to_string())),
        }
    }

    fn delete(&self, host: &str) -> Result<()> {
        self.destinations
            .lock()
            .remove(host)
            .map(|_| ())
            .ok_or_else(|| StatsError::DestinationNotFound(host.to_string()))
    }

    fn pop(&self) -> Vec<Destination> {
        let drained = std::mem::take(&mut *self.destinations.lock());

        // Sorted so flush logs and reports are stable
        let mut destinations: Vec<_> = drained.into_values().collect();
        destinations.sort_by(|a, b| a.host.cmp(&b.host));
        destinations
    }
}
