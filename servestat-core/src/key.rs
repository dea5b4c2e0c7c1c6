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

//! Rollup keys
//!
//! Every aggregation updates four keys so that "all files to a host",
//! "a file to all hosts" and the global total are single point reads:
//!
//! ```text
//! (fname, host)   (ALL, host)   (fname, ALL)   (ALL, ALL)
//! ```
//!
//! ## Key Encoding
//!
//! Each component is stored as its own string so no separator can be
//! confused with a name:
//!
//! - Exact name: `={name}`
//! - Wildcard:   `*`
//!
//! An exact component always starts with `=`, so a host or file literally
//! named `ALL` (or `*`) never lands on a rollup key.

use serde::{Deserialize, Serialize};
use std::fmt;

const EXACT_PREFIX: char = '=';
const ALL_ENCODED: &str = "*";

/// One side of a rollup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    /// A concrete file name or destination host
    Exact(String),
    /// Any value for this side
    All,
}

impl Dimension {
    pub fn exact(name: impl Into<String>) -> Self {
        Dimension::Exact(name.into())
    }

    /// Map a query parameter onto a dimension: the empty string means "any".
    ///
    /// Only the query path does this. Ingestion keeps empty names as
    /// `Exact("")`.
    pub fn from_query(name: &str) -> Self {
        if name.is_empty() {
            Dimension::All
        } else {
            Dimension::Exact(name.to_string())
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Dimension::All)
    }

    /// On-disk form of this component
    pub fn encode(&self) -> String {
        match self {
            Dimension::Exact(name) => {
                let mut out = String::with_capacity(name.len() + 1);
                out.push(EXACT_PREFIX);
                out.push_str(name);
                out
            }
            Dimension::All => ALL_ENCODED.to_string(),
        }
    }

    /// Inverse of [`Dimension::encode`]
    pub fn decode(encoded: &str) -> Option<Self> {
        if encoded == ALL_ENCODED {
            return Some(Dimension::All);
        }
        encoded
            .strip_prefix(EXACT_PREFIX)
            .map(|name| Dimension::Exact(name.to_string()))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Exact(name) => write!(f, "{}", name),
            Dimension::All => write!(f, "ALL"),
        }
    }
}

/// Key under which a count is accumulated inside one bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RollupKey {
    pub fname: Dimension,
    pub dest_host: Dimension,
}

impl RollupKey {
    pub fn new(fname: Dimension, dest_host: Dimension) -> Self {
        Self { fname, dest_host }
    }

    /// Exact key for a file served to a host
    pub fn exact(fname: impl Into<String>, dest_host: impl Into<String>) -> Self {
        Self::new(Dimension::exact(fname), Dimension::exact(dest_host))
    }

    /// Global total across every file and host
    pub fn all() -> Self {
        Self::new(Dimension::All, Dimension::All)
    }

    /// Build the query key; empty strings select the rollup dimension
    pub fn from_query(fname: &str, dest_host: &str) -> Self {
        Self::new(Dimension::from_query(fname), Dimension::from_query(dest_host))
    }

    /// The four keys one aggregation contributes to, in order:
    /// exact, all files to the host, the file to all hosts, global.
    pub fn expand(fname: &str, dest_host: &str) -> [RollupKey; 4] {
        [
            RollupKey::exact(fname, dest_host),
            RollupKey::new(Dimension::All, Dimension::exact(dest_host)),
            RollupKey::new(Dimension::exact(fname), Dimension::All),
            RollupKey::all(),
        ]
    }

    /// Encoded `(fname, dest_host)` components
    pub fn encode(&self) -> (String, String) {
        (self.fname.encode(), self.dest_host.encode())
    }
}

impl fmt::Display for RollupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.fname, self.dest_host)
    }
}
