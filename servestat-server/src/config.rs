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

//! Server configuration
//!
//! Defaults, then an optional TOML file, then `STATS_*` environment
//! variables; command-line flags are applied last by the binary.
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 7070
//! debug = false
//!
//! [storage]
//! db_path = "./servestat.db"
//! resolutions = ["1m", "15m", "1h", "24h"]
//! flush_interval_ms = 1000
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use servestat_core::Resolution;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PORT: &str = "STATS_PORT";
pub const ENV_DEBUG: &str = "STATS_DEBUG";
pub const ENV_DB_PATH: &str = "STATS_DB_PATH";
pub const ENV_RESOLUTIONS: &str = "STATS_RESOLUTIONS";
pub const ENV_FLUSH_INTERVAL_MS: &str = "STATS_FLUSH_INTERVAL_MS";

/// Servestat Server Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// Interface to bind (e.g. "0.0.0.0")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Raise the default log level to debug
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the aggregate database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Resolution names, e.g. "1m", "1h"
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<String>,

    /// Period between buffer flushes, in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            debug: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            resolutions: default_resolutions(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

// Default values
fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7070
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./servestat.db")
}

fn default_resolutions() -> Vec<String> {
    ["1m", "15m", "1h", "24h"].iter().map(|s| s.to_string()).collect()
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - STATS_PORT: HTTP port (default: 7070)
    /// - STATS_DEBUG: Debug logging (default: false)
    /// - STATS_DB_PATH: Database file (default: ./servestat.db)
    /// - STATS_RESOLUTIONS: Comma-separated resolutions (default: 1m,15m,1h,24h)
    /// - STATS_FLUSH_INTERVAL_MS: Flush period in ms (default: 1000)
    pub fn from_env() -> Self {
        Self::default().merge_with_env()
    }

    /// Load configuration: defaults, overridden by the file, overridden by env
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        Ok(config.merge_with_env())
    }

    /// Apply every `STATS_*` variable that is set and parses
    fn merge_with_env(mut self) -> Self {
        if let Ok(port) = std::env::var(ENV_PORT) {
            match port.parse() {
                Ok(val) => self.server.port = val,
                Err(_) => tracing::warn!("Ignoring invalid {}: {}", ENV_PORT, port),
            }
        }

        if let Ok(debug) = std::env::var(ENV_DEBUG) {
            if let Some(val) = parse_bool(&debug) {
                self.server.debug = val;
            }
        }

        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            self.storage.db_path = PathBuf::from(path);
        }

        if let Ok(resolutions) = std::env::var(ENV_RESOLUTIONS) {
            self.storage.resolutions = parse_list(&resolutions);
        }

        if let Ok(interval) = std::env::var(ENV_FLUSH_INTERVAL_MS) {
            match interval.parse() {
                Ok(val) => self.storage.flush_interval_ms = val,
                Err(_) => tracing::warn!("Ignoring invalid {}: {}", ENV_FLUSH_INTERVAL_MS, interval),
            }
        }

        self
    }

    /// Parse bind address and port as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.server.bind_addr, self.server.port).parse()?)
    }

    /// Parsed resolutions, in configuration order
    pub fn resolutions(&self) -> Result<Vec<Resolution>> {
        Ok(Resolution::parse_list(&self.storage.resolutions)?)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.storage.flush_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.storage.resolutions.is_empty() {
            anyhow::bail!("At least one resolution must be configured");
        }
        self.resolutions()?;

        if self.storage.flush_interval_ms == 0 {
            anyhow::bail!("flush_interval_ms must be greater than zero");
        }

        Ok(())
    }
}
