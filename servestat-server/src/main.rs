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

use anyhow::Result;
use clap::Parser;
use servestat_server::{config::ServerConfig, run_server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, env = "STATS_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Aggregate database path (overrides config file)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Comma-separated resolutions, e.g. "1m,1h" (overrides config file)
    #[arg(long, value_delimiter = ',')]
    resolutions: Option<Vec<String>>,

    /// Flush interval in milliseconds (overrides config file)
    #[arg(long)]
    flush_interval_ms: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = ServerConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(db_path) = args.db_path {
        config.storage.db_path = db_path;
    }
    if let Some(resolutions) = args.resolutions {
        config.storage.resolutions = resolutions;
    }
    if let Some(interval) = args.flush_interval_ms {
        config.storage.flush_interval_ms = interval;
    }
    if args.debug {
        config.server.debug = true;
    }

    // Run server
    run_server(config).await
}
