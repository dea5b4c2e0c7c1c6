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

//! Servestat Server
//!
//! HTTP intake for load balancer delivery records, backed by the
//! aggregation engine in `servestat-storage`.

pub mod api;
pub mod config;

use anyhow::Result;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use config::ServerConfig;
use servestat_storage::{AggregateStore, Aggregator, CounterBuffer};

fn default_log_filter(debug: bool) -> &'static str {
    if debug {
        "servestat_server=debug,servestat_storage=debug,tower_http=debug"
    } else {
        "servestat_server=info,servestat_storage=info,tower_http=info"
    }
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(config.server.debug).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Servestat Server");
    tracing::debug!("Configuration: {:#?}", config);

    // Validate configuration
    config.validate()?;

    let store = AggregateStore::open(&config.storage.db_path, config.resolutions()?)?;
    let aggregator = Arc::new(Aggregator::start(
        config.flush_interval(),
        CounterBuffer::new(),
        store,
    ));

    let app = api::router(AppState::new(Arc::clone(&aggregator))).layer(TraceLayer::new_for_http());

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, flushing buffered counts");
    aggregator.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await
        }
    }
}
