// Facility Gateway Server - HTTP service for the facility telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Facility Gateway Server
//!
//! Serves occupancy, people-count and environmental telemetry over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Store settings come from the environment
//! FACILITY_DB_HOST=db.local FACILITY_DB_NAME=facility \
//! FACILITY_DB_USER=gateway FACILITY_DB_PASSWORD=secret \
//!     facility-gateway-server --port 8080
//!
//! # Synthetic data only
//! FACILITY_FORCE_MOCK=true facility-gateway-server
//! ```

mod error;
mod metrics;
mod pg;
mod routes;

use clap::Parser;
use error::{Result, ServerError};
use facility_gateway::{GatewayConfig, TelemetryGateway};
use pg::PgStore;
use routes::{router, AppState};
use sqlx::PgPool;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Facility telemetry gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build the gateway, and the pool when the store is configured
fn build_gateway(config: &GatewayConfig) -> (TelemetryGateway, Option<PgPool>) {
    match config.store_config() {
        Ok(store_config) => {
            info!(
                host = %store_config.host,
                port = store_config.port,
                database = %store_config.database,
                "store configured"
            );
            let store = PgStore::connect_lazy(store_config);
            let pool = store.pool().clone();
            let gateway = TelemetryGateway::new(Arc::new(store)).configure(config);
            (gateway, Some(pool))
        }
        Err(err) => {
            warn!("{}; every telemetry request will fail with 500", err);
            (TelemetryGateway::unconfigured(err.clone()).configure(config), None)
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("Facility Gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::from_env()?;
    info!(
        open_hour = config.window.open_hour,
        close_hour = config.window.close_hour,
        force_mock = config.force_mock,
        "gateway policy loaded"
    );

    let (gateway, pool) = build_gateway(&config);
    let app = router(Arc::new(AppState { gateway }));

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!("Starting server on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    if let Some(pool) = pool {
        pool.close().await;
        info!("store pool closed");
    }
    Ok(())
}
