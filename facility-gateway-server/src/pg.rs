// Facility Gateway Server - PostgreSQL store
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! PostgreSQL implementation of [`TelemetryStore`].
//!
//! The pool is built lazily: no connection is attempted until the first
//! request that passes the gateway's I/O-free checks. Each call acquires
//! one connection with a bounded wait, runs one query and returns the
//! connection to the pool when it goes out of scope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use facility_gateway::{
    EnvironmentRow, ErrorCode, OccupancyRow, PeopleCountRow, RawArray, StoreConfig, StoreEndpoint,
    StoreError, StoreStage, TelemetryStore,
};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::Postgres;
use std::io;
use std::time::Duration;
use tracing::debug;

/// Bound of the TCP check run after an acquire timeout
const REACHABILITY_TIMEOUT: Duration = Duration::from_millis(1000);

const OCCUPANCY_SQL: &str = r#"
    SELECT DISTINCT ON (camera_id)
        camera_id,
        spot_ids::text AS spot_ids,
        spots_state::text AS spots_state,
        captured_at
    FROM parking_occupancy
    WHERE ($1::text IS NULL OR camera_id = $1)
    ORDER BY camera_id, captured_at DESC
"#;

const PEOPLE_COUNT_SQL: &str = r#"
    SELECT DISTINCT ON (area_id)
        area_id,
        people_count::bigint AS people_count,
        captured_at
    FROM area_people_counts
    WHERE ($1::text IS NULL OR area_id = $1)
    ORDER BY area_id, captured_at DESC
"#;

const ENVIRONMENT_SQL: &str = r#"
    SELECT DISTINCT ON (sensor_id)
        sensor_id,
        temperature::float8 AS temperature,
        humidity::float8 AS humidity,
        co2::float8 AS co2,
        captured_at
    FROM environment_readings
    WHERE ($1::text IS NULL OR sensor_id = $1)
    ORDER BY sensor_id, captured_at DESC
"#;

#[derive(sqlx::FromRow)]
struct OccupancyRecord {
    camera_id: String,
    spot_ids: Option<String>,
    spots_state: Option<String>,
    captured_at: Option<DateTime<Utc>>,
}

impl From<OccupancyRecord> for OccupancyRow {
    fn from(record: OccupancyRecord) -> Self {
        Self {
            camera_id: record.camera_id,
            spot_ids: record.spot_ids.map(RawArray::from),
            spots_state: record.spots_state.map(RawArray::from),
            captured_at: record.captured_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PeopleCountRecord {
    area_id: String,
    people_count: Option<i64>,
    captured_at: Option<DateTime<Utc>>,
}

impl From<PeopleCountRecord> for PeopleCountRow {
    fn from(record: PeopleCountRecord) -> Self {
        Self {
            zone_id: record.area_id,
            people_count: record.people_count,
            captured_at: record.captured_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EnvironmentRecord {
    sensor_id: String,
    temperature: Option<f64>,
    humidity: Option<f64>,
    co2: Option<f64>,
    captured_at: Option<DateTime<Utc>>,
}

impl From<EnvironmentRecord> for EnvironmentRow {
    fn from(record: EnvironmentRecord) -> Self {
        Self {
            sensor_id: record.sensor_id,
            temperature: record.temperature,
            humidity: record.humidity,
            co2: record.co2,
            captured_at: record.captured_at,
        }
    }
}

/// Store backed by a lazily connected PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    endpoint: StoreEndpoint,
}

impl PgStore {
    /// Build the pool without connecting
    pub fn connect_lazy(config: &StoreConfig) -> Self {
        let ssl_mode = if config.tls_verify {
            PgSslMode::VerifyFull
        } else {
            PgSslMode::Require
        };
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);
        Self {
            pool,
            endpoint: StoreEndpoint::new(config.host.clone(), config.port),
        }
    }

    /// Pool handle, for closing at shutdown
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        match self.pool.acquire().await {
            Ok(conn) => Ok(conn),
            Err(sqlx::Error::PoolTimedOut) => {
                // Connect errors are retried inside the pool until the
                // acquire deadline, and concurrent waiters may see a pending
                // connect counted in the pool size. Recover the cause anyway.
                let code = check_reachability(&self.endpoint).await;
                debug!(code = %code, pool_size = self.pool.size(), "acquire timed out");
                Err(self.error(
                    StoreStage::Connect,
                    code,
                    "pool timed out while waiting for an open connection",
                ))
            }
            Err(err) => Err(self.map_error(StoreStage::Connect, &err)),
        }
    }

    fn map_error(&self, stage: StoreStage, err: &sqlx::Error) -> StoreError {
        self.error(stage, error_code(err), err.to_string())
    }

    fn error(&self, stage: StoreStage, code: ErrorCode, message: impl Into<String>) -> StoreError {
        let (host, port) = (self.endpoint.host.as_str(), self.endpoint.port);
        match stage {
            StoreStage::Connect => StoreError::connect(code, host, port, message),
            StoreStage::Query => StoreError::query(code, host, port, message),
        }
    }
}

#[async_trait]
impl TelemetryStore for PgStore {
    fn endpoint(&self) -> StoreEndpoint {
        self.endpoint.clone()
    }

    async fn occupancy(&self, filter: Option<&str>) -> Result<Vec<OccupancyRow>, StoreError> {
        let mut conn = self.acquire().await?;
        let records: Vec<OccupancyRecord> = sqlx::query_as(OCCUPANCY_SQL)
            .bind(filter)
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| self.map_error(StoreStage::Query, &err))?;
        Ok(records.into_iter().map(OccupancyRow::from).collect())
    }

    async fn people_counts(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<PeopleCountRow>, StoreError> {
        let mut conn = self.acquire().await?;
        let records: Vec<PeopleCountRecord> = sqlx::query_as(PEOPLE_COUNT_SQL)
            .bind(filter)
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| self.map_error(StoreStage::Query, &err))?;
        Ok(records.into_iter().map(PeopleCountRow::from).collect())
    }

    async fn environment(&self, filter: Option<&str>) -> Result<Vec<EnvironmentRow>, StoreError> {
        let mut conn = self.acquire().await?;
        let records: Vec<EnvironmentRecord> = sqlx::query_as(ENVIRONMENT_SQL)
            .bind(filter)
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| self.map_error(StoreStage::Query, &err))?;
        Ok(records.into_iter().map(EnvironmentRow::from).collect())
    }
}

/// Map a driver error onto the gateway's error codes
pub fn error_code(err: &sqlx::Error) -> ErrorCode {
    match err {
        sqlx::Error::Io(io_err) => io_error_code(io_err),
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) if code == "28P01" || code == "28000" => ErrorCode::AuthenticationRejected,
            Some(code) => ErrorCode::Sql(code.to_uppercase()),
            None => ErrorCode::Other(db_err.message().to_string()),
        },
        sqlx::Error::Tls(_) => ErrorCode::Tls,
        sqlx::Error::PoolTimedOut => ErrorCode::TimedOut,
        sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => ErrorCode::PoolClosed,
        sqlx::Error::Protocol(_) => ErrorCode::Protocol,
        other => ErrorCode::Other(other.to_string()),
    }
}

/// Map a socket error onto the gateway's error codes
pub fn io_error_code(err: &io::Error) -> ErrorCode {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ErrorCode::ConnectionRefused,
        io::ErrorKind::TimedOut => ErrorCode::TimedOut,
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            ErrorCode::ConnectionReset
        }
        _ => {
            let message = err.to_string();
            if is_lookup_failure(&message) {
                ErrorCode::HostNotFound
            } else if message.contains("unreachable") || message.contains("No route to host") {
                ErrorCode::HostUnreachable
            } else {
                ErrorCode::Other(message)
            }
        }
    }
}

fn is_lookup_failure(message: &str) -> bool {
    message.contains("failed to lookup address")
        || message.contains("Name or service not known")
        || message.contains("nodename nor servname")
        || message.contains("No such host")
}

/// Tell a refused or unresolvable endpoint apart from a slow one
pub async fn check_reachability(endpoint: &StoreEndpoint) -> ErrorCode {
    let target = (endpoint.host.as_str(), endpoint.port);
    match tokio::time::timeout(REACHABILITY_TIMEOUT, tokio::net::TcpStream::connect(target)).await {
        Ok(Err(err)) => io_error_code(&err),
        Ok(Ok(_)) | Err(_) => ErrorCode::TimedOut,
    }
}
