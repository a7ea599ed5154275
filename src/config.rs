// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for the telemetry gateway
//!
//! Settings come from the environment. Missing store credentials are not a
//! startup failure: the gateway starts without a pool and answers every
//! telemetry request with a 500 naming the missing variables.

use crate::error::{ConfigError, ErrorCode};
use crate::window::ServiceWindow;
use std::fmt;
use std::time::Duration;

pub const ENV_DB_HOST: &str = "FACILITY_DB_HOST";
pub const ENV_DB_PORT: &str = "FACILITY_DB_PORT";
pub const ENV_DB_NAME: &str = "FACILITY_DB_NAME";
pub const ENV_DB_USER: &str = "FACILITY_DB_USER";
pub const ENV_DB_PASSWORD: &str = "FACILITY_DB_PASSWORD";
pub const ENV_DB_TLS_VERIFY: &str = "FACILITY_DB_TLS_VERIFY";
pub const ENV_DB_ACQUIRE_TIMEOUT_MS: &str = "FACILITY_DB_ACQUIRE_TIMEOUT_MS";
pub const ENV_DB_MAX_CONNECTIONS: &str = "FACILITY_DB_MAX_CONNECTIONS";
pub const ENV_FORCE_MOCK: &str = "FACILITY_FORCE_MOCK";
pub const ENV_WINDOW_OPEN_HOUR: &str = "FACILITY_WINDOW_OPEN_HOUR";
pub const ENV_WINDOW_CLOSE_HOUR: &str = "FACILITY_WINDOW_CLOSE_HOUR";
pub const ENV_SOFT_FALLBACK_CODES: &str = "FACILITY_SOFT_FALLBACK_CODES";
pub const ENV_DNS_TIMEOUT_MS: &str = "FACILITY_DNS_TIMEOUT_MS";

/// Connection settings of the authoritative store
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Verify the server certificate when TLS is negotiated
    pub tls_verify: bool,
    /// Bounded wait for a pooled connection
    pub acquire_timeout: Duration,
    pub max_connections: u32,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("tls_verify", &self.tls_verify)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl StoreConfig {
    /// Settings with default port, TLS verification and pool sizing
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: 5432,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            tls_verify: true,
            acquire_timeout: Duration::from_millis(5000),
            max_connections: 5,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Store settings, or why there are none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    Configured(StoreConfig),
    /// Required credentials absent; no pool is ever built
    Missing(ConfigError),
}

/// Gateway-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub store: StoreSettings,
    /// Always answer with synthetic data
    pub force_mock: bool,
    pub window: ServiceWindow,
    /// Codes masked in addition to the default soft table
    pub extra_soft_codes: Vec<ErrorCode>,
    /// Bound of the DNS diagnostic on hard failures
    pub dns_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::Missing(ConfigError::Missing(vec![
                ENV_DB_HOST,
                ENV_DB_NAME,
                ENV_DB_USER,
                ENV_DB_PASSWORD,
            ])),
            force_mock: false,
            window: ServiceWindow::default(),
            extra_soft_codes: Vec::new(),
            dns_timeout: Duration::from_millis(2000),
        }
    }
}

impl GatewayConfig {
    /// Configuration for a reachable store
    pub fn with_store(store: StoreConfig) -> Self {
        Self {
            store: StoreSettings::Configured(store),
            ..Default::default()
        }
    }

    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// Blank values count as absent. Only unparseable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let mut missing = Vec::new();
        let mut required = |key: &'static str| {
            let value = get(key);
            if value.is_none() {
                missing.push(key);
            }
            value.unwrap_or_default()
        };
        let host = required(ENV_DB_HOST);
        let database = required(ENV_DB_NAME);
        let user = required(ENV_DB_USER);
        let password = required(ENV_DB_PASSWORD);

        let port = parse_or(ENV_DB_PORT, get(ENV_DB_PORT), 5432u16)?;
        let tls_verify = parse_bool_or(ENV_DB_TLS_VERIFY, get(ENV_DB_TLS_VERIFY), true)?;
        let acquire_ms = parse_or(
            ENV_DB_ACQUIRE_TIMEOUT_MS,
            get(ENV_DB_ACQUIRE_TIMEOUT_MS),
            5000u64,
        )?;
        let max_connections =
            parse_or(ENV_DB_MAX_CONNECTIONS, get(ENV_DB_MAX_CONNECTIONS), 5u32)?;

        let store = if missing.is_empty() {
            StoreSettings::Configured(StoreConfig {
                host,
                port,
                database,
                user,
                password,
                tls_verify,
                acquire_timeout: Duration::from_millis(acquire_ms),
                max_connections: max_connections.max(1),
            })
        } else {
            StoreSettings::Missing(ConfigError::Missing(missing))
        };

        let force_mock = parse_bool_or(ENV_FORCE_MOCK, get(ENV_FORCE_MOCK), false)?;

        let open_hour = parse_or(
            ENV_WINDOW_OPEN_HOUR,
            get(ENV_WINDOW_OPEN_HOUR),
            defaults.window.open_hour,
        )?;
        let close_hour = parse_or(
            ENV_WINDOW_CLOSE_HOUR,
            get(ENV_WINDOW_CLOSE_HOUR),
            defaults.window.close_hour,
        )?;
        if open_hour > 23 {
            return Err(invalid(ENV_WINDOW_OPEN_HOUR, open_hour));
        }
        if close_hour > 24 {
            return Err(invalid(ENV_WINDOW_CLOSE_HOUR, close_hour));
        }

        let extra_soft_codes = get(ENV_SOFT_FALLBACK_CODES)
            .map(|codes| {
                codes
                    .split(',')
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .filter_map(|code| code.parse::<ErrorCode>().ok())
                    .collect()
            })
            .unwrap_or_default();

        let dns_ms = parse_or(ENV_DNS_TIMEOUT_MS, get(ENV_DNS_TIMEOUT_MS), 2000u64)?;

        Ok(Self {
            store,
            force_mock,
            window: ServiceWindow::new(open_hour, close_hour),
            extra_soft_codes,
            dns_timeout: Duration::from_millis(dns_ms),
        })
    }

    /// Store settings, or the error every request must report
    pub fn store_config(&self) -> Result<&StoreConfig, &ConfigError> {
        match &self.store {
            StoreSettings::Configured(store) => Ok(store),
            StoreSettings::Missing(err) => Err(err),
        }
    }
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| invalid(key, raw)),
    }
}

/// Accepts 1/0, true/false, yes/no, on/off
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_or(
    key: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => parse_bool(&raw).ok_or_else(|| invalid(key, raw)),
    }
}
