// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the telemetry gateway
//!
//! Store failures are reported as a tagged [`StoreError`] carrying an
//! [`ErrorCode`]. The classifier and the response assembler only ever look
//! at that tag, never at driver-specific error text.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable classification code of a store failure
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Hostname could not be resolved
    HostNotFound,
    /// Host answered but nothing listens on the port
    ConnectionRefused,
    /// Credentials rejected by the store
    AuthenticationRejected,
    /// Connect or acquire timed out
    TimedOut,
    /// Peer reset the connection
    ConnectionReset,
    /// No route to host
    HostUnreachable,
    /// TLS negotiation failed
    Tls,
    /// Pool was closed while waiting
    PoolClosed,
    /// Wire protocol violation
    Protocol,
    /// Server-side error with a SQLSTATE
    Sql(String),
    /// Anything without a dedicated code
    Other(String),
}

impl ErrorCode {
    /// Wire form of the code, as used in reasons and error bodies.
    pub fn as_code(&self) -> String {
        match self {
            Self::HostNotFound => "dns-enotfound".to_string(),
            Self::ConnectionRefused => "econnrefused".to_string(),
            Self::AuthenticationRejected => "auth-rejected".to_string(),
            Self::TimedOut => "etimedout".to_string(),
            Self::ConnectionReset => "econnreset".to_string(),
            Self::HostUnreachable => "ehostunreach".to_string(),
            Self::Tls => "tls-handshake".to_string(),
            Self::PoolClosed => "pool-closed".to_string(),
            Self::Protocol => "protocol".to_string(),
            Self::Sql(state) => format!("sql-{}", state.to_lowercase()),
            Self::Other(code) => code.clone(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_code())
    }
}

impl FromStr for ErrorCode {
    type Err = std::convert::Infallible;

    /// Parses the wire form back. Unknown codes become [`ErrorCode::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_lowercase();
        Ok(match code.as_str() {
            "dns-enotfound" | "enotfound" => Self::HostNotFound,
            "econnrefused" => Self::ConnectionRefused,
            "auth-rejected" | "28p01" => Self::AuthenticationRejected,
            "etimedout" => Self::TimedOut,
            "econnreset" => Self::ConnectionReset,
            "ehostunreach" => Self::HostUnreachable,
            "tls-handshake" => Self::Tls,
            "pool-closed" => Self::PoolClosed,
            "protocol" => Self::Protocol,
            _ => match code.strip_prefix("sql-") {
                Some(state) if !state.is_empty() => Self::Sql(state.to_uppercase()),
                _ => Self::Other(code),
            },
        })
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_code())
    }
}

/// Stage of the store access that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStage {
    /// Acquiring a pooled connection
    Connect,
    /// Running the query on an acquired connection
    Query,
}

/// Tagged failure returned by a [`TelemetryStore`](crate::store::TelemetryStore)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Connection acquisition failed
    #[error("connection to {host}:{port} failed [{code}]: {message}")]
    Connect {
        code: ErrorCode,
        host: String,
        port: u16,
        message: String,
    },

    /// Query failed after a connection was acquired
    #[error("query on {host}:{port} failed [{code}]: {message}")]
    Query {
        code: ErrorCode,
        host: String,
        port: u16,
        message: String,
    },
}

impl StoreError {
    /// Build a connection-stage error
    pub fn connect(
        code: ErrorCode,
        host: impl Into<String>,
        port: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::Connect {
            code,
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    /// Build a query-stage error
    pub fn query(
        code: ErrorCode,
        host: impl Into<String>,
        port: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::Query {
            code,
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &ErrorCode {
        match self {
            Self::Connect { code, .. } | Self::Query { code, .. } => code,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Self::Connect { host, .. } | Self::Query { host, .. } => host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Self::Connect { port, .. } | Self::Query { port, .. } => *port,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Connect { message, .. } | Self::Query { message, .. } => message,
        }
    }

    pub fn stage(&self) -> StoreStage {
        match self {
            Self::Connect { .. } => StoreStage::Connect,
            Self::Query { .. } => StoreStage::Query,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required settings are absent
    #[error("configuration missing: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    /// A setting is present but cannot be parsed
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_form() {
        assert_eq!(ErrorCode::HostNotFound.as_code(), "dns-enotfound");
        assert_eq!(ErrorCode::ConnectionRefused.as_code(), "econnrefused");
        assert_eq!(ErrorCode::Sql("57P01".into()).as_code(), "sql-57p01");
        assert_eq!(ErrorCode::Other("weird".into()).to_string(), "weird");
    }

    #[test]
    fn test_error_code_parse() {
        let parsed: ErrorCode = "DNS-ENOTFOUND".parse().unwrap();
        assert_eq!(parsed, ErrorCode::HostNotFound);
        let parsed: ErrorCode = "sql-57p01".parse().unwrap();
        assert_eq!(parsed, ErrorCode::Sql("57P01".into()));
        let parsed: ErrorCode = "ehostdown".parse().unwrap();
        assert_eq!(parsed, ErrorCode::Other("ehostdown".into()));
    }

    #[test]
    fn test_error_code_serializes_as_string() {
        let json = serde_json::to_string(&ErrorCode::TimedOut).unwrap();
        assert_eq!(json, "\"etimedout\"");
    }

    #[test]
    fn test_store_error_accessors() {
        let err = StoreError::connect(ErrorCode::ConnectionReset, "db.local", 5432, "reset");
        assert_eq!(err.code(), &ErrorCode::ConnectionReset);
        assert_eq!(err.host(), "db.local");
        assert_eq!(err.port(), 5432);
        assert_eq!(err.stage(), StoreStage::Connect);
        let msg = format!("{}", err);
        assert!(msg.contains("db.local:5432"));
        assert!(msg.contains("econnreset"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Missing(vec!["FACILITY_DB_HOST", "FACILITY_DB_USER"]);
        assert_eq!(
            err.to_string(),
            "configuration missing: FACILITY_DB_HOST, FACILITY_DB_USER"
        );
    }
}
