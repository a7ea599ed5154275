// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Response assembly
//!
//! Assembly is a pure function of the readings and the [`FallbackDecision`]:
//! the data path never carries a hidden "mock" flag, the decision travels
//! next to it and is rendered here as `mock` + `reason`.
//!
//! # Wire format
//!
//! ```text
//! { "<collection>": [...], "timestamp": "2025-01-10T22:00:00Z",
//!   "mock": true, "reason": "fallback-mock-out-of-hours-23" }
//! ```

use crate::error::{ConfigError, ErrorCode, StoreError, StoreStage};
use crate::probe::DnsDiagnostic;
use crate::source::Category;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::error;

/// Headers attached to every telemetry response: never cache, always revalidate.
pub const NO_CACHE_HEADERS: [(&str, &str); 4] = [
    (
        "cache-control",
        "no-store, no-cache, must-revalidate, proxy-revalidate, max-age=0",
    ),
    ("pragma", "no-cache"),
    ("expires", "0"),
    ("surrogate-control", "no-store"),
];

/// Why a response was synthesized instead of sourced live
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FallbackDecision {
    /// Live data
    #[default]
    None,
    /// Synthesis forced by configuration
    ForcedMock,
    /// Request arrived outside the availability window
    OutOfWindow { hour: u32 },
    /// Store failed with a soft-fallback code
    ConnectionError { code: ErrorCode },
}

impl FallbackDecision {
    pub fn is_mock(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Machine-readable reason, `None` for live data
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::ForcedMock => Some("fallback-mock-forced".to_string()),
            Self::OutOfWindow { hour } => Some(format!("fallback-mock-out-of-hours-{hour}")),
            Self::ConnectionError { code } => Some(format!("fallback-mock-{code}")),
        }
    }

    /// Human-readable explanation for logs and operators
    pub fn describe(&self) -> String {
        match self {
            Self::None => "live data".to_string(),
            Self::ForcedMock => "synthetic data forced by configuration".to_string(),
            Self::OutOfWindow { hour } => {
                format!("store outside its availability window (local hour {hour})")
            }
            Self::ConnectionError { code } => {
                format!("store unreachable ({code}), serving synthetic data")
            }
        }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ForcedMock => "forced",
            Self::OutOfWindow { .. } => "out_of_window",
            Self::ConnectionError { .. } => "connection_error",
        }
    }
}

/// Wire envelope of one telemetry category
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<R> {
    pub category: Category,
    pub readings: Vec<R>,
    pub timestamp: DateTime<Utc>,
    pub decision: FallbackDecision,
}

impl<R: Serialize> Serialize for ResponseEnvelope<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let reason = self.decision.reason();
        let mut map = serializer.serialize_map(Some(if reason.is_some() { 4 } else { 3 }))?;
        map.serialize_entry(self.category.collection(), &self.readings)?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("mock", &self.decision.is_mock())?;
        if let Some(reason) = reason {
            map.serialize_entry("reason", &reason)?;
        }
        map.end()
    }
}

/// Error body shared by 404, 500 and 502 responses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsDiagnostic>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            code: None,
            hostname: None,
            port: None,
            dns: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Status selected by the assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// Live data or soft fallback
    Ok,
    /// Genuinely empty real result
    NotFound,
    /// Unexpected failure or missing configuration
    InternalError,
    /// Hard store failure
    BadGateway,
}

impl ResponseStatus {
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::NotFound => 404,
            Self::InternalError => 500,
            Self::BadGateway => 502,
        }
    }
}

/// Final response of a gateway operation
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: ResponseStatus,
    pub body: Value,
    /// Decision behind the body, `None` for live data and errors
    pub decision: FallbackDecision,
}

impl GatewayResponse {
    /// Caching directives to send with the body
    pub fn headers(&self) -> &'static [(&'static str, &'static str)] {
        &NO_CACHE_HEADERS
    }

    pub fn is_mock(&self) -> bool {
        self.decision.is_mock()
    }

    fn error(status: ResponseStatus, body: ErrorBody) -> Self {
        let body = serde_json::to_value(&body)
            .unwrap_or_else(|_| serde_json::json!({ "error": body.error }));
        Self {
            status,
            body,
            decision: FallbackDecision::None,
        }
    }
}

/// Assemble a successful (live or synthetic) response.
pub fn assemble<R: Serialize>(
    category: Category,
    readings: Vec<R>,
    decision: FallbackDecision,
    timestamp: DateTime<Utc>,
) -> GatewayResponse {
    let envelope = ResponseEnvelope {
        category,
        readings,
        timestamp,
        decision,
    };
    match serde_json::to_value(&envelope) {
        Ok(body) => GatewayResponse {
            status: ResponseStatus::Ok,
            body,
            decision: envelope.decision,
        },
        Err(err) => {
            error!(category = category.as_str(), "failed to serialize envelope: {}", err);
            internal_error(format!("failed to serialize {} envelope", category.as_str()))
        }
    }
}

/// 404 for a request that matched no readings
pub fn not_found(category: Category, id: &str) -> GatewayResponse {
    GatewayResponse::error(
        ResponseStatus::NotFound,
        ErrorBody::new("not found")
            .with_message(format!("no {} readings for source {id}", category.as_str())),
    )
}

/// 502 carrying the store error and, for connection failures, the DNS result
pub fn hard_fail(error: &StoreError, dns: Option<DnsDiagnostic>) -> GatewayResponse {
    let label = match error.stage() {
        StoreStage::Connect => "store connection failed",
        StoreStage::Query => "store query failed",
    };
    let body = ErrorBody {
        error: label.to_string(),
        message: Some(error.message().to_string()),
        code: Some(error.code().clone()),
        hostname: Some(error.host().to_string()),
        port: Some(error.port()),
        dns,
    };
    GatewayResponse::error(ResponseStatus::BadGateway, body)
}

/// 500 for a gateway started without its required settings
pub fn config_missing(error: &ConfigError) -> GatewayResponse {
    GatewayResponse::error(
        ResponseStatus::InternalError,
        ErrorBody::new("configuration missing").with_message(error.to_string()),
    )
}

/// 500 for anything unexpected
pub fn internal_error(message: impl Into<String>) -> GatewayResponse {
    GatewayResponse::error(
        ResponseStatus::InternalError,
        ErrorBody::new("internal error").with_message(message),
    )
}
