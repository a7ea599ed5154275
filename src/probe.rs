// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! DNS diagnostics for hard-fail responses
//!
//! Resolution failure is itself diagnostic information: [`DiagnosticProber::probe`]
//! never fails, it reports `ok: false` with the error instead.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result of resolving the store hostname
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsDiagnostic {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DnsDiagnostic {
    pub fn resolved(addresses: Vec<String>) -> Self {
        Self {
            ok: true,
            addresses: Some(addresses),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            addresses: None,
            error: Some(error.into()),
        }
    }
}

/// Hostname resolution over both address families
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system resolver (IPv4 and IPv6)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Resolver answering from a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    answers: HashMap<String, Result<Vec<IpAddr>, String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `host` with the given addresses
    pub fn with_addresses(mut self, host: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        self.answers.insert(host.into(), Ok(addresses));
        self
    }

    /// Answer `host` with an error
    pub fn with_error(mut self, host: impl Into<String>, error: impl Into<String>) -> Self {
        self.answers.insert(host.into(), Err(error.into()));
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        match self.answers.get(host) {
            Some(Ok(addresses)) => Ok(addresses.clone()),
            Some(Err(error)) => Err(io::Error::new(io::ErrorKind::Other, error.clone())),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no answer for {host}"),
            )),
        }
    }
}

/// Best-effort DNS prober
#[derive(Clone)]
pub struct DiagnosticProber {
    resolver: Arc<dyn Resolver>,
    timeout: Duration,
}

impl std::fmt::Debug for DiagnosticProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticProber")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for DiagnosticProber {
    fn default() -> Self {
        Self::new(Arc::new(SystemResolver), Duration::from_millis(2000))
    }
}

impl DiagnosticProber {
    pub fn new(resolver: Arc<dyn Resolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// Same resolver, different bound
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `host` and describe the outcome.
    ///
    /// Addresses are deduplicated, IPv4 before IPv6.
    pub async fn probe(&self, host: &str) -> DnsDiagnostic {
        let result = tokio::time::timeout(self.timeout, self.resolver.resolve(host)).await;
        let diagnostic = match result {
            Err(_) => DnsDiagnostic::failed(format!(
                "resolution timed out after {}ms",
                self.timeout.as_millis()
            )),
            Ok(Err(err)) => DnsDiagnostic::failed(err.to_string()),
            Ok(Ok(mut addresses)) => {
                addresses.sort_by_key(|ip| (ip.is_ipv6(), *ip));
                addresses.dedup();
                if addresses.is_empty() {
                    DnsDiagnostic::failed("no addresses")
                } else {
                    DnsDiagnostic::resolved(addresses.iter().map(IpAddr::to_string).collect())
                }
            }
        };
        debug!(host, ok = diagnostic.ok, "dns probe finished");
        diagnostic
    }
}
