// Facility Gateway Server - Startup errors
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

use facility_gateway::ConfigError;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that stop the server before or while serving
#[derive(Error, Debug)]
pub enum ServerError {
    /// An environment setting is present but unusable
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Result type for server startup
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::from(ConfigError::Invalid {
            key: "FACILITY_DB_PORT",
            value: "abc".to_string(),
        });
        assert!(err.to_string().starts_with("invalid configuration"));

        let err = ServerError::Bind {
            addr: "127.0.0.1:8080".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().contains("127.0.0.1:8080"));
    }
}
