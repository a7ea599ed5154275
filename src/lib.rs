// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Facility Gateway
//!
//! Read-only telemetry gateway for a facility: parking occupancy, people
//! counts and environmental readings, served from a relational store with
//! an explicit degradation policy.
//!
//! ## Key Features
//!
//! - **Completeness**: every response lists each known source exactly once
//! - **Explicit fallback**: synthetic data always carries `mock` and `reason`
//! - **Availability window**: no store I/O outside service hours
//! - **Classified failures**: soft codes degrade, hard codes surface with DNS diagnostics
//!
//! ## Quick Start
//!
//! ```rust
//! use facility_gateway::{MemoryStore, PeopleCountRow, TelemetryGateway};
//! use std::sync::Arc;
//!
//! let store = MemoryStore::default().with_people_counts(vec![PeopleCountRow {
//!     zone_id: "lobby".into(),
//!     people_count: Some(12),
//!     captured_at: None,
//! }]);
//! let gateway = TelemetryGateway::new(Arc::new(store));
//!
//! let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! let response = rt.block_on(gateway.people_counts(None));
//!
//! // 200 with live data, or a labelled synthetic answer outside service hours
//! assert_eq!(response.status.as_u16(), 200);
//! assert_eq!(response.body["zones"].as_array().unwrap().len(), 3);
//! ```
//!
//! ## Modules
//!
//! - [`source`]: Source registry and canonical source sets
//! - [`reading`]: Raw store rows and normalized readings
//! - [`normalize`]: Row normalization
//! - [`completeness`]: One reading per required source
//! - [`synthetic`]: Synthetic data generation
//! - [`window`]: Availability window and clocks
//! - [`classifier`]: Soft/hard failure classification
//! - [`probe`]: DNS diagnostics
//! - [`envelope`]: Response assembly
//! - [`store`]: Store access seam
//! - [`config`]: Environment configuration
//! - [`gateway`]: Request control flow

// Modules
pub mod classifier;
pub mod completeness;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod probe;
pub mod reading;
pub mod source;
pub mod store;
pub mod synthetic;
pub mod window;

// Re-exports for convenient access
pub use classifier::{Classification, ErrorClassifier};
pub use completeness::ensure_complete;
pub use config::{GatewayConfig, StoreConfig, StoreSettings};
pub use envelope::{
    FallbackDecision, GatewayResponse, ResponseEnvelope, ResponseStatus, NO_CACHE_HEADERS,
};
pub use error::{ConfigError, ErrorCode, StoreError, StoreStage};
pub use gateway::TelemetryGateway;
pub use probe::{DiagnosticProber, DnsDiagnostic, Resolver, StaticResolver, SystemResolver};
pub use reading::{
    EnvironmentReading, EnvironmentRow, OccupancyReading, OccupancyRow, PeopleCountReading,
    PeopleCountRow, RawArray, Reading, Spot,
};
pub use source::{Category, Layout, Source, SourceKind, SourceRegistry};
pub use store::{MemoryStore, StoreEndpoint, TelemetryStore};
pub use synthetic::SyntheticGenerator;
pub use window::{Clock, FixedClock, ServiceWindow, SystemClock};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
