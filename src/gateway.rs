// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! High-level gateway service
//!
//! [`TelemetryGateway`] owns the store handle and runs the degradation
//! policy for every request:
//!
//! 1. no store configuration: 500, nothing else is attempted
//! 2. forced mock or outside the availability window: synthetic data, no I/O
//! 3. unknown source id: 404, no I/O
//! 4. one store call; soft failures become synthetic data, hard failures
//!    become a 502 with DNS diagnostics
//! 5. rows are normalized, completed to the required set and assembled
//!
//! # Example
//!
//! ```rust
//! use facility_gateway::{MemoryStore, TelemetryGateway};
//! use std::sync::Arc;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! rt.block_on(async {
//!     let gateway = TelemetryGateway::new(Arc::new(MemoryStore::default())).with_force_mock(true);
//!     let response = gateway.occupancy(None).await;
//!     assert_eq!(response.status.as_u16(), 200);
//!     assert_eq!(response.body["reason"], "fallback-mock-forced");
//! });
//! ```

use crate::classifier::{Classification, ErrorClassifier};
use crate::completeness::{
    ensure_complete, placeholder_environment, placeholder_occupancy, placeholder_people_count,
};
use crate::config::GatewayConfig;
use crate::envelope::{self, FallbackDecision, GatewayResponse};
use crate::error::{ConfigError, StoreError, StoreStage};
use crate::normalize::{normalize_environment, normalize_occupancy, normalize_people_count};
use crate::probe::DiagnosticProber;
use crate::reading::Reading;
use crate::source::{Category, Source, SourceKind, SourceRegistry};
use crate::store::TelemetryStore;
use crate::synthetic::SyntheticGenerator;
use crate::window::{Clock, ServiceWindow, SystemClock};
use chrono::{DateTime, FixedOffset, Utc};
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Store handle, or the reason there is none
enum StoreHandle {
    Ready(Arc<dyn TelemetryStore>),
    Unconfigured(ConfigError),
}

/// Where a request goes after the I/O-free checks
enum Route<'a> {
    Respond(GatewayResponse),
    Synthesize(FallbackDecision),
    Query(&'a Arc<dyn TelemetryStore>),
}

/// Telemetry gateway service
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct TelemetryGateway {
    store: StoreHandle,
    registry: SourceRegistry,
    window: ServiceWindow,
    force_mock: bool,
    classifier: ErrorClassifier,
    prober: DiagnosticProber,
    clock: Arc<dyn Clock>,
    noise_seed: Option<u64>,
}

impl std::fmt::Debug for TelemetryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGateway")
            .field("configured", &self.is_configured())
            .field("window", &self.window)
            .field("force_mock", &self.force_mock)
            .field("classifier", &self.classifier)
            .field("prober", &self.prober)
            .finish_non_exhaustive()
    }
}

impl TelemetryGateway {
    /// Create a gateway over a store with default policy
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self::with_handle(StoreHandle::Ready(store))
    }

    /// Create a gateway that answers every request with a 500
    pub fn unconfigured(error: ConfigError) -> Self {
        Self::with_handle(StoreHandle::Unconfigured(error))
    }

    fn with_handle(store: StoreHandle) -> Self {
        Self {
            store,
            registry: SourceRegistry::default(),
            window: ServiceWindow::default(),
            force_mock: false,
            classifier: ErrorClassifier::default(),
            prober: DiagnosticProber::default(),
            clock: Arc::new(SystemClock),
            noise_seed: None,
        }
    }

    /// Apply the policy settings of a loaded configuration
    ///
    /// The prober keeps its resolver; only its timeout changes.
    pub fn configure(self, config: &GatewayConfig) -> Self {
        Self {
            window: config.window,
            force_mock: config.force_mock,
            classifier: ErrorClassifier::extended(config.extra_soft_codes.clone()),
            prober: self.prober.clone().with_timeout(config.dns_timeout),
            ..self
        }
    }

    pub fn with_registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_window(mut self, window: ServiceWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_force_mock(mut self, force_mock: bool) -> Self {
        self.force_mock = force_mock;
        self
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_prober(mut self, prober: DiagnosticProber) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Seed the synthetic noise source; every request reuses the seed
    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = Some(seed);
        self
    }

    /// Whether a store handle exists
    pub fn is_configured(&self) -> bool {
        matches!(self.store, StoreHandle::Ready(_))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Parking occupancy for all cameras, or one when `camera` is given
    pub async fn occupancy(&self, camera: Option<&str>) -> GatewayResponse {
        let category = Category::Occupancy;
        let now = self.clock.now();
        let store = match self.route(category, camera, &now) {
            Route::Respond(response) => return response,
            Route::Synthesize(decision) => return self.synthesize(category, camera, decision, &now),
            Route::Query(store) => store,
        };

        let ts = now.with_timezone(&Utc);
        match store.occupancy(camera).await {
            Ok(rows) => {
                let readings = rows
                    .iter()
                    .filter_map(|row| {
                        let layout = self.registry.get(category, row.camera_id.trim())?.layout()?;
                        Some(normalize_occupancy(row, layout, ts))
                    })
                    .collect();
                self.complete(category, camera, readings, ts, |s| {
                    placeholder_occupancy(s, ts)
                })
            }
            Err(err) => self.store_failed(category, camera, err, &now).await,
        }
    }

    /// People counts for all zones, or one when `zone` is given
    pub async fn people_counts(&self, zone: Option<&str>) -> GatewayResponse {
        let category = Category::PeopleCount;
        let now = self.clock.now();
        let store = match self.route(category, zone, &now) {
            Route::Respond(response) => return response,
            Route::Synthesize(decision) => return self.synthesize(category, zone, decision, &now),
            Route::Query(store) => store,
        };

        let ts = now.with_timezone(&Utc);
        match store.people_counts(zone).await {
            Ok(rows) => {
                let readings = rows
                    .iter()
                    .filter_map(|row| {
                        let source = self.registry.get(category, row.zone_id.trim())?;
                        let SourceKind::Counter { capacity } = source.kind else {
                            return None;
                        };
                        Some(normalize_people_count(row, capacity, ts))
                    })
                    .collect();
                self.complete(category, zone, readings, ts, |s| {
                    placeholder_people_count(s, ts)
                })
            }
            Err(err) => self.store_failed(category, zone, err, &now).await,
        }
    }

    /// Environmental readings for all nodes, or one when `sensor` is given
    pub async fn environment(&self, sensor: Option<&str>) -> GatewayResponse {
        let category = Category::Environment;
        let now = self.clock.now();
        let store = match self.route(category, sensor, &now) {
            Route::Respond(response) => return response,
            Route::Synthesize(decision) => {
                return self.synthesize(category, sensor, decision, &now)
            }
            Route::Query(store) => store,
        };

        let ts = now.with_timezone(&Utc);
        match store.environment(sensor).await {
            Ok(rows) => {
                let readings = rows
                    .iter()
                    .filter(|row| self.registry.get(category, row.sensor_id.trim()).is_some())
                    .map(|row| normalize_environment(row, ts))
                    .collect();
                self.complete(category, sensor, readings, ts, |s| {
                    placeholder_environment(s, ts)
                })
            }
            Err(err) => self.store_failed(category, sensor, err, &now).await,
        }
    }

    /// Checks that need no I/O, cheapest first
    fn route(&self, category: Category, filter: Option<&str>, now: &DateTime<FixedOffset>) -> Route<'_> {
        let store = match &self.store {
            StoreHandle::Ready(store) => store,
            StoreHandle::Unconfigured(err) => {
                error!(category = category.as_str(), "refusing request: {}", err);
                return Route::Respond(envelope::config_missing(err));
            }
        };

        let decision = if self.force_mock {
            FallbackDecision::ForcedMock
        } else if let Some(hour) = self.window.closed_at(now) {
            FallbackDecision::OutOfWindow { hour }
        } else {
            FallbackDecision::None
        };
        if decision.is_mock() {
            // Unknown ids synthesize to an empty collection.
            debug!(category = category.as_str(), "{}", decision.describe());
            return Route::Synthesize(decision);
        }

        if let Some(id) = filter {
            if self.registry.get(category, id).is_none() {
                debug!(category = category.as_str(), id, "unknown source requested");
                return Route::Respond(envelope::not_found(category, id));
            }
        }
        Route::Query(store)
    }

    /// Classify a store failure into a synthetic answer or a 502
    async fn store_failed(
        &self,
        category: Category,
        filter: Option<&str>,
        err: StoreError,
        now: &DateTime<FixedOffset>,
    ) -> GatewayResponse {
        match self.classifier.classify(&err) {
            Classification::SoftFallback(code) => {
                let decision = FallbackDecision::ConnectionError { code };
                warn!(category = category.as_str(), "{}: {}", decision.describe(), err);
                self.synthesize(category, filter, decision, now)
            }
            Classification::HardFail(code) => {
                error!(
                    category = category.as_str(),
                    code = %code,
                    host = err.host(),
                    port = err.port(),
                    "store failure: {}",
                    err
                );
                let dns = match err.stage() {
                    StoreStage::Connect => Some(self.prober.probe(err.host()).await),
                    StoreStage::Query => None,
                };
                envelope::hard_fail(&err, dns)
            }
        }
    }

    /// Completeness step and assembly of a live answer
    fn complete<R, F>(
        &self,
        category: Category,
        filter: Option<&str>,
        readings: Vec<R>,
        ts: DateTime<Utc>,
        placeholder: F,
    ) -> GatewayResponse
    where
        R: Reading,
        F: Fn(&Source) -> R,
    {
        if let Some(id) = filter {
            if readings.is_empty() {
                return envelope::not_found(category, id);
            }
        }
        let required = self.registry.select(category, filter);
        let readings = ensure_complete(readings, &required, placeholder);
        envelope::assemble(category, readings, FallbackDecision::None, ts)
    }

    fn generator(&self) -> SyntheticGenerator<StdRng> {
        match self.noise_seed {
            Some(seed) => SyntheticGenerator::seeded(seed),
            None => SyntheticGenerator::from_entropy(),
        }
    }

    /// Whole-response synthetic answer
    fn synthesize(
        &self,
        category: Category,
        filter: Option<&str>,
        decision: FallbackDecision,
        now: &DateTime<FixedOffset>,
    ) -> GatewayResponse {
        let sources = self.registry.select(category, filter);
        let ts = now.with_timezone(&Utc);
        let mut generator = self.generator();
        match category {
            Category::Occupancy => {
                let readings: Vec<_> = sources
                    .iter()
                    .filter_map(|s| generator.occupancy(s, now))
                    .collect();
                envelope::assemble(category, readings, decision, ts)
            }
            Category::PeopleCount => {
                let readings: Vec<_> = sources
                    .iter()
                    .filter_map(|s| generator.people_count(s, now))
                    .collect();
                envelope::assemble(category, readings, decision, ts)
            }
            Category::Environment => {
                let readings: Vec<_> = sources
                    .iter()
                    .filter_map(|s| generator.environment(s, now))
                    .collect();
                envelope::assemble(category, readings, decision, ts)
            }
        }
    }
}
