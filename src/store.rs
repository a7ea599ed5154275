// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Store access
//!
//! [`TelemetryStore`] is the seam between the gateway and the authoritative
//! store. Implementations acquire one pooled connection per call, run one
//! query, release the connection on every exit path, and report failures
//! as a tagged [`StoreError`].

use crate::error::StoreError;
use crate::reading::{EnvironmentRow, OccupancyRow, PeopleCountRow};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Network target of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEndpoint {
    pub host: String,
    pub port: u16,
}

impl StoreEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Read access to the telemetry tables
///
/// `filter` narrows the query to one source id.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Where the store lives, for diagnostics
    fn endpoint(&self) -> StoreEndpoint;

    /// Latest occupancy rows
    async fn occupancy(&self, filter: Option<&str>) -> Result<Vec<OccupancyRow>, StoreError>;

    /// Latest people-count rows
    async fn people_counts(&self, filter: Option<&str>)
        -> Result<Vec<PeopleCountRow>, StoreError>;

    /// Latest environmental rows
    async fn environment(&self, filter: Option<&str>) -> Result<Vec<EnvironmentRow>, StoreError>;
}

/// In-memory store with canned rows and an optional injected failure
///
/// Counts calls so callers can check that a path performed no I/O.
#[derive(Debug)]
pub struct MemoryStore {
    endpoint: StoreEndpoint,
    occupancy: Vec<OccupancyRow>,
    people_counts: Vec<PeopleCountRow>,
    environment: Vec<EnvironmentRow>,
    failure: Mutex<Option<StoreError>>,
    calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreEndpoint::new("localhost", 5432))
    }
}

impl MemoryStore {
    pub fn new(endpoint: StoreEndpoint) -> Self {
        Self {
            endpoint,
            occupancy: Vec::new(),
            people_counts: Vec::new(),
            environment: Vec::new(),
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_occupancy(mut self, rows: Vec<OccupancyRow>) -> Self {
        self.occupancy = rows;
        self
    }

    pub fn with_people_counts(mut self, rows: Vec<PeopleCountRow>) -> Self {
        self.people_counts = rows;
        self
    }

    pub fn with_environment(mut self, rows: Vec<EnvironmentRow>) -> Self {
        self.environment = rows;
        self
    }

    /// Fail every call with `error`
    pub fn failing(self, error: StoreError) -> Self {
        self.set_failure(Some(error));
        self
    }

    /// Replace the injected failure, `None` to recover
    pub fn set_failure(&self, error: Option<StoreError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = error;
        }
    }

    /// Number of store calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock() {
            Ok(failure) => failure.clone().map_or(Ok(()), Err),
            Err(_) => Ok(()),
        }
    }
}

fn matches(id: &str, filter: Option<&str>) -> bool {
    filter.map_or(true, |wanted| id.trim() == wanted)
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    fn endpoint(&self) -> StoreEndpoint {
        self.endpoint.clone()
    }

    async fn occupancy(&self, filter: Option<&str>) -> Result<Vec<OccupancyRow>, StoreError> {
        self.enter()?;
        Ok(self
            .occupancy
            .iter()
            .filter(|row| matches(&row.camera_id, filter))
            .cloned()
            .collect())
    }

    async fn people_counts(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<PeopleCountRow>, StoreError> {
        self.enter()?;
        Ok(self
            .people_counts
            .iter()
            .filter(|row| matches(&row.zone_id, filter))
            .cloned()
            .collect())
    }

    async fn environment(&self, filter: Option<&str>) -> Result<Vec<EnvironmentRow>, StoreError> {
        self.enter()?;
        Ok(self
            .environment
            .iter()
            .filter(|row| matches(&row.sensor_id, filter))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn row(id: &str) -> PeopleCountRow {
        PeopleCountRow {
            zone_id: id.to_string(),
            people_count: Some(3),
            captured_at: None,
        }
    }

    #[tokio::test]
    async fn test_memory_store_filters() {
        let store = MemoryStore::default().with_people_counts(vec![row("lobby"), row("workshop")]);
        assert_eq!(store.people_counts(None).await.unwrap().len(), 2);
        let rows = store.people_counts(Some("lobby")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].zone_id, "lobby");
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_failure_and_recovery() {
        let err = StoreError::connect(ErrorCode::ConnectionRefused, "localhost", 5432, "refused");
        let store = MemoryStore::default().failing(err.clone());
        assert_eq!(store.occupancy(None).await.unwrap_err(), err);
        store.set_failure(None);
        assert!(store.occupancy(None).await.unwrap().is_empty());
        assert_eq!(store.endpoint(), StoreEndpoint::new("localhost", 5432));
    }
}
