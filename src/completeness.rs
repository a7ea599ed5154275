// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Completeness guarantee
//!
//! Every response carries exactly one reading per required source, in the
//! registry's declared order. A source the store did not report gets a
//! placeholder reading of its own; the rest of the response stays live.

use crate::normalize::build_spots;
use crate::reading::{EnvironmentReading, OccupancyReading, PeopleCountReading, Reading};
use crate::source::{Layout, Source, SourceKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Reduce `readings` to one per required source, in canonical order.
///
/// The most recent reading of each source wins. Sources without any
/// reading get `placeholder(source)`. Readings of sources outside the
/// required set are dropped.
pub fn ensure_complete<R, F>(readings: Vec<R>, required: &[Source], placeholder: F) -> Vec<R>
where
    R: Reading,
    F: Fn(&Source) -> R,
{
    let mut latest: HashMap<String, R> = HashMap::with_capacity(readings.len());
    for reading in readings {
        let newer = latest
            .get(reading.source_id())
            .map_or(true, |kept| kept.timestamp() <= reading.timestamp());
        if newer {
            latest.insert(reading.source_id().to_string(), reading);
        }
    }

    required
        .iter()
        .map(|source| {
            latest
                .remove(source.id)
                .unwrap_or_else(|| placeholder(source))
        })
        .collect()
}

/// All-free reading for a camera the store did not report
pub fn placeholder_occupancy(source: &Source, timestamp: DateTime<Utc>) -> OccupancyReading {
    let layout = source.layout().unwrap_or(Layout::new(0, 0));
    let spots = build_spots(&vec![false; layout.spot_count()], &[]);
    let mut reading = OccupancyReading::new(source.id, layout, spots, timestamp);
    reading.placeholder = true;
    reading
}

/// Zero count for an area the store did not report
pub fn placeholder_people_count(source: &Source, timestamp: DateTime<Utc>) -> PeopleCountReading {
    let capacity = match source.kind {
        SourceKind::Counter { capacity } => capacity,
        _ => 0,
    };
    PeopleCountReading {
        zone_id: source.id.to_string(),
        count: 0,
        capacity,
        timestamp,
        placeholder: true,
    }
}

/// Empty metrics for a node the store did not report
pub fn placeholder_environment(source: &Source, timestamp: DateTime<Utc>) -> EnvironmentReading {
    EnvironmentReading {
        sensor_id: source.id.to_string(),
        temperature: None,
        humidity: None,
        co2: None,
        timestamp,
        placeholder: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CANONICAL_CAMERAS;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap()
    }

    fn reading(id: &str, occupied: bool, at: DateTime<Utc>) -> OccupancyReading {
        let spots = build_spots(&[occupied, false, false, false], &[]);
        OccupancyReading::new(id, Layout::new(1, 4), spots, at)
    }

    fn ids(readings: &[OccupancyReading]) -> Vec<&str> {
        readings.iter().map(|r| r.camera_id.as_str()).collect()
    }

    fn complete(readings: Vec<OccupancyReading>) -> Vec<OccupancyReading> {
        ensure_complete(readings, CANONICAL_CAMERAS, |s| placeholder_occupancy(s, base()))
    }

    #[test]
    fn test_empty_input_yields_placeholders() {
        let result = complete(Vec::new());
        assert_eq!(ids(&result), vec!["A1", "A2"]);
        assert!(result.iter().all(|r| r.placeholder));
        assert!(result.iter().all(|r| r.spots.len() == 4 && r.occupied == 0));
    }

    #[test]
    fn test_canonical_order_not_store_order() {
        let result = complete(vec![reading("A2", true, base()), reading("A1", true, base())]);
        assert_eq!(ids(&result), vec!["A1", "A2"]);
        assert!(result.iter().all(|r| !r.placeholder));
    }

    #[test]
    fn test_duplicates_keep_most_recent() {
        let older = reading("A1", false, base());
        let newer = reading("A1", true, base() + Duration::minutes(5));
        let result = complete(vec![newer.clone(), older.clone()]);
        assert_eq!(result[0], newer);

        let result = complete(vec![older, newer.clone()]);
        assert_eq!(result[0], newer);
        assert_eq!(result.len(), 2);
        assert!(result[1].placeholder);
    }

    #[test]
    fn test_unknown_sources_dropped() {
        let result = complete(vec![reading("Z9", true, base()), reading("A1", true, base())]);
        assert_eq!(ids(&result), vec!["A1", "A2"]);
    }

    #[test]
    fn test_placeholders_per_category() {
        let zone = Source::counter("lobby", 40);
        let count = placeholder_people_count(&zone, base());
        assert_eq!(count.count, 0);
        assert_eq!(count.capacity, 40);
        assert!(count.placeholder);

        let node = Source::environment("env-lab");
        let env = placeholder_environment(&node, base());
        assert!(env.temperature.is_none() && env.humidity.is_none() && env.co2.is_none());
        assert!(env.placeholder);
    }
}
