// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Readings and the raw rows they are normalized from

use crate::source::Layout;
use chrono::{DateTime, Utc};
use serde::Serialize;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Common view over the readings of every category
pub trait Reading: Serialize + Clone + Send + Sync + 'static {
    /// Id of the source this reading belongs to
    fn source_id(&self) -> &str;

    /// Capture time of the reading
    fn timestamp(&self) -> DateTime<Utc>;
}

/// One parking spot watched by a camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Spot {
    /// Zero-based position in the layout
    pub index: usize,
    /// Stable label
    pub id: String,
    pub occupied: bool,
}

/// Occupancy snapshot of one camera
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyReading {
    pub camera_id: String,
    pub layout: Layout,
    pub spots: Vec<Spot>,
    /// Number of occupied spots
    pub occupied: usize,
    /// Number of free spots
    pub free: usize,
    pub timestamp: DateTime<Utc>,
    /// Inserted by the completeness step, not sourced from the store
    #[serde(skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl OccupancyReading {
    /// Build a reading from spot states; counters are derived.
    pub fn new(
        camera_id: impl Into<String>,
        layout: Layout,
        spots: Vec<Spot>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let occupied = spots.iter().filter(|s| s.occupied).count();
        Self {
            camera_id: camera_id.into(),
            layout,
            free: spots.len() - occupied,
            occupied,
            spots,
            timestamp,
            placeholder: false,
        }
    }
}

impl Reading for OccupancyReading {
    fn source_id(&self) -> &str {
        &self.camera_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// People count of one area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeopleCountReading {
    pub zone_id: String,
    pub count: u32,
    pub capacity: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl Reading for PeopleCountReading {
    fn source_id(&self) -> &str {
        &self.zone_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Environmental snapshot of one node
///
/// Metrics are optional: partial rows keep the metrics they have.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentReading {
    pub sensor_id: String,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    /// CO2 concentration in ppm
    pub co2: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl Reading for EnvironmentReading {
    fn source_id(&self) -> &str {
        &self.sensor_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Array-valued column as returned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawArray {
    /// Store text encoding, e.g. `{S1,S2}` or a bit string `1001`
    Text(String),
    /// Already structured list
    List(Vec<String>),
}

impl From<&str> for RawArray {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RawArray {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<String>> for RawArray {
    fn from(list: Vec<String>) -> Self {
        Self::List(list)
    }
}

/// Occupancy row as stored
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyRow {
    pub camera_id: String,
    pub spot_ids: Option<RawArray>,
    pub spots_state: Option<RawArray>,
    pub captured_at: Option<DateTime<Utc>>,
}

/// People-count row as stored
#[derive(Debug, Clone, PartialEq)]
pub struct PeopleCountRow {
    pub zone_id: String,
    pub people_count: Option<i64>,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Environmental row as stored
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentRow {
    pub sensor_id: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub co2: Option<f64>,
    pub captured_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_occupancy_counters() {
        let spots = vec![
            Spot { index: 0, id: "S1".into(), occupied: true },
            Spot { index: 1, id: "S2".into(), occupied: false },
            Spot { index: 2, id: "S3".into(), occupied: true },
        ];
        let reading = OccupancyReading::new("A1", Layout::new(1, 3), spots, ts());
        assert_eq!(reading.occupied, 2);
        assert_eq!(reading.free, 1);
        assert_eq!(reading.source_id(), "A1");
    }

    #[test]
    fn test_placeholder_flag_only_serialized_when_set() {
        let mut reading = OccupancyReading::new("A1", Layout::new(1, 0), Vec::new(), ts());
        let json = serde_json::to_value(&reading).unwrap();
        assert!(json.get("placeholder").is_none());
        assert_eq!(json["layout"], serde_json::json!([1, 0]));
        assert_eq!(json["timestamp"], "2025-03-14T10:30:00Z");

        reading.placeholder = true;
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["placeholder"], true);
    }

    #[test]
    fn test_environment_nulls() {
        let reading = EnvironmentReading {
            sensor_id: "env-lab".into(),
            temperature: Some(21.5),
            humidity: None,
            co2: None,
            timestamp: ts(),
            placeholder: false,
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["temperature"], 21.5);
        assert!(json["humidity"].is_null());
    }
}
