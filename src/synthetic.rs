// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Synthetic readings
//!
//! Produces plausible readings when no authoritative data is available.
//!
//! - Occupancy follows a fixed per-camera baseline so mock layouts are stable.
//! - Metrics follow a diurnal curve:
//!   `base + amplitude * sin(2*PI*hour/24) + noise`, noise bounded by the
//!   profile's jitter, result clamped to the profile's range.
//!
//! The noise source is any [`Rng`]; pass a seeded [`StdRng`] for tests.

use crate::normalize::build_spots;
use crate::reading::{EnvironmentReading, OccupancyReading, PeopleCountReading};
use crate::source::{Layout, Source, SourceKind};
use chrono::{DateTime, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use xxhash_rust::xxh64::xxh64;

/// Diurnal profile of one metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricProfile {
    /// Daily mean
    pub base: f64,
    /// Peak deviation of the sinusoid
    pub amplitude: f64,
    /// Bound of the noise term
    pub jitter: f64,
    /// Lowest plausible value
    pub min: f64,
    /// Highest plausible value
    pub max: f64,
}

impl MetricProfile {
    pub const fn new(base: f64, amplitude: f64, jitter: f64, min: f64, max: f64) -> Self {
        Self {
            base,
            amplitude,
            jitter,
            min,
            max,
        }
    }

    /// Noise-free value of the curve at `hour` (0.0 to 24.0)
    pub fn curve(&self, hour: f64) -> f64 {
        self.base + self.amplitude * (2.0 * PI * hour / 24.0).sin()
    }

    /// Curve plus bounded noise, clamped to the plausible range
    pub fn sample<R: Rng + ?Sized>(&self, hour: f64, rng: &mut R) -> f64 {
        (self.curve(hour) + bounded_noise(self.jitter, rng)).clamp(self.min, self.max)
    }
}

/// Temperature in degrees Celsius
pub const TEMPERATURE: MetricProfile = MetricProfile::new(22.0, 2.5, 0.3, 15.0, 30.0);

/// Relative humidity in percent
pub const HUMIDITY: MetricProfile = MetricProfile::new(45.0, 8.0, 1.5, 20.0, 80.0);

/// CO2 in ppm
pub const CO2: MetricProfile = MetricProfile::new(650.0, 180.0, 25.0, 400.0, 2000.0);

/// Gaussian noise folded into `[-jitter, jitter]`
fn bounded_noise<R: Rng + ?Sized>(jitter: f64, rng: &mut R) -> f64 {
    if jitter <= 0.0 {
        return 0.0;
    }
    Normal::new(0.0, jitter / 2.0)
        .map(|normal| normal.sample(rng))
        .unwrap_or(0.0)
        .clamp(-jitter, jitter)
}

/// Fractional hour of day of a timestamp in its own timezone
pub fn hour_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> f64 {
    now.hour() as f64 + now.minute() as f64 / 60.0
}

/// Profile of a people counter, scaled to the area capacity
pub fn people_profile(capacity: u32) -> MetricProfile {
    let capacity = capacity as f64;
    MetricProfile::new(0.35 * capacity, 0.25 * capacity, 2.0, 0.0, capacity)
}

/// Baseline occupancy of a camera fitted to its layout.
///
/// Uses the declared baseline; a camera without one gets a pattern
/// derived from its id, so the result is the same on every call.
pub fn baseline_occupancy(id: &str, layout: Layout, baseline: &[bool]) -> Vec<bool> {
    let size = layout.spot_count();
    let mut states: Vec<bool> = if baseline.is_empty() {
        let bits = xxh64(id.as_bytes(), 0);
        (0..size).map(|i| (bits >> (i % 64)) & 1 == 1).collect()
    } else {
        baseline.iter().copied().take(size).collect()
    };
    states.resize(size, false);
    states
}

/// Synthetic reading generator
#[derive(Debug)]
pub struct SyntheticGenerator<R: Rng = StdRng> {
    rng: R,
}

impl SyntheticGenerator<StdRng> {
    /// Generator with a non-reproducible noise source
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Generator with a reproducible noise source
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SyntheticGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Baseline occupancy reading, `None` for non-camera sources
    pub fn occupancy<Tz: TimeZone>(
        &mut self,
        source: &Source,
        now: &DateTime<Tz>,
    ) -> Option<OccupancyReading> {
        let SourceKind::Camera { layout, baseline } = &source.kind else {
            return None;
        };
        let states = baseline_occupancy(source.id, *layout, baseline);
        let spots = build_spots(&states, &[]);
        Some(OccupancyReading::new(
            source.id,
            *layout,
            spots,
            now.with_timezone(&Utc),
        ))
    }

    /// Diurnal people count, `None` for non-counter sources
    pub fn people_count<Tz: TimeZone>(
        &mut self,
        source: &Source,
        now: &DateTime<Tz>,
    ) -> Option<PeopleCountReading> {
        let SourceKind::Counter { capacity } = source.kind else {
            return None;
        };
        let value = people_profile(capacity).sample(hour_of_day(now), &mut self.rng);
        Some(PeopleCountReading {
            zone_id: source.id.to_string(),
            count: value.round() as u32,
            capacity,
            timestamp: now.with_timezone(&Utc),
            placeholder: false,
        })
    }

    /// Diurnal environmental reading, `None` for non-environment sources
    pub fn environment<Tz: TimeZone>(
        &mut self,
        source: &Source,
        now: &DateTime<Tz>,
    ) -> Option<EnvironmentReading> {
        if source.kind != SourceKind::EnvironmentNode {
            return None;
        }
        let hour = hour_of_day(now);
        Some(EnvironmentReading {
            sensor_id: source.id.to_string(),
            temperature: Some(round_to(TEMPERATURE.sample(hour, &mut self.rng), 1)),
            humidity: Some(round_to(HUMIDITY.sample(hour, &mut self.rng), 1)),
            co2: Some(CO2.sample(hour, &mut self.rng).round()),
            timestamp: now.with_timezone(&Utc),
            placeholder: false,
        })
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CANONICAL_CAMERAS, CANONICAL_NODES, CANONICAL_ZONES};
    use approx::assert_relative_eq;
    use chrono::FixedOffset;

    fn at_hour(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 2, hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_curve_shape() {
        assert_relative_eq!(TEMPERATURE.curve(0.0), 22.0, epsilon = 1e-9);
        assert_relative_eq!(TEMPERATURE.curve(6.0), 24.5, epsilon = 1e-9);
        assert_relative_eq!(TEMPERATURE.curve(12.0), 22.0, epsilon = 1e-9);
        assert_relative_eq!(TEMPERATURE.curve(18.0), 19.5, epsilon = 1e-9);
    }

    #[test]
    fn test_sample_stays_near_curve() {
        let mut rng = StdRng::seed_from_u64(7);
        for hour in 0..24 {
            let hour = hour as f64;
            for profile in [TEMPERATURE, HUMIDITY, CO2] {
                let value = profile.sample(hour, &mut rng);
                assert!(value >= profile.min && value <= profile.max);
                assert!((value - profile.curve(hour)).abs() <= profile.jitter + 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let profile = MetricProfile::new(10.0, 1.0, 0.0, 0.0, 100.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_relative_eq!(profile.sample(6.0, &mut rng), 11.0, epsilon = 1e-9);
    }

    #[test]
    fn test_occupancy_is_deterministic() {
        let mut gen_a = SyntheticGenerator::seeded(1);
        let mut gen_b = SyntheticGenerator::seeded(99);
        for camera in CANONICAL_CAMERAS {
            let a = gen_a.occupancy(camera, &at_hour(10)).unwrap();
            let b = gen_b.occupancy(camera, &at_hour(23)).unwrap();
            assert_eq!(a.spots, b.spots);
            assert_eq!(a.spots.len(), 4);
        }
        let a1 = gen_a.occupancy(&CANONICAL_CAMERAS[0], &at_hour(10)).unwrap();
        let states: Vec<bool> = a1.spots.iter().map(|s| s.occupied).collect();
        assert_eq!(states, vec![true, false, false, true]);
    }

    #[test]
    fn test_baseline_without_declaration_is_stable() {
        let layout = Layout::new(2, 3);
        let first = baseline_occupancy("B7", layout, &[]);
        let second = baseline_occupancy("B7", layout, &[]);
        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
    }

    #[test]
    fn test_baseline_fitted_to_layout() {
        assert_eq!(
            baseline_occupancy("X", Layout::new(1, 2), &[true, true, true]),
            vec![true, true]
        );
        assert_eq!(
            baseline_occupancy("X", Layout::new(1, 3), &[true]),
            vec![true, false, false]
        );
    }

    #[test]
    fn test_environment_reading_bounds() {
        let mut generator = SyntheticGenerator::seeded(42);
        for hour in [0, 7, 13, 22] {
            let reading = generator
                .environment(&CANONICAL_NODES[0], &at_hour(hour))
                .unwrap();
            let temperature = reading.temperature.unwrap();
            let humidity = reading.humidity.unwrap();
            let co2 = reading.co2.unwrap();
            assert!((15.0..=30.0).contains(&temperature));
            assert!((20.0..=80.0).contains(&humidity));
            assert!((400.0..=2000.0).contains(&co2));
            assert_eq!(reading.timestamp, at_hour(hour).with_timezone(&Utc));
        }
    }

    #[test]
    fn test_people_count_within_capacity() {
        let mut generator = SyntheticGenerator::seeded(3);
        for zone in CANONICAL_ZONES {
            for hour in 0..24 {
                let reading = generator.people_count(zone, &at_hour(hour)).unwrap();
                assert!(reading.count <= reading.capacity);
            }
        }
    }

    #[test]
    fn test_wrong_kind_yields_none() {
        let mut generator = SyntheticGenerator::seeded(0);
        assert!(generator.occupancy(&CANONICAL_NODES[0], &at_hour(9)).is_none());
        assert!(generator.environment(&CANONICAL_CAMERAS[0], &at_hour(9)).is_none());
        assert!(generator.people_count(&CANONICAL_CAMERAS[0], &at_hour(9)).is_none());
    }

    #[test]
    fn test_hour_of_day_uses_local_offset() {
        assert_relative_eq!(hour_of_day(&at_hour(23)), 23.0);
    }
}
