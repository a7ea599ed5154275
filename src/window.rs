// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Availability window
//!
//! The store is only operated during staffed hours. Outside the window the
//! gateway synthesizes data without attempting a connection.

use chrono::{DateTime, FixedOffset, Local, Timelike};

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    /// Current local time with its UTC offset
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Clock reading the host's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Hours during which the store is expected to be serviceable
///
/// `open_hour` is inclusive, `close_hour` exclusive. When `open_hour` is
/// greater than `close_hour` the window wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceWindow {
    pub open_hour: u32,
    pub close_hour: u32,
}

impl Default for ServiceWindow {
    fn default() -> Self {
        Self {
            open_hour: 8,
            close_hour: 22,
        }
    }
}

impl ServiceWindow {
    pub fn new(open_hour: u32, close_hour: u32) -> Self {
        Self {
            open_hour,
            close_hour,
        }
    }

    /// Whether `hour` (0-23) falls inside the window
    pub fn contains(&self, hour: u32) -> bool {
        if self.open_hour <= self.close_hour {
            hour >= self.open_hour && hour < self.close_hour
        } else {
            hour >= self.open_hour || hour < self.close_hour
        }
    }

    /// The hour when it is outside the window, `None` when inside
    pub fn closed_at(&self, now: &DateTime<FixedOffset>) -> Option<u32> {
        let hour = now.hour();
        (!self.contains(hour)).then_some(hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_window_bounds() {
        let window = ServiceWindow::default();
        assert!(!window.contains(7));
        assert!(window.contains(8));
        assert!(window.contains(21));
        assert!(!window.contains(22));
        assert!(!window.contains(23));
        assert!(!window.contains(0));
    }

    #[test]
    fn test_every_hour_outside_default_window() {
        let window = ServiceWindow::default();
        let outside: Vec<u32> = (0..24).filter(|h| !window.contains(*h)).collect();
        assert_eq!(outside, vec![0, 1, 2, 3, 4, 5, 6, 7, 22, 23]);
    }

    #[test]
    fn test_wrapping_window() {
        let window = ServiceWindow::new(20, 4);
        assert!(window.contains(23));
        assert!(window.contains(0));
        assert!(window.contains(3));
        assert!(!window.contains(4));
        assert!(!window.contains(12));
    }

    #[test]
    fn test_closed_at_uses_local_hour() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let late = offset.with_ymd_and_hms(2025, 1, 10, 23, 15, 0).unwrap();
        let noon = offset.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let window = ServiceWindow::default();
        assert_eq!(window.closed_at(&late), Some(23));
        assert_eq!(window.closed_at(&noon), None);
    }

    #[test]
    fn test_fixed_clock() {
        let instant = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 1, 10, 6, 0, 0)
            .unwrap();
        assert_eq!(FixedClock(instant).now(), instant);
    }
}
