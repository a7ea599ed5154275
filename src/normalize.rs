// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Data normalization
//!
//! Converts store-encoded values into typed readings. Every function here
//! is total: malformed input degrades to empty or default values.
//!
//! # Example
//!
//! ```rust
//! use facility_gateway::normalize::{parse_bool_sequence, parse_id_list};
//! use facility_gateway::reading::RawArray;
//!
//! let ids = parse_id_list(Some(&RawArray::from("{S1,S2,S3,S4}")));
//! assert_eq!(ids, vec!["S1", "S2", "S3", "S4"]);
//!
//! let state = parse_bool_sequence(Some(&RawArray::from("{1,0,t}")), 4);
//! assert_eq!(state, vec![true, false, true, false]);
//! ```

use crate::reading::{
    EnvironmentReading, EnvironmentRow, OccupancyReading, OccupancyRow, PeopleCountReading,
    PeopleCountRow, RawArray, Spot,
};
use crate::source::Layout;
use chrono::{DateTime, Utc};

/// Split store text into raw tokens.
///
/// Accepts `{a,b}`, `[a,b]`, `a,b` and bare words. Tokens are trimmed and
/// unquoted; a `NULL` or empty token is `None` so positions are kept.
fn split_tokens(text: &str) -> Vec<Option<String>> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .or_else(|| trimmed.strip_prefix('[').and_then(|t| t.strip_suffix(']')))
        .unwrap_or(trimmed);

    if inner.trim().is_empty() {
        return Vec::new();
    }

    inner.split(',').map(clean_token).collect()
}

fn clean_token(token: &str) -> Option<String> {
    let token = token.trim();
    let token = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
        .trim();
    if token.is_empty() || token.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(token.to_string())
    }
}

fn slots(raw: Option<&RawArray>) -> Vec<Option<String>> {
    match raw {
        None => Vec::new(),
        Some(RawArray::Text(text)) => split_tokens(text),
        Some(RawArray::List(list)) => list.iter().map(|t| clean_token(t)).collect(),
    }
}

/// Parse an array-encoded id list into ordered ids.
///
/// Empty, absent, `NULL` and blank entries are dropped.
pub fn parse_id_list(raw: Option<&RawArray>) -> Vec<String> {
    slots(raw).into_iter().flatten().collect()
}

/// Positional id list, `None` where the store has no label
fn parse_id_slots(raw: Option<&RawArray>) -> Vec<Option<String>> {
    slots(raw)
}

/// Occupied iff the token is `1`, `t` or `true`, case-insensitive.
pub fn is_occupied_token(token: &str) -> bool {
    let token = token.trim();
    token == "1" || token.eq_ignore_ascii_case("t") || token.eq_ignore_ascii_case("true")
}

/// Parse a boolean sequence and fit it to `size`.
///
/// Bare bit strings such as `1001` (the text form of a bit column) are
/// read one character per spot. Short input is padded with `false`, long
/// input truncated: the layout size is authoritative.
pub fn parse_bool_sequence(raw: Option<&RawArray>, size: usize) -> Vec<bool> {
    let mut states: Vec<bool> = match raw {
        Some(RawArray::Text(text)) if is_bit_string(text) => {
            text.trim().chars().map(|c| c == '1').collect()
        }
        _ => slots(raw)
            .into_iter()
            .map(|token| token.as_deref().is_some_and(is_occupied_token))
            .collect(),
    };
    states.resize(size, false);
    states
}

fn is_bit_string(text: &str) -> bool {
    let text = text.trim();
    text.len() > 1 && text.chars().all(|c| c == '0' || c == '1')
}

/// Render a boolean sequence in the store's array text form, e.g. `{1,0,0,1}`.
pub fn encode_bool_sequence(states: &[bool]) -> String {
    let tokens: Vec<&str> = states
        .iter()
        .map(|&occupied| if occupied { "1" } else { "0" })
        .collect();
    format!("{{{}}}", tokens.join(","))
}

/// Default label of the spot at `index`
pub fn default_spot_label(index: usize) -> String {
    format!("S{}", index + 1)
}

/// Build the spots of a layout from states and optional labels.
pub fn build_spots(states: &[bool], labels: &[Option<String>]) -> Vec<Spot> {
    states
        .iter()
        .enumerate()
        .map(|(index, &occupied)| Spot {
            index,
            id: labels
                .get(index)
                .cloned()
                .flatten()
                .unwrap_or_else(|| default_spot_label(index)),
            occupied,
        })
        .collect()
}

/// Normalize an occupancy row against the camera's declared layout.
pub fn normalize_occupancy(
    row: &OccupancyRow,
    layout: Layout,
    now: DateTime<Utc>,
) -> OccupancyReading {
    let size = layout.spot_count();
    let states = parse_bool_sequence(row.spots_state.as_ref(), size);
    let labels = parse_id_slots(row.spot_ids.as_ref());
    let spots = build_spots(&states, &labels);
    OccupancyReading::new(
        row.camera_id.trim(),
        layout,
        spots,
        row.captured_at.unwrap_or(now),
    )
}

/// Normalize a people-count row. Negative or missing counts become 0.
pub fn normalize_people_count(
    row: &PeopleCountRow,
    capacity: u32,
    now: DateTime<Utc>,
) -> PeopleCountReading {
    let count = row
        .people_count
        .map(|c| c.clamp(0, u32::MAX as i64) as u32)
        .unwrap_or(0);
    PeopleCountReading {
        zone_id: row.zone_id.trim().to_string(),
        count,
        capacity,
        timestamp: row.captured_at.unwrap_or(now),
        placeholder: false,
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Normalize an environmental row. Non-finite metrics become null.
pub fn normalize_environment(row: &EnvironmentRow, now: DateTime<Utc>) -> EnvironmentReading {
    EnvironmentReading {
        sensor_id: row.sensor_id.trim().to_string(),
        temperature: finite(row.temperature),
        humidity: finite(row.humidity),
        co2: finite(row.co2),
        timestamp: row.captured_at.unwrap_or(now),
        placeholder: false,
    }
}
