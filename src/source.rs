// Facility Gateway - Occupancy and environmental telemetry gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sensor sources and the required-set registry
//!
//! Every response covers the full required set of its category, in the
//! order declared here. Layouts are authoritative: the store content is
//! fitted to them, never the other way around.

use serde::Serialize;

/// Telemetry category served by one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Parking-spot occupancy per camera
    Occupancy,
    /// People counts per area
    PeopleCount,
    /// Temperature / humidity / CO2 per node
    Environment,
}

impl Category {
    /// Name of the collection field in the response envelope
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Occupancy => "areas",
            Self::PeopleCount => "zones",
            Self::Environment => "sensors",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Occupancy => "occupancy",
            Self::PeopleCount => "people_count",
            Self::Environment => "environment",
        }
    }
}

/// Spot grid of an occupancy camera, `[rows, cols]` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "[u16; 2]")]
pub struct Layout {
    pub rows: u16,
    pub cols: u16,
}

impl Layout {
    pub const fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Number of spots the camera watches
    pub fn spot_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

impl From<Layout> for [u16; 2] {
    fn from(layout: Layout) -> Self {
        [layout.rows, layout.cols]
    }
}

/// Category-specific attributes of a source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// Occupancy camera with its layout and mock baseline
    Camera {
        layout: Layout,
        baseline: &'static [bool],
    },
    /// People counter for an area
    Counter { capacity: u32 },
    /// Environmental node
    EnvironmentNode,
}

/// A stable sensor identity with a fixed position in every response
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: &'static str,
    pub kind: SourceKind,
}

impl Source {
    pub const fn camera(id: &'static str, layout: Layout, baseline: &'static [bool]) -> Self {
        Self {
            id,
            kind: SourceKind::Camera { layout, baseline },
        }
    }

    pub const fn counter(id: &'static str, capacity: u32) -> Self {
        Self {
            id,
            kind: SourceKind::Counter { capacity },
        }
    }

    pub const fn environment(id: &'static str) -> Self {
        Self {
            id,
            kind: SourceKind::EnvironmentNode,
        }
    }

    pub fn category(&self) -> Category {
        match self.kind {
            SourceKind::Camera { .. } => Category::Occupancy,
            SourceKind::Counter { .. } => Category::PeopleCount,
            SourceKind::EnvironmentNode => Category::Environment,
        }
    }

    /// Camera layout, `None` for non-camera sources
    pub fn layout(&self) -> Option<Layout> {
        match self.kind {
            SourceKind::Camera { layout, .. } => Some(layout),
            _ => None,
        }
    }
}

/// Canonical parking layout: two cameras watching four spots each.
pub const CANONICAL_CAMERAS: &[Source] = &[
    Source::camera("A1", Layout::new(1, 4), &[true, false, false, true]),
    Source::camera("A2", Layout::new(1, 4), &[false, true, true, false]),
];

/// Canonical people-count zones with their capacity.
pub const CANONICAL_ZONES: &[Source] = &[
    Source::counter("lobby", 40),
    Source::counter("workshop", 25),
    Source::counter("cafeteria", 60),
];

/// Canonical environmental nodes.
pub const CANONICAL_NODES: &[Source] = &[
    Source::environment("env-lab"),
    Source::environment("env-office"),
];

/// Required source sets, one per category, in canonical order
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    cameras: Vec<Source>,
    zones: Vec<Source>,
    nodes: Vec<Source>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self {
            cameras: CANONICAL_CAMERAS.to_vec(),
            zones: CANONICAL_ZONES.to_vec(),
            nodes: CANONICAL_NODES.to_vec(),
        }
    }
}

impl SourceRegistry {
    /// Build a registry from explicit source lists.
    ///
    /// Sources are filed under the category of their kind; declaration
    /// order within a category is the canonical order.
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        let mut registry = Self {
            cameras: Vec::new(),
            zones: Vec::new(),
            nodes: Vec::new(),
        };
        for source in sources {
            match source.category() {
                Category::Occupancy => registry.cameras.push(source),
                Category::PeopleCount => registry.zones.push(source),
                Category::Environment => registry.nodes.push(source),
            }
        }
        registry
    }

    /// Required set of a category, in canonical order
    pub fn required(&self, category: Category) -> &[Source] {
        match category {
            Category::Occupancy => &self.cameras,
            Category::PeopleCount => &self.zones,
            Category::Environment => &self.nodes,
        }
    }

    /// Look up a source of a category by id
    pub fn get(&self, category: Category, id: &str) -> Option<&Source> {
        self.required(category).iter().find(|s| s.id == id)
    }

    /// Required set narrowed to one id when a filter is given
    pub fn select(&self, category: Category, filter: Option<&str>) -> Vec<Source> {
        match filter {
            Some(id) => self.get(category, id).cloned().into_iter().collect(),
            None => self.required(category).to_vec(),
        }
    }
}
