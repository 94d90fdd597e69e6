//! Request, result and table types for matrix computations

use std::ops::BitOr;

use butterfly_common::DistanceUnit;
use serde::{Deserialize, Serialize};

use super::error::{MatrixError, Result};
use crate::filters::RouteOptions;
use crate::graph::NodeId;

/// Cell value for an unreachable or unresolved pair.
pub const UNREACHABLE: f64 = -1.0;

// =============================================================================
// LOCATIONS
// =============================================================================

/// Resolved node per input location; `None` when snapping failed.
///
/// On the wire an unresolved location is the node id `-1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixLocations {
    #[serde(with = "sentinel_ids")]
    nodes: Vec<Option<NodeId>>,
    /// Original `[lon, lat]` per location, kept for result assembly
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    coordinates: Vec<[f64; 2]>,
}

impl MatrixLocations {
    pub fn new(nodes: Vec<Option<NodeId>>) -> Self {
        Self {
            nodes,
            coordinates: Vec::new(),
        }
    }

    /// `-1` marks an unresolved location; any other id outside the node
    /// id range is rejected.
    pub fn from_node_ids(ids: &[i64]) -> Result<Self> {
        let nodes = ids
            .iter()
            .map(|&id| sentinel_ids::decode(id))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(MatrixError::InvalidRequest)?;
        Ok(Self::new(nodes))
    }

    pub fn with_coordinates(mut self, coordinates: Vec<[f64; 2]>) -> Self {
        self.coordinates = coordinates;
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, index: usize) -> Option<NodeId> {
        self.nodes.get(index).copied().flatten()
    }

    #[inline]
    pub fn nodes(&self) -> &[Option<NodeId>] {
        &self.nodes
    }

    pub fn coordinate(&self, index: usize) -> Option<[f64; 2]> {
        self.coordinates.get(index).copied()
    }

    pub fn coordinates(&self) -> &[[f64; 2]] {
        &self.coordinates
    }

    pub fn resolved_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Contiguous slice of locations, used to split sources into batches.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.nodes.len());
        let start = start.min(end);
        Self {
            nodes: self.nodes[start..end].to_vec(),
            coordinates: self
                .coordinates
                .get(start..end)
                .map(<[_]>::to_vec)
                .unwrap_or_default(),
        }
    }
}

mod sentinel_ids {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::graph::NodeId;

    const UNRESOLVED: i64 = -1;

    pub fn decode(id: i64) -> Result<Option<NodeId>, String> {
        if id == UNRESOLVED {
            return Ok(None);
        }
        NodeId::try_from(id)
            .map(Some)
            .map_err(|_| format!("node id {id} is out of range (use {UNRESOLVED} for unresolved)"))
    }

    pub fn serialize<S: Serializer>(nodes: &[Option<NodeId>], s: S) -> Result<S::Ok, S::Error> {
        let ids: Vec<i64> = nodes
            .iter()
            .map(|n| n.map_or(UNRESOLVED, i64::from))
            .collect();
        ids.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Option<NodeId>>, D::Error> {
        let ids = Vec::<i64>::deserialize(d)?;
        ids.into_iter()
            .map(decode)
            .collect::<Result<_, _>>()
            .map_err(D::Error::custom)
    }
}

// =============================================================================
// METRIC SELECTION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Distance,
    Duration,
    Weight,
}

/// Bit set over {distance, duration, weight}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Metric>", into = "Vec<Metric>")]
pub struct MatrixMetrics(u8);

impl MatrixMetrics {
    pub const NONE: MatrixMetrics = MatrixMetrics(0);
    pub const DISTANCE: MatrixMetrics = MatrixMetrics(1);
    pub const DURATION: MatrixMetrics = MatrixMetrics(2);
    pub const WEIGHT: MatrixMetrics = MatrixMetrics(4);
    pub const ALL: MatrixMetrics = MatrixMetrics(7);

    #[inline]
    pub fn contains(self, other: MatrixMetrics) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for MatrixMetrics {
    fn default() -> Self {
        MatrixMetrics::DISTANCE
    }
}

impl BitOr for MatrixMetrics {
    type Output = MatrixMetrics;

    fn bitor(self, rhs: MatrixMetrics) -> MatrixMetrics {
        MatrixMetrics(self.0 | rhs.0)
    }
}

impl From<Metric> for MatrixMetrics {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Distance => MatrixMetrics::DISTANCE,
            Metric::Duration => MatrixMetrics::DURATION,
            Metric::Weight => MatrixMetrics::WEIGHT,
        }
    }
}

impl From<Vec<Metric>> for MatrixMetrics {
    fn from(metrics: Vec<Metric>) -> Self {
        metrics
            .into_iter()
            .fold(MatrixMetrics::NONE, |acc, m| acc | m.into())
    }
}

impl From<MatrixMetrics> for Vec<Metric> {
    fn from(metrics: MatrixMetrics) -> Self {
        [Metric::Distance, Metric::Duration, Metric::Weight]
            .into_iter()
            .filter(|&m| metrics.contains(m.into()))
            .collect()
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// Which engine computes the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixStrategy {
    /// Hierarchy-restricted when the graph has contraction metadata
    #[default]
    Auto,
    /// General multi-tree Dijkstra
    Dijkstra,
    /// Hierarchy-restricted search over the target subgraph
    Rphast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRequest {
    pub sources: MatrixLocations,
    pub destinations: MatrixLocations,
    #[serde(default)]
    pub metrics: MatrixMetrics,
    #[serde(default)]
    pub units: DistanceUnit,
    /// Overrides the configured strategy
    #[serde(default)]
    pub strategy: Option<MatrixStrategy>,
    /// Overrides the configured visited-node budget
    #[serde(default)]
    pub max_visited_nodes: Option<usize>,
    #[serde(default)]
    pub options: RouteOptions,
}

impl MatrixRequest {
    pub fn new(sources: MatrixLocations, destinations: MatrixLocations) -> Self {
        Self {
            sources,
            destinations,
            metrics: MatrixMetrics::default(),
            units: DistanceUnit::default(),
            strategy: None,
            max_visited_nodes: None,
            options: RouteOptions::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: MatrixMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_units(mut self, units: DistanceUnit) -> Self {
        self.units = units;
        self
    }

    pub fn with_strategy(mut self, strategy: MatrixStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_max_visited_nodes(mut self, limit: usize) -> Self {
        self.max_visited_nodes = Some(limit);
        self
    }

    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }
}

// =============================================================================
// TABLES / RESULT
// =============================================================================

/// Row-major tables, one per requested metric; unrequested tables stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatrixTables {
    #[serde(skip)]
    n_sources: usize,
    #[serde(skip)]
    n_destinations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    distances: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    durations: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weights: Option<Vec<f64>>,
}

impl MatrixTables {
    /// Requested tables, every cell initialised to [`UNREACHABLE`].
    pub fn allocate(n_sources: usize, n_destinations: usize, metrics: MatrixMetrics) -> Self {
        let cells = n_sources * n_destinations;
        let table = |m: MatrixMetrics| metrics.contains(m).then(|| vec![UNREACHABLE; cells]);
        Self {
            n_sources,
            n_destinations,
            distances: table(MatrixMetrics::DISTANCE),
            durations: table(MatrixMetrics::DURATION),
            weights: table(MatrixMetrics::WEIGHT),
        }
    }

    #[inline]
    pub fn n_sources(&self) -> usize {
        self.n_sources
    }

    #[inline]
    pub fn n_destinations(&self) -> usize {
        self.n_destinations
    }

    pub fn distances(&self) -> Option<&[f64]> {
        self.distances.as_deref()
    }

    pub fn durations(&self) -> Option<&[f64]> {
        self.durations.as_deref()
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Write one cell; values for unallocated tables are dropped.
    #[inline]
    pub(crate) fn write(&mut self, source: usize, destination: usize, cell: CellMetrics) {
        let idx = source * self.n_destinations + destination;
        if let Some(t) = self.distances.as_mut() {
            t[idx] = cell.distance;
        }
        if let Some(t) = self.durations.as_mut() {
            t[idx] = cell.duration;
        }
        if let Some(t) = self.weights.as_mut() {
            t[idx] = cell.weight;
        }
    }

    /// Append the rows of a source batch computed against the same
    /// destinations.
    pub(crate) fn append_rows(&mut self, batch: MatrixTables) {
        debug_assert_eq!(batch.n_destinations, self.n_destinations);
        fn extend(dst: &mut Option<Vec<f64>>, src: Option<Vec<f64>>) {
            if let (Some(d), Some(s)) = (dst.as_mut(), src) {
                d.extend(s);
            }
        }
        self.n_sources += batch.n_sources;
        extend(&mut self.distances, batch.distances);
        extend(&mut self.durations, batch.durations);
        extend(&mut self.weights, batch.weights);
    }
}

/// Accumulated metrics of one source/destination pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CellMetrics {
    pub distance: f64,
    pub duration: f64,
    pub weight: f64,
}

impl CellMetrics {
    pub const ZERO: CellMetrics = CellMetrics {
        distance: 0.0,
        duration: 0.0,
        weight: 0.0,
    };

}

/// Counters and timings for one matrix computation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatrixStats {
    pub n_sources: usize,
    pub n_destinations: usize,
    pub resolved_sources: usize,
    pub resolved_destinations: usize,
    pub batches: usize,
    pub target_graph_nodes: usize,
    pub target_graph_edges: usize,
    pub core_exit_points: usize,
    pub core_entry_points: usize,
    pub upward_visited: usize,
    pub core_visited: usize,
    pub downward_visited: usize,
    /// Settled nodes in the general multi-tree Dijkstra
    pub dijkstra_visited: usize,
    pub prepare_time_ms: u64,
    pub search_time_ms: u64,
    pub extract_time_ms: u64,
    pub total_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixResult {
    #[serde(flatten)]
    pub tables: MatrixTables,
    pub units: DistanceUnit,
    /// Strategy that actually ran
    pub strategy: MatrixStrategy,
    pub stats: MatrixStats,
}

impl MatrixResult {
    pub fn n_sources(&self) -> usize {
        self.tables.n_sources()
    }

    pub fn n_destinations(&self) -> usize {
        self.tables.n_destinations()
    }

    pub fn distances(&self) -> Option<&[f64]> {
        self.tables.distances()
    }

    pub fn durations(&self) -> Option<&[f64]> {
        self.tables.durations()
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.tables.weights()
    }

    pub fn distance(&self, source: usize, destination: usize) -> Option<f64> {
        self.cell(self.distances(), source, destination)
    }

    pub fn duration(&self, source: usize, destination: usize) -> Option<f64> {
        self.cell(self.durations(), source, destination)
    }

    pub fn weight(&self, source: usize, destination: usize) -> Option<f64> {
        self.cell(self.weights(), source, destination)
    }

    fn cell(&self, table: Option<&[f64]>, source: usize, destination: usize) -> Option<f64> {
        if source >= self.n_sources() || destination >= self.n_destinations() {
            return None;
        }
        table.map(|t| t[source * self.n_destinations() + destination])
    }
}
