//! Edge weightings
//!
//! A weighting maps the traversal of one original edge to a non-negative
//! cost. `f64::INFINITY` marks an edge (or turn) that cannot be used.
//! Shortcut costs are not computed here: they are stored on the shortcut at
//! contraction time, turns inside it included, and [`traversal_weight`]
//! returns that stored value plus the turn onto its first original edge.

use rustc_hash::FxHashMap;

use crate::graph::{EdgeId, EdgeView, NodeId};

/// Pluggable cost model. Shared read-only across concurrent requests.
pub trait Weighting: Send + Sync {
    fn name(&self) -> &str;

    /// Cost of driving the original edge in the orientation of `edge`.
    fn edge_weight(&self, edge: &EdgeView<'_>) -> f64;

    /// Travel time in seconds for the original edge.
    fn edge_duration(&self, edge: &EdgeView<'_>) -> f64 {
        travel_seconds(edge)
    }

    /// Extra cost for turning from `from` onto `to` at `via`.
    fn turn_weight(&self, _from: EdgeId, _via: NodeId, _to: EdgeId) -> f64 {
        0.0
    }

    fn has_turn_costs(&self) -> bool {
        false
    }
}

#[inline]
fn travel_seconds(edge: &EdgeView<'_>) -> f64 {
    let speed = edge.speed_kmh();
    if speed > 0.0 {
        edge.distance() * 3.6 / speed
    } else {
        f64::INFINITY
    }
}

/// Cost of one traversal step of the search.
///
/// Inaccessible orientation is infinite. Shortcuts return their stored
/// weight, original edges ask the weighting. Either way the turn at `base`
/// from `incoming` (last original edge of the path so far) onto the first
/// original edge of `edge` is added when present.
#[inline]
pub fn traversal_weight(
    weighting: &dyn Weighting,
    edge: &EdgeView<'_>,
    incoming: Option<EdgeId>,
) -> f64 {
    if !edge.forward_access() {
        return f64::INFINITY;
    }
    let weight = match edge.shortcut() {
        Some(sc) => sc.weight,
        None => weighting.edge_weight(edge),
    };
    match incoming {
        Some(from) if weighting.has_turn_costs() => {
            weight + weighting.turn_weight(from, edge.base, edge.first_original_edge())
        }
        _ => weight,
    }
}

/// Cost equals distance in meters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestWeighting;

impl Weighting for ShortestWeighting {
    fn name(&self) -> &str {
        "shortest"
    }

    fn edge_weight(&self, edge: &EdgeView<'_>) -> f64 {
        edge.distance()
    }
}

/// Cost equals travel time in seconds, with an optional speed cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastestWeighting {
    pub max_speed_kmh: Option<f64>,
}

impl FastestWeighting {
    fn effective_speed(&self, edge: &EdgeView<'_>) -> f64 {
        let speed = edge.speed_kmh();
        match self.max_speed_kmh {
            Some(cap) => speed.min(cap),
            None => speed,
        }
    }
}

impl Weighting for FastestWeighting {
    fn name(&self) -> &str {
        "fastest"
    }

    fn edge_weight(&self, edge: &EdgeView<'_>) -> f64 {
        self.edge_duration(edge)
    }

    fn edge_duration(&self, edge: &EdgeView<'_>) -> f64 {
        let speed = self.effective_speed(edge);
        if speed > 0.0 {
            edge.distance() * 3.6 / speed
        } else {
            f64::INFINITY
        }
    }
}

/// Turn costs keyed by `(from_edge, via_node, to_edge)` over original edges.
#[derive(Debug, Clone, Default)]
pub struct TurnCostTable {
    costs: FxHashMap<(EdgeId, NodeId, EdgeId), f64>,
}

impl TurnCostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, from: EdgeId, via: NodeId, to: EdgeId, cost: f64) {
        self.costs.insert((from, via, to), cost);
    }

    /// Forbid the turn entirely.
    pub fn restrict(&mut self, from: EdgeId, via: NodeId, to: EdgeId) {
        self.set(from, via, to, f64::INFINITY);
    }

    #[inline]
    pub fn get(&self, from: EdgeId, via: NodeId, to: EdgeId) -> f64 {
        self.costs.get(&(from, via, to)).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}

/// Adds a turn cost table on top of another weighting.
#[derive(Debug, Clone)]
pub struct TurnCostWeighting<W> {
    inner: W,
    turns: TurnCostTable,
}

impl<W: Weighting> TurnCostWeighting<W> {
    pub fn new(inner: W, turns: TurnCostTable) -> Self {
        Self { inner, turns }
    }
}

impl<W: Weighting> Weighting for TurnCostWeighting<W> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn edge_weight(&self, edge: &EdgeView<'_>) -> f64 {
        self.inner.edge_weight(edge)
    }

    fn edge_duration(&self, edge: &EdgeView<'_>) -> f64 {
        self.inner.edge_duration(edge)
    }

    fn turn_weight(&self, from: EdgeId, via: NodeId, to: EdgeId) -> f64 {
        self.turns.get(from, via, to)
    }

    fn has_turn_costs(&self) -> bool {
        !self.turns.is_empty()
    }
}
