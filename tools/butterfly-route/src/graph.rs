//! Graph Model adapter for the matrix engine
//!
//! `RoutingGraph` is an immutable view of an already contracted graph:
//! original edges plus shortcuts, per-node contraction levels and the level
//! that marks the uncontracted core. It is shared read-only across requests;
//! nothing in the search path mutates it.
//!
//! # Edge orientation
//!
//! Every edge is stored once as `base -> adj` with separate forward/backward
//! access flags and is listed in the adjacency of both endpoints.
//! [`RoutingGraph::edges_from`] yields an [`EdgeView`] oriented away from the
//! queried node; `reverse` is set when that orientation runs against the
//! storage direction.
//!
//! # Shortcuts
//!
//! A shortcut `base -> adj` replaces the two-edge path `base - via - adj`.
//! `first` connects `base` and `via`, `second` connects `via` and `adj`, in
//! whatever storage orientation those children have. Children must be added
//! before the shortcut that references them, which keeps unpacking acyclic.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type NodeId = u32;
pub type EdgeId = u32;

/// Orientation of a search relative to the direction of travel.
///
/// `Forward` walks edges the way a vehicle drives them (source side).
/// `Backward` walks them against travel direction (target side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchDirection {
    Forward,
    Backward,
}

/// Road attribute bits consulted by restriction filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeFlags(pub u16);

impl EdgeFlags {
    pub const NONE: EdgeFlags = EdgeFlags(0);
    pub const TOLL: EdgeFlags = EdgeFlags(1 << 0);
    pub const FERRY: EdgeFlags = EdgeFlags(1 << 1);
    pub const TUNNEL: EdgeFlags = EdgeFlags(1 << 2);
    pub const HIGHWAY: EdgeFlags = EdgeFlags(1 << 3);
    pub const UNPAVED: EdgeFlags = EdgeFlags(1 << 4);
    pub const BORDER_CONTROLLED: EdgeFlags = EdgeFlags(1 << 5);
    pub const BORDER_OPEN: EdgeFlags = EdgeFlags(1 << 6);
    pub const HGV_FORBIDDEN: EdgeFlags = EdgeFlags(1 << 7);

    #[inline]
    pub fn contains(self, other: EdgeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: EdgeFlags) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EdgeFlags {
    type Output = EdgeFlags;

    fn bitor(self, rhs: EdgeFlags) -> EdgeFlags {
        EdgeFlags(self.0 | rhs.0)
    }
}

/// Which directions an edge may be driven, relative to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeAccess {
    #[default]
    Both,
    Forward,
    Backward,
}

impl EdgeAccess {
    fn flags(self) -> (bool, bool) {
        match self {
            EdgeAccess::Both => (true, true),
            EdgeAccess::Forward => (true, false),
            EdgeAccess::Backward => (false, true),
        }
    }
}

/// Per-edge metadata. Speeds are km/h, limits are metric units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeAttributes {
    pub flags: EdgeFlags,
    pub speed_kmh: f64,
    /// Speed against storage direction; `speed_kmh` when absent
    pub reverse_speed_kmh: Option<f64>,
    pub max_weight_t: Option<f32>,
    pub max_height_m: Option<f32>,
    pub max_width_m: Option<f32>,
}

impl Default for EdgeAttributes {
    fn default() -> Self {
        Self {
            flags: EdgeFlags::NONE,
            speed_kmh: 50.0,
            reverse_speed_kmh: None,
            max_weight_t: None,
            max_height_m: None,
            max_width_m: None,
        }
    }
}

/// Shortcut payload: the two child edges and the precomputed weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shortcut {
    pub via: NodeId,
    pub first: EdgeId,
    pub second: EdgeId,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub base: NodeId,
    pub adj: NodeId,
    /// Meters
    pub distance: f64,
    pub forward: bool,
    pub backward: bool,
    pub attributes: EdgeAttributes,
    pub shortcut: Option<Shortcut>,
    // Original edge touching each endpoint (the edge itself unless shortcut)
    orig_at_base: EdgeId,
    orig_at_adj: EdgeId,
}

impl Edge {
    /// Original edge incident to `node`, which must be an endpoint.
    #[inline]
    fn original_at(&self, node: NodeId) -> EdgeId {
        if node == self.base {
            self.orig_at_base
        } else {
            self.orig_at_adj
        }
    }

    #[inline]
    fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.base == a && self.adj == b) || (self.base == b && self.adj == a)
    }
}

/// An edge seen from one of its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'g> {
    pub id: EdgeId,
    pub base: NodeId,
    pub adj: NodeId,
    /// Traversal runs against storage direction
    pub reverse: bool,
    edge: &'g Edge,
}

impl<'g> EdgeView<'g> {
    #[inline]
    pub fn edge(&self) -> &'g Edge {
        self.edge
    }

    #[inline]
    pub fn distance(&self) -> f64 {
        self.edge.distance
    }

    #[inline]
    pub fn attributes(&self) -> &'g EdgeAttributes {
        &self.edge.attributes
    }

    #[inline]
    pub fn flags(&self) -> EdgeFlags {
        self.edge.attributes.flags
    }

    /// May be driven from `base` to `adj`.
    #[inline]
    pub fn forward_access(&self) -> bool {
        if self.reverse {
            self.edge.backward
        } else {
            self.edge.forward
        }
    }

    /// May be driven from `adj` to `base`.
    #[inline]
    pub fn backward_access(&self) -> bool {
        if self.reverse {
            self.edge.forward
        } else {
            self.edge.backward
        }
    }

    #[inline]
    pub fn accessible(&self, direction: SearchDirection) -> bool {
        match direction {
            SearchDirection::Forward => self.forward_access(),
            SearchDirection::Backward => self.backward_access(),
        }
    }

    /// Speed in the orientation of this view.
    #[inline]
    pub fn speed_kmh(&self) -> f64 {
        let attrs = &self.edge.attributes;
        if self.reverse {
            attrs.reverse_speed_kmh.unwrap_or(attrs.speed_kmh)
        } else {
            attrs.speed_kmh
        }
    }

    #[inline]
    pub fn shortcut(&self) -> Option<&'g Shortcut> {
        self.edge.shortcut.as_ref()
    }

    #[inline]
    pub fn is_shortcut(&self) -> bool {
        self.edge.shortcut.is_some()
    }

    /// First original edge driven when traversing this view.
    #[inline]
    pub fn first_original_edge(&self) -> EdgeId {
        self.edge.original_at(self.base)
    }

    /// Last original edge driven when traversing this view.
    #[inline]
    pub fn last_original_edge(&self) -> EdgeId {
        self.edge.original_at(self.adj)
    }
}

/// Contraction metadata: one level per node plus the core level.
///
/// Nodes at or above `core_level` were never contracted. All other levels
/// are distinct and follow the contraction order.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    levels: Vec<u32>,
    core_level: u32,
    core_nodes: usize,
}

impl Hierarchy {
    /// `core_level = None` means a full hierarchy without a core.
    pub fn new(levels: Vec<u32>, core_level: Option<u32>) -> Self {
        let core_level = core_level.unwrap_or(u32::MAX);
        let core_nodes = levels.iter().filter(|&&l| l >= core_level).count();
        Self {
            levels,
            core_level,
            core_nodes,
        }
    }

    #[inline]
    pub fn level(&self, node: NodeId) -> u32 {
        self.levels[node as usize]
    }

    #[inline]
    pub fn core_level(&self) -> u32 {
        self.core_level
    }

    #[inline]
    pub fn is_core_level(&self, level: u32) -> bool {
        level >= self.core_level
    }

    #[inline]
    pub fn is_core(&self, node: NodeId) -> bool {
        self.is_core_level(self.level(node))
    }

    pub fn core_node_count(&self) -> usize {
        self.core_nodes
    }

    pub fn has_core(&self) -> bool {
        self.core_nodes > 0
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("node {node} out of range (graph has {n_nodes} nodes)")]
    NodeOutOfRange { node: NodeId, n_nodes: u32 },

    #[error("edge {edge}: distance {distance} must be finite and non-negative")]
    InvalidDistance { edge: EdgeId, distance: f64 },

    #[error("edge {edge}: speed {speed_kmh} km/h must be finite and positive")]
    InvalidSpeed { edge: EdgeId, speed_kmh: f64 },

    #[error("shortcut {edge}: {reason}")]
    InvalidShortcut { edge: EdgeId, reason: String },

    #[error("hierarchy has {levels} levels for {n_nodes} nodes")]
    LevelCountMismatch { levels: usize, n_nodes: u32 },
}

/// Immutable contracted graph with CSR incidence lists.
#[derive(Debug, Clone)]
pub struct RoutingGraph {
    n_nodes: u32,
    edges: Vec<Edge>,
    // incident[offsets[n]..offsets[n+1]] = edges touching n
    offsets: Vec<u64>,
    incident: Vec<EdgeId>,
    hierarchy: Option<Hierarchy>,
    n_shortcuts: usize,
}

impl RoutingGraph {
    #[inline]
    pub fn node_count(&self) -> usize {
        self.n_nodes as usize
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn shortcut_count(&self) -> usize {
        self.n_shortcuts
    }

    #[inline]
    pub fn contains_node(&self, node: NodeId) -> bool {
        node < self.n_nodes
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id as usize)
    }

    /// View of `id` oriented away from `from`, or `None` if `from` is not an
    /// endpoint of that edge.
    pub fn edge_view(&self, id: EdgeId, from: NodeId) -> Option<EdgeView<'_>> {
        let edge = self.edges.get(id as usize)?;
        if edge.base == from {
            Some(EdgeView {
                id,
                base: from,
                adj: edge.adj,
                reverse: false,
                edge,
            })
        } else if edge.adj == from {
            Some(EdgeView {
                id,
                base: from,
                adj: edge.base,
                reverse: true,
                edge,
            })
        } else {
            None
        }
    }

    /// All edges incident to `node`, each oriented away from it.
    pub fn edges_from(&self, node: NodeId) -> impl Iterator<Item = EdgeView<'_>> + '_ {
        let n = node as usize;
        let range = if node < self.n_nodes {
            self.offsets[n] as usize..self.offsets[n + 1] as usize
        } else {
            0..0
        };
        self.incident[range].iter().map(move |&id| {
            let edge = &self.edges[id as usize];
            let reverse = edge.base != node;
            EdgeView {
                id,
                base: node,
                adj: if reverse { edge.base } else { edge.adj },
                reverse,
                edge,
            }
        })
    }

    #[inline]
    pub fn hierarchy(&self) -> Option<&Hierarchy> {
        self.hierarchy.as_ref()
    }

    #[inline]
    pub fn is_core(&self, node: NodeId) -> bool {
        self.hierarchy.as_ref().is_some_and(|h| h.is_core(node))
    }

    /// Expand `view` into the original edges it stands for, in driving order.
    pub fn unpack_into<'g>(&'g self, view: EdgeView<'g>, out: &mut Vec<EdgeView<'g>>) -> bool {
        let Some(sc) = view.shortcut() else {
            out.push(view);
            return true;
        };
        let (a, b) = if view.reverse {
            (sc.second, sc.first)
        } else {
            (sc.first, sc.second)
        };
        match (self.edge_view(a, view.base), self.edge_view(b, sc.via)) {
            (Some(va), Some(vb)) => self.unpack_into(va, out) && self.unpack_into(vb, out),
            _ => false,
        }
    }
}

/// Assembles a [`RoutingGraph`]; validates ids and shortcut structure.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    n_nodes: u32,
    edges: Vec<Edge>,
    levels: Option<(Vec<u32>, Option<u32>)>,
    error: Option<GraphError>,
}

impl GraphBuilder {
    pub fn new(n_nodes: u32) -> Self {
        Self {
            n_nodes,
            ..Default::default()
        }
    }

    fn check_node(&self, node: NodeId) -> Result<(), GraphError> {
        if node < self.n_nodes {
            Ok(())
        } else {
            Err(GraphError::NodeOutOfRange {
                node,
                n_nodes: self.n_nodes,
            })
        }
    }

    /// Add an original edge. Distance in meters.
    pub fn add_edge(
        &mut self,
        base: NodeId,
        adj: NodeId,
        distance: f64,
        access: EdgeAccess,
        attributes: EdgeAttributes,
    ) -> Result<EdgeId, GraphError> {
        self.check_node(base)?;
        self.check_node(adj)?;
        let id = self.edges.len() as EdgeId;
        if !distance.is_finite() || distance < 0.0 {
            return Err(GraphError::InvalidDistance { edge: id, distance });
        }
        for speed_kmh in std::iter::once(attributes.speed_kmh).chain(attributes.reverse_speed_kmh) {
            if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
                return Err(GraphError::InvalidSpeed { edge: id, speed_kmh });
            }
        }
        let (forward, backward) = access.flags();
        self.edges.push(Edge {
            base,
            adj,
            distance,
            forward,
            backward,
            attributes,
            shortcut: None,
            orig_at_base: id,
            orig_at_adj: id,
        });
        Ok(id)
    }

    /// Add a shortcut `base -> adj` over `via`.
    pub fn add_shortcut(
        &mut self,
        base: NodeId,
        adj: NodeId,
        access: EdgeAccess,
        via: NodeId,
        first: EdgeId,
        second: EdgeId,
        weight: f64,
    ) -> Result<EdgeId, GraphError> {
        self.check_node(base)?;
        self.check_node(adj)?;
        self.check_node(via)?;
        let id = self.edges.len() as EdgeId;
        let invalid = |reason: &str| GraphError::InvalidShortcut {
            edge: id,
            reason: reason.to_string(),
        };

        let (Some(e1), Some(e2)) = (self.edges.get(first as usize), self.edges.get(second as usize))
        else {
            return Err(invalid("child edge must be added before the shortcut"));
        };
        if !e1.connects(base, via) {
            return Err(invalid("first child does not connect base and via"));
        }
        if !e2.connects(via, adj) {
            return Err(invalid("second child does not connect via and adj"));
        }
        if weight.is_nan() || weight < 0.0 {
            return Err(invalid("weight must be non-negative"));
        }

        let distance = e1.distance + e2.distance;
        let orig_at_base = e1.original_at(base);
        let orig_at_adj = e2.original_at(adj);
        let (forward, backward) = access.flags();
        self.edges.push(Edge {
            base,
            adj,
            distance,
            forward,
            backward,
            attributes: EdgeAttributes::default(),
            shortcut: Some(Shortcut {
                via,
                first,
                second,
                weight,
            }),
            orig_at_base,
            orig_at_adj,
        });
        Ok(id)
    }

    /// Attach contraction levels. `core_level = None` means no core.
    pub fn set_hierarchy(&mut self, levels: Vec<u32>, core_level: Option<u32>) -> &mut Self {
        if levels.len() != self.n_nodes as usize {
            self.error = Some(GraphError::LevelCountMismatch {
                levels: levels.len(),
                n_nodes: self.n_nodes,
            });
        }
        self.levels = Some((levels, core_level));
        self
    }

    pub fn build(self) -> Result<RoutingGraph, GraphError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let n = self.n_nodes as usize;

        // Pass 1: degrees (self-loops listed once)
        let mut offsets = vec![0u64; n + 1];
        for edge in &self.edges {
            offsets[edge.base as usize + 1] += 1;
            if edge.adj != edge.base {
                offsets[edge.adj as usize + 1] += 1;
            }
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }

        // Pass 2: fill, preserving edge insertion order per node
        let mut incident = vec![0 as EdgeId; offsets[n] as usize];
        let mut cursor: Vec<u64> = offsets[..n].to_vec();
        for (id, edge) in self.edges.iter().enumerate() {
            let b = edge.base as usize;
            incident[cursor[b] as usize] = id as EdgeId;
            cursor[b] += 1;
            if edge.adj != edge.base {
                let a = edge.adj as usize;
                incident[cursor[a] as usize] = id as EdgeId;
                cursor[a] += 1;
            }
        }

        let n_shortcuts = self.edges.iter().filter(|e| e.shortcut.is_some()).count();
        let hierarchy = self
            .levels
            .map(|(levels, core_level)| Hierarchy::new(levels, core_level));

        Ok(RoutingGraph {
            n_nodes: self.n_nodes,
            edges: self.edges,
            offsets,
            incident,
            hierarchy,
            n_shortcuts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> RoutingGraph {
        // 0 -> 1 one-way, 1 - 2 both ways, shortcut 0 -> 2 via 1
        let mut b = GraphBuilder::new(3);
        let e0 = b
            .add_edge(0, 1, 100.0, EdgeAccess::Forward, EdgeAttributes::default())
            .unwrap();
        let e1 = b
            .add_edge(2, 1, 50.0, EdgeAccess::Both, EdgeAttributes::default())
            .unwrap();
        b.add_shortcut(0, 2, EdgeAccess::Forward, 1, e0, e1, 150.0)
            .unwrap();
        b.set_hierarchy(vec![0, 1, 2], None);
        b.build().unwrap()
    }

    #[test]
    fn test_views_are_oriented_away_from_node() {
        let g = triangle();
        let from1: Vec<_> = g.edges_from(1).collect();
        assert_eq!(from1.len(), 2);
        assert!(from1.iter().all(|v| v.base == 1));

        let back = g.edge_view(0, 1).unwrap();
        assert_eq!(back.adj, 0);
        assert!(back.reverse);
        assert!(!back.forward_access());
        assert!(back.backward_access());
        assert!(g.edge_view(0, 2).is_none());
    }

    #[test]
    fn test_shortcut_unpacks_in_driving_order() {
        let g = triangle();
        let sc = g.edge_view(2, 0).unwrap();
        assert!(sc.is_shortcut());
        assert_eq!(sc.distance(), 150.0);
        assert_eq!(sc.first_original_edge(), 0);
        assert_eq!(sc.last_original_edge(), 1);

        let mut out = Vec::new();
        assert!(g.unpack_into(sc, &mut out));
        let path: Vec<_> = out.iter().map(|v| (v.base, v.adj)).collect();
        assert_eq!(path, vec![(0, 1), (1, 2)]);

        out.clear();
        let rev = g.edge_view(2, 2).unwrap();
        assert!(g.unpack_into(rev, &mut out));
        let path: Vec<_> = out.iter().map(|v| (v.base, v.adj)).collect();
        assert_eq!(path, vec![(2, 1), (1, 0)]);
    }

    #[test]
    fn test_shortcut_validation() {
        let mut b = GraphBuilder::new(3);
        let e0 = b
            .add_edge(0, 1, 1.0, EdgeAccess::Both, EdgeAttributes::default())
            .unwrap();
        let err = b.add_shortcut(0, 2, EdgeAccess::Both, 1, e0, 7, 1.0);
        assert!(matches!(err, Err(GraphError::InvalidShortcut { .. })));
        assert!(matches!(
            b.add_edge(0, 9, 1.0, EdgeAccess::Both, EdgeAttributes::default()),
            Err(GraphError::NodeOutOfRange { node: 9, .. })
        ));
    }

    #[test]
    fn test_non_positive_speed_rejected() {
        let mut b = GraphBuilder::new(2);
        let parked = EdgeAttributes {
            speed_kmh: 0.0,
            ..Default::default()
        };
        assert_eq!(
            b.add_edge(0, 1, 1.0, EdgeAccess::Both, parked),
            Err(GraphError::InvalidSpeed {
                edge: 0,
                speed_kmh: 0.0
            })
        );
        let bad_reverse = EdgeAttributes {
            reverse_speed_kmh: Some(f64::NAN),
            ..Default::default()
        };
        assert!(matches!(
            b.add_edge(0, 1, 1.0, EdgeAccess::Both, bad_reverse),
            Err(GraphError::InvalidSpeed { edge: 0, .. })
        ));
        assert!(b
            .add_edge(0, 1, 1.0, EdgeAccess::Both, EdgeAttributes::default())
            .is_ok());
    }

    #[test]
    fn test_level_mismatch_rejected_on_build() {
        let mut b = GraphBuilder::new(3);
        b.set_hierarchy(vec![0, 1], None);
        assert!(matches!(
            b.build(),
            Err(GraphError::LevelCountMismatch { levels: 2, n_nodes: 3 })
        ));
    }

    #[test]
    fn test_core_detection() {
        let h = Hierarchy::new(vec![0, 3, 3, 1], Some(3));
        assert!(h.has_core());
        assert_eq!(h.core_node_count(), 2);
        assert!(h.is_core(1));
        assert!(!h.is_core(3));

        let no_core = Hierarchy::new(vec![0, 1, 2], None);
        assert!(!no_core.has_core());
    }
}
