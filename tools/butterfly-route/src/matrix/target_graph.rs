//! Target graph construction
//!
//! Walks from every destination against travel direction, climbing the
//! hierarchy (lowest level first) until it hits the core. Every edge it
//! climbs is stored downward, `upper -> lower`, so the last search phase
//! can descend from any reached node to the destinations without touching
//! the rest of the graph. Core nodes met on the way are recorded as core
//! exit points and are not expanded.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use rustc_hash::{FxHashMap, FxHashSet};

use super::error::{MatrixError, Result};
use crate::filters::{BoundaryFilter, EdgeFilter, SearchDirection};
use crate::graph::{EdgeId, NodeId, RoutingGraph};

/// Request-scoped adjacency over the nodes that lead down to a destination.
#[derive(Debug, Clone, Default)]
pub struct SubGraph {
    links: FxHashMap<NodeId, Vec<(EdgeId, NodeId)>>,
    n_edges: usize,
}

impl SubGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `node` was not present before.
    pub fn add_node(&mut self, node: NodeId) -> bool {
        if self.links.contains_key(&node) {
            return false;
        }
        self.links.insert(node, Vec::new());
        true
    }

    /// Store `upper -> lower` over `edge`. Returns true if `upper` is new.
    pub fn add_downward_edge(&mut self, upper: NodeId, edge: EdgeId, lower: NodeId) -> bool {
        self.add_node(lower);
        let is_new = !self.links.contains_key(&upper);
        let links = self.links.entry(upper).or_default();
        if !links.iter().any(|&(e, n)| e == edge && n == lower) {
            links.push((edge, lower));
            self.n_edges += 1;
        }
        is_new
    }

    #[inline]
    pub fn contains(&self, node: NodeId) -> bool {
        self.links.contains_key(&node)
    }

    /// Downward links of `node`, empty if unknown.
    #[inline]
    pub fn links(&self, node: NodeId) -> &[(EdgeId, NodeId)] {
        self.links.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.links.len()
    }

    pub fn edge_count(&self) -> usize {
        self.n_edges
    }
}

/// Output of the builder; immutable once handed to the search.
#[derive(Debug, Clone)]
pub struct TargetGraph {
    pub sub_graph: SubGraph,
    /// Ordered for deterministic seeding
    pub core_exit_points: BTreeSet<NodeId>,
    /// Resolved destinations, deduplicated
    pub targets: Vec<NodeId>,
    /// Destination indices that were unresolved
    pub unresolved: Vec<usize>,
}

impl TargetGraph {
    pub fn is_target(&self, node: NodeId) -> bool {
        self.targets.binary_search(&node).is_ok()
    }
}

pub struct TargetGraphBuilder<'g> {
    graph: &'g RoutingGraph,
}

impl<'g> TargetGraphBuilder<'g> {
    pub fn new(graph: &'g RoutingGraph) -> Self {
        Self { graph }
    }

    pub fn prepare(&self, destinations: &[Option<NodeId>]) -> Result<TargetGraph> {
        let hierarchy = self.graph.hierarchy().ok_or_else(|| {
            MatrixError::Configuration(
                "target graph needs a graph with contraction levels".to_string(),
            )
        })?;
        let filter = BoundaryFilter::new(hierarchy);

        let mut sub_graph = SubGraph::new();
        let mut core_exit_points = BTreeSet::new();
        let mut unresolved = Vec::new();
        let mut targets = Vec::new();
        let mut seen_targets = FxHashSet::default();
        let mut queue: BinaryHeap<Reverse<(u32, NodeId)>> = BinaryHeap::new();

        for (idx, dest) in destinations.iter().enumerate() {
            let Some(node) = *dest else {
                unresolved.push(idx);
                continue;
            };
            if !self.graph.contains_node(node) {
                return Err(MatrixError::InvalidRequest(format!(
                    "destination {idx} refers to node {node} outside the graph"
                )));
            }
            if !seen_targets.insert(node) {
                continue;
            }
            targets.push(node);
            sub_graph.add_node(node);
            if hierarchy.is_core(node) {
                core_exit_points.insert(node);
            } else {
                queue.push(Reverse((hierarchy.level(node), node)));
            }
        }
        targets.sort_unstable();

        while let Some(Reverse((_, node))) = queue.pop() {
            for edge in self.graph.edges_from(node) {
                if !filter.accept(&edge, SearchDirection::Backward) {
                    continue;
                }
                let upper = edge.adj;
                let is_new = sub_graph.add_downward_edge(upper, edge.id, node);
                if hierarchy.is_core(upper) {
                    core_exit_points.insert(upper);
                } else if is_new {
                    queue.push(Reverse((hierarchy.level(upper), upper)));
                }
            }
        }

        tracing::debug!(
            targets = targets.len(),
            unresolved = unresolved.len(),
            nodes = sub_graph.node_count(),
            edges = sub_graph.edge_count(),
            core_exit_points = core_exit_points.len(),
            "target graph prepared"
        );

        Ok(TargetGraph {
            sub_graph,
            core_exit_points,
            targets,
            unresolved,
        })
    }
}
