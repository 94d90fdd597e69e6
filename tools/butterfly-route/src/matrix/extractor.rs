//! Metrics extraction
//!
//! Walks each reached tree from the destination entry back to its source
//! and sums the requested metrics along the way. Shortcuts are expanded to
//! original edges for distance and duration; the weight metric uses the
//! same traversal cost as the search, turn costs included. A walked weight
//! that disagrees with the label the search settled on is an internal error,
//! never a table value.

use butterfly_common::DistanceUnit;
use rustc_hash::FxHashMap;

use super::error::{MatrixError, Result};
use super::multi_tree::{MultiTreeArena, MultiTreeSearch, Slot};
use super::types::{CellMetrics, MatrixLocations, MatrixTables};
use crate::graph::{EdgeId, EdgeView, NodeId, RoutingGraph};
use crate::weighting::{traversal_weight, Weighting};

/// Relative tolerance between a walked weight and the search label.
const WEIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default)]
struct UnpackedMetrics {
    distance: f64,
    duration: f64,
}

pub struct MetricsExtractor<'a> {
    graph: &'a RoutingGraph,
    weighting: &'a dyn Weighting,
    units: DistanceUnit,
}

impl<'a> MetricsExtractor<'a> {
    pub fn new(graph: &'a RoutingGraph, weighting: &'a dyn Weighting, units: DistanceUnit) -> Self {
        Self {
            graph,
            weighting,
            units,
        }
    }

    /// Fill `tables` for every reached pair. Tables must come from
    /// [`MatrixTables::allocate`]; unreached cells keep the sentinel.
    pub fn extract(
        &self,
        search: &MultiTreeSearch,
        sources: &MatrixLocations,
        destinations: &MatrixLocations,
        tables: &mut MatrixTables,
    ) -> Result<()> {
        let arena = &search.arena;
        if arena.n_trees() != sources.len() {
            return Err(MatrixError::Internal(format!(
                "search has {} trees for {} sources",
                arena.n_trees(),
                sources.len()
            )));
        }

        let mut walker = ChainWalker {
            extractor: self,
            arena,
            shortcut_cache: FxHashMap::default(),
            scratch: Vec::new(),
            // Each settled entry appears at most once per chain
            step_cap: arena.len() + 1,
        };

        for (dst_idx, destination) in destinations.nodes().iter().enumerate() {
            for (tree, source) in sources.nodes().iter().enumerate() {
                let Some(source) = *source else {
                    continue;
                };
                let Some(terminal) = search.terminal(*destination, tree) else {
                    continue;
                };
                let mut cell = walker.walk(terminal, tree, source)?;
                cell.distance = self.units.from_meters(cell.distance);
                tables.write(tree, dst_idx, cell);
            }
        }
        Ok(())
    }
}

struct ChainWalker<'e, 'a> {
    extractor: &'e MetricsExtractor<'a>,
    arena: &'e MultiTreeArena,
    shortcut_cache: FxHashMap<(EdgeId, bool), UnpackedMetrics>,
    scratch: Vec<EdgeView<'a>>,
    step_cap: usize,
}

impl<'e, 'a> ChainWalker<'e, 'a> {
    fn walk(&mut self, terminal: Slot, tree: usize, source: NodeId) -> Result<CellMetrics> {
        let graph = self.extractor.graph;
        let mut acc = CellMetrics::ZERO;
        let mut slot = terminal;
        let mut steps = 0usize;

        while let Some(parent) = self.arena.item(slot, tree).parent {
            steps += 1;
            if steps > self.step_cap {
                return Err(MatrixError::Internal(format!(
                    "parent chain of tree {tree} exceeds {} steps",
                    self.step_cap
                )));
            }
            let item = *self.arena.item(slot, tree);
            // Turn context as the parent holds it now, not as it was when
            // this item was relaxed
            let incoming = self.arena.item(parent, tree).original_edge;
            let edge_id = item.edge.ok_or_else(|| {
                MatrixError::Internal(format!("tree {tree} has a parent but no edge"))
            })?;
            let from = self.arena.node(parent);
            let to = self.arena.node(slot);
            let view = graph
                .edge_view(edge_id, from)
                .filter(|v| v.adj == to)
                .ok_or_else(|| {
                    MatrixError::Internal(format!("edge {edge_id} does not join {from} and {to}"))
                })?;

            acc.weight += traversal_weight(self.extractor.weighting, &view, incoming);
            let unpacked = self.unpacked(view)?;
            acc.distance += unpacked.distance;
            acc.duration += unpacked.duration;
            slot = parent;
        }

        let root = self.arena.node(slot);
        if root != source {
            return Err(MatrixError::Internal(format!(
                "tree {tree} ends at node {root}, expected source {source}"
            )));
        }
        let label = self.arena.item(terminal, tree).weight;
        if (acc.weight - label).abs() > WEIGHT_TOLERANCE * label.abs().max(1.0) {
            return Err(MatrixError::Internal(format!(
                "tree {tree} walks a weight of {} to node {}, the search settled on {label}",
                acc.weight,
                self.arena.node(terminal)
            )));
        }
        Ok(acc)
    }

    fn unpacked(&mut self, view: EdgeView<'a>) -> Result<UnpackedMetrics> {
        let weighting = self.extractor.weighting;
        if !view.is_shortcut() {
            return Ok(UnpackedMetrics {
                distance: view.distance(),
                duration: weighting.edge_duration(&view),
            });
        }
        let key = (view.id, view.reverse);
        if let Some(&cached) = self.shortcut_cache.get(&key) {
            return Ok(cached);
        }

        self.scratch.clear();
        if !self.extractor.graph.unpack_into(view, &mut self.scratch) {
            return Err(MatrixError::Internal(format!(
                "shortcut {} cannot be unpacked",
                view.id
            )));
        }
        let metrics = self
            .scratch
            .iter()
            .fold(UnpackedMetrics::default(), |acc, e| UnpackedMetrics {
                distance: acc.distance + e.distance(),
                duration: acc.duration + weighting.edge_duration(e),
            });
        self.shortcut_cache.insert(key, metrics);
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeAccess, EdgeAttributes, GraphBuilder};
    use crate::matrix::multi_tree::{SearchStats, TreeItem};
    use crate::matrix::types::{MatrixMetrics, UNREACHABLE};
    use crate::weighting::FastestWeighting;

    // 0 -> 1 -> 2 at 36 km/h (100 m each = 10 s), shortcut 0 -> 2 via 1
    fn graph() -> RoutingGraph {
        let mut b = GraphBuilder::new(3);
        let a = EdgeAttributes {
            speed_kmh: 36.0,
            ..Default::default()
        };
        let e0 = b.add_edge(0, 1, 100.0, EdgeAccess::Both, a).unwrap();
        let e1 = b.add_edge(1, 2, 100.0, EdgeAccess::Both, a).unwrap();
        b.add_shortcut(0, 2, EdgeAccess::Both, 1, e0, e1, 20.0)
            .unwrap();
        b.set_hierarchy(vec![0, 1, 2], None);
        b.build().unwrap()
    }

    fn search_over_shortcut() -> MultiTreeSearch {
        let mut arena = MultiTreeArena::new(2);
        let root = arena.seed(0, 0);
        let end = arena.get_or_insert(2);
        *arena.item_mut(end, 0) = TreeItem {
            weight: 20.0,
            edge: Some(2),
            original_edge: Some(1),
            parent: Some(root),
            updated: false,
        };
        MultiTreeSearch {
            arena,
            stats: SearchStats::default(),
        }
    }

    #[test]
    fn test_shortcut_metrics_are_unpacked() {
        let g = graph();
        let weighting = FastestWeighting::default();
        let extractor = MetricsExtractor::new(&g, &weighting, DistanceUnit::Kilometers);
        let sources = MatrixLocations::from_node_ids(&[0, -1]).unwrap();
        let destinations = MatrixLocations::from_node_ids(&[2, 1]).unwrap();
        let mut tables = MatrixTables::allocate(2, 2, MatrixMetrics::ALL);

        extractor
            .extract(&search_over_shortcut(), &sources, &destinations, &mut tables)
            .unwrap();

        assert_eq!(tables.distances().unwrap(), &[0.2, UNREACHABLE, UNREACHABLE, UNREACHABLE]);
        assert_eq!(tables.durations().unwrap()[0], 20.0);
        assert_eq!(tables.weights().unwrap()[0], 20.0);
    }

    #[test]
    fn test_broken_chain_is_an_internal_error() {
        let g = graph();
        let weighting = FastestWeighting::default();
        let extractor = MetricsExtractor::new(&g, &weighting, DistanceUnit::Meters);

        let mut search = search_over_shortcut();
        // edge 0 joins 0 and 1, not 0 and 2
        let end = search.arena.slot(2).unwrap();
        search.arena.item_mut(end, 0).edge = Some(0);

        let sources = MatrixLocations::from_node_ids(&[0, -1]).unwrap();
        let destinations = MatrixLocations::from_node_ids(&[2]).unwrap();
        let mut tables = MatrixTables::allocate(2, 1, MatrixMetrics::DISTANCE);
        let err = extractor
            .extract(&search, &sources, &destinations, &mut tables)
            .unwrap_err();
        assert!(matches!(err, MatrixError::Internal(_)));
    }

    #[test]
    fn test_chain_disagreeing_with_label_is_an_internal_error() {
        let g = graph();
        let weighting = FastestWeighting::default();
        let extractor = MetricsExtractor::new(&g, &weighting, DistanceUnit::Meters);

        // the shortcut costs 20, the label claims 25
        let mut search = search_over_shortcut();
        let end = search.arena.slot(2).unwrap();
        search.arena.item_mut(end, 0).weight = 25.0;

        let sources = MatrixLocations::from_node_ids(&[0, -1]).unwrap();
        let destinations = MatrixLocations::from_node_ids(&[2]).unwrap();
        let mut tables = MatrixTables::allocate(2, 1, MatrixMetrics::DISTANCE);
        let err = extractor
            .extract(&search, &sources, &destinations, &mut tables)
            .unwrap_err();
        assert!(matches!(err, MatrixError::Internal(msg) if msg.contains("settled on 25")));
    }

    #[test]
    fn test_cyclic_chain_hits_step_cap() {
        let g = graph();
        let weighting = FastestWeighting::default();
        let extractor = MetricsExtractor::new(&g, &weighting, DistanceUnit::Meters);

        let mut arena = MultiTreeArena::new(1);
        let a = arena.get_or_insert(0);
        let b = arena.get_or_insert(1);
        for (slot, parent, weight) in [(a, b, 1.0), (b, a, 1.0)] {
            *arena.item_mut(slot, 0) = TreeItem {
                weight,
                edge: Some(0),
                original_edge: Some(0),
                    parent: Some(parent),
                updated: false,
            };
        }
        let search = MultiTreeSearch {
            arena,
            stats: SearchStats::default(),
        };
        let sources = MatrixLocations::from_node_ids(&[0]).unwrap();
        let destinations = MatrixLocations::from_node_ids(&[1]).unwrap();
        let mut tables = MatrixTables::allocate(1, 1, MatrixMetrics::DISTANCE);
        let err = extractor
            .extract(&search, &sources, &destinations, &mut tables)
            .unwrap_err();
        assert!(matches!(err, MatrixError::Internal(msg) if msg.contains("exceeds")));
    }
}
