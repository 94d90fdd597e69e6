//! Level-based filters for the contracted hierarchy

use super::{EdgeFilter, EdgeFilterChain, SearchDirection};
use crate::graph::{EdgeId, EdgeView, Hierarchy, RoutingGraph};

/// Accepts edges that lead toward the core, or stay inside it.
///
/// From a non-core node the adjacent node must not rank lower. From a core
/// node only other core nodes qualify, since core levels are all equal and
/// the core is always passable. Access is checked in the search direction:
/// `Forward` for the upward search from sources, `Backward` for the
/// target-side walk that runs against travel direction.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryFilter<'g> {
    hierarchy: &'g Hierarchy,
}

impl<'g> BoundaryFilter<'g> {
    pub fn new(hierarchy: &'g Hierarchy) -> Self {
        Self { hierarchy }
    }

    #[inline]
    fn toward_core(&self, edge: &EdgeView<'_>) -> bool {
        if edge.base == edge.adj {
            return false;
        }
        let base_level = self.hierarchy.level(edge.base);
        let adj_level = self.hierarchy.level(edge.adj);
        if self.hierarchy.is_core_level(base_level) {
            self.hierarchy.is_core_level(adj_level)
        } else {
            adj_level >= base_level
        }
    }
}

impl EdgeFilter for BoundaryFilter<'_> {
    #[inline]
    fn accept(&self, edge: &EdgeView<'_>, direction: SearchDirection) -> bool {
        edge.accessible(direction) && self.toward_core(edge)
    }
}

/// Phase switch for the hierarchy-restricted search.
///
/// Outside the core it behaves as [`BoundaryFilter`]. Inside the core it
/// accepts only core-to-core edges, and those must also pass the domain
/// restrictions. The mode flag is the only mutable state; each computation
/// owns its instance.
pub struct CoreMatrixFilter<'g, 'r> {
    boundary: BoundaryFilter<'g>,
    hierarchy: &'g Hierarchy,
    restrictions: &'r EdgeFilterChain,
    in_core: bool,
}

impl<'g, 'r> CoreMatrixFilter<'g, 'r> {
    pub fn new(hierarchy: &'g Hierarchy, restrictions: &'r EdgeFilterChain) -> Self {
        Self {
            boundary: BoundaryFilter::new(hierarchy),
            hierarchy,
            restrictions,
            in_core: false,
        }
    }

    pub fn set_in_core(&mut self, in_core: bool) {
        self.in_core = in_core;
    }

    pub fn in_core(&self) -> bool {
        self.in_core
    }
}

impl EdgeFilter for CoreMatrixFilter<'_, '_> {
    #[inline]
    fn accept(&self, edge: &EdgeView<'_>, direction: SearchDirection) -> bool {
        if !self.in_core {
            return self.boundary.accept(edge, direction);
        }
        edge.base != edge.adj
            && self.hierarchy.is_core(edge.base)
            && self.hierarchy.is_core(edge.adj)
            && edge.accessible(direction)
            && self.restrictions.accept(edge, direction)
    }
}

/// Whether `restrictions` reject only core-to-core original edges.
///
/// [`CoreMatrixFilter`] enforces restrictions inside the core alone, so a
/// hierarchy-restricted search is exact only when this holds. Shortcuts are
/// not checked: every shortcut bypasses a contracted node, so its original
/// edges are never core-to-core and are covered by the scan. Without a
/// hierarchy nothing is core and any rejected edge fails the check.
pub fn restrictions_confined_to_core(graph: &RoutingGraph, restrictions: &EdgeFilterChain) -> bool {
    if restrictions.is_empty() {
        return true;
    }
    (0..graph.edge_count() as EdgeId)
        .filter_map(|id| {
            let edge = graph.edge(id)?;
            if edge.shortcut.is_some() || (graph.is_core(edge.base) && graph.is_core(edge.adj)) {
                return None;
            }
            graph.edge_view(id, edge.base)
        })
        .all(|view| {
            restrictions.accept(&view, SearchDirection::Forward)
                && restrictions.accept(&view, SearchDirection::Backward)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{AvoidFeature, AvoidFeaturesFilter};
    use crate::graph::{EdgeAccess, EdgeAttributes, EdgeFlags, GraphBuilder, RoutingGraph};

    // 0 (level 0) -> 1 (level 1) -> 2 (core) - 3 (core, toll)
    fn small_core() -> RoutingGraph {
        let mut b = GraphBuilder::new(4);
        let toll = EdgeAttributes {
            flags: EdgeFlags::TOLL,
            ..Default::default()
        };
        b.add_edge(0, 1, 1.0, EdgeAccess::Forward, EdgeAttributes::default())
            .unwrap();
        b.add_edge(1, 2, 1.0, EdgeAccess::Both, EdgeAttributes::default())
            .unwrap();
        b.add_edge(2, 3, 1.0, EdgeAccess::Both, toll).unwrap();
        b.set_hierarchy(vec![0, 1, 2, 2], Some(2));
        b.build().unwrap()
    }

    #[test]
    fn test_boundary_upward_and_downward() {
        let g = small_core();
        let filter = BoundaryFilter::new(g.hierarchy().unwrap());

        let up = g.edge_view(0, 0).unwrap();
        assert!(filter.accept(&up, SearchDirection::Forward));
        // one-way 0 -> 1 cannot be walked backward from 0
        assert!(!filter.accept(&up, SearchDirection::Backward));

        let down = g.edge_view(0, 1).unwrap();
        assert!(!filter.accept(&down, SearchDirection::Forward));

        // from core node 2, only core neighbours
        let core_to_non_core = g.edge_view(1, 2).unwrap();
        assert!(!filter.accept(&core_to_non_core, SearchDirection::Forward));
        let within_core = g.edge_view(2, 2).unwrap();
        assert!(filter.accept(&within_core, SearchDirection::Forward));
    }

    #[test]
    fn test_core_mode_applies_restrictions() {
        let g = small_core();
        let restrictions =
            EdgeFilterChain::new().with(AvoidFeaturesFilter::new(&[AvoidFeature::Tollways]));
        let mut filter = CoreMatrixFilter::new(g.hierarchy().unwrap(), &restrictions);

        let toll = g.edge_view(2, 2).unwrap();
        let entry = g.edge_view(1, 1).unwrap();
        assert!(!filter.in_core());
        assert!(filter.accept(&toll, SearchDirection::Forward));
        assert!(filter.accept(&entry, SearchDirection::Forward));

        filter.set_in_core(true);
        assert!(!filter.accept(&toll, SearchDirection::Forward));
        // 1 is not a core node
        assert!(!filter.accept(&entry, SearchDirection::Forward));
    }

    #[test]
    fn test_restrictions_confined_to_core() {
        let g = small_core();
        let no_tolls =
            EdgeFilterChain::new().with(AvoidFeaturesFilter::new(&[AvoidFeature::Tollways]));
        // the toll road 2 - 3 joins two core nodes
        assert!(restrictions_confined_to_core(&g, &no_tolls));
        assert!(restrictions_confined_to_core(&g, &EdgeFilterChain::new()));

        let short_only = EdgeFilterChain::new().with(|e: &EdgeView<'_>, _: SearchDirection| {
            e.base == 2 || e.adj == 2
        });
        // rejects 0 -> 1, which climbs toward the core
        assert!(!restrictions_confined_to_core(&g, &short_only));

        // toll road on the ascent 0 - 1 of a line with core {3, 4}
        let mut b = GraphBuilder::new(5);
        let toll = EdgeAttributes {
            flags: EdgeFlags::TOLL,
            ..Default::default()
        };
        b.add_edge(0, 1, 10.0, EdgeAccess::Both, toll).unwrap();
        for n in 1..4 {
            b.add_edge(n, n + 1, 10.0, EdgeAccess::Both, EdgeAttributes::default())
                .unwrap();
        }
        b.set_hierarchy(vec![0, 1, 2, 3, 3], Some(3));
        let line = b.build().unwrap();
        assert!(!restrictions_confined_to_core(&line, &no_tolls));
    }
}
