//! General multi-tree Dijkstra
//!
//! One queue drives every source tree over the original edges, ignoring the
//! hierarchy. Shortcuts are skipped: they only repeat paths the original
//! edges already offer, and their own metadata would hide restricted edges
//! and turns inside them. Used when the graph has no contraction metadata,
//! or when the restriction set cannot be honoured by a precomputed hierarchy.

use std::ops::ControlFlow;

use super::error::{MatrixError, Result};
use super::multi_tree::{
    drain, GoalTracker, MultiTreeArena, MultiTreeSearch, Relaxer, SearchQueue, SearchStats,
    VisitBudget,
};
use crate::filters::{EdgeFilter, EdgeFilterChain, SearchDirection};
use crate::graph::{NodeId, RoutingGraph};
use crate::weighting::Weighting;

pub struct DijkstraManyToMany<'a> {
    graph: &'a RoutingGraph,
    weighting: &'a dyn Weighting,
    restrictions: &'a EdgeFilterChain,
    max_visited_nodes: usize,
}

impl<'a> DijkstraManyToMany<'a> {
    pub fn new(
        graph: &'a RoutingGraph,
        weighting: &'a dyn Weighting,
        restrictions: &'a EdgeFilterChain,
        max_visited_nodes: usize,
    ) -> Self {
        Self {
            graph,
            weighting,
            restrictions,
            max_visited_nodes,
        }
    }

    /// Grow one tree per source until no destination can improve.
    pub fn calc_paths(
        &self,
        sources: &[Option<NodeId>],
        destinations: &[Option<NodeId>],
    ) -> Result<MultiTreeSearch> {
        check_nodes(self.graph, sources, "source")?;
        check_nodes(self.graph, destinations, "destination")?;

        let mut arena = MultiTreeArena::for_weighting(sources.len(), self.weighting);
        let mut queue = SearchQueue::new();
        let mut budget = VisitBudget::new(self.max_visited_nodes);
        let relaxer = Relaxer::new(self.weighting);

        let goal_nodes: Vec<NodeId> = destinations.iter().flatten().copied().collect();
        let mut goals = GoalTracker::new(&goal_nodes, sources.len());

        for (tree, source) in sources.iter().enumerate() {
            if let Some(node) = *source {
                let slot = arena.seed(node, tree);
                queue.push(slot, &arena);
                goals.record(node, slot, tree, 0.0);
            }
        }

        let mut stats = SearchStats::default();
        if goal_nodes.is_empty() {
            return Ok(MultiTreeSearch { arena, stats });
        }

        let graph = self.graph;
        let restrictions = self.restrictions;
        let drained = drain(&mut arena, &mut queue, &mut budget, |arena, queue, slot| {
            let node = arena.node(slot);
            for edge in graph.edges_from(node) {
                if edge.adj == node
                    || edge.is_shortcut()
                    || !edge.forward_access()
                    || !restrictions.accept(&edge, SearchDirection::Forward)
                {
                    continue;
                }
                let adj = edge.adj;
                let next = relaxer.relax(arena, slot, &edge, |s, tree, weight| {
                    goals.record(adj, s, tree, weight)
                });
                if let Some(next) = next {
                    queue.push(next, arena);
                }
            }
            if goals.is_goal(node) && !goals.can_improve(arena, queue) {
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })?;

        stats.dijkstra_visited = drained.settled;
        stats.reopened = drained.reopened;
        tracing::debug!(
            trees = sources.len(),
            goals = goal_nodes.len(),
            visited = budget.visited(),
            reopened = drained.reopened,
            entries = arena.len(),
            "multi-tree dijkstra finished"
        );

        Ok(MultiTreeSearch { arena, stats })
    }
}

pub(crate) fn check_nodes(graph: &RoutingGraph, nodes: &[Option<NodeId>], role: &str) -> Result<()> {
    for (idx, node) in nodes.iter().enumerate() {
        if let Some(node) = *node {
            if !graph.contains_node(node) {
                return Err(MatrixError::InvalidRequest(format!(
                    "{role} {idx} refers to node {node} outside the graph"
                )));
            }
        }
    }
    Ok(())
}
