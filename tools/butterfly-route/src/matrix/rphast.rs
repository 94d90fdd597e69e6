//! Hierarchy-restricted multi-tree search (RPHAST-style)
//!
//! The destination side is prepared once into a [`TargetGraph`]. Each source
//! batch then runs three phases over one shared arena:
//!
//! 1. **Upward selection**: from every source, relax only edges that climb
//!    the hierarchy. Core nodes are reached but not expanded; they become
//!    core entry points.
//! 2. **Inside core**: from the entry points, relax core-to-core edges with
//!    the domain restrictions active, until no core exit point can improve
//!    for any tree. With turn costs the core is drained completely: every
//!    arrival edge at an exit point may lead to a different descent.
//! 3. **Downward**: from every reached node of the target graph (exit points
//!    included), descend along target graph links only.
//!
//! The label of every destination is then final; every tree `i` holds
//! `min over m of up(s_i, m) + core(m..) + down(.., t)`.
//!
//! Phases 1 and 3 never consult restriction filters: shortcuts cannot be
//! filtered per edge, so restricted edges must live in the core (see
//! [`restrictions_confined_to_core`](crate::filters::restrictions_confined_to_core)).

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use super::dijkstra::check_nodes;
use super::error::{MatrixError, Result};
use super::multi_tree::{
    drain, GoalTracker, MultiTreeArena, MultiTreeSearch, Relaxer, SearchQueue, SearchStats,
    Slot, VisitBudget,
};
use super::target_graph::{TargetGraph, TargetGraphBuilder};
use crate::filters::{CoreMatrixFilter, EdgeFilter, EdgeFilterChain, SearchDirection};
use crate::graph::{Hierarchy, NodeId, RoutingGraph};
use crate::weighting::Weighting;

/// Prepared destination side, reusable across source batches and threads.
pub struct RphastEngine<'a> {
    graph: &'a RoutingGraph,
    hierarchy: &'a Hierarchy,
    weighting: &'a dyn Weighting,
    target_graph: TargetGraph,
    core_goals: Vec<NodeId>,
}

impl<'a> RphastEngine<'a> {
    pub fn prepare(
        graph: &'a RoutingGraph,
        weighting: &'a dyn Weighting,
        destinations: &[Option<NodeId>],
    ) -> Result<Self> {
        let hierarchy = graph.hierarchy().ok_or_else(|| {
            MatrixError::Configuration(
                "hierarchy-restricted search requested on a graph without contraction levels"
                    .to_string(),
            )
        })?;
        let target_graph = TargetGraphBuilder::new(graph).prepare(destinations)?;
        let core_goals = target_graph.core_exit_points.iter().copied().collect();
        Ok(Self {
            graph,
            hierarchy,
            weighting,
            target_graph,
            core_goals,
        })
    }

    pub fn target_graph(&self) -> &TargetGraph {
        &self.target_graph
    }

    /// Run one source batch against the prepared destinations.
    pub fn calc_paths(
        &self,
        sources: &[Option<NodeId>],
        restrictions: &EdgeFilterChain,
        max_visited_nodes: usize,
    ) -> Result<MultiTreeSearch> {
        check_nodes(self.graph, sources, "source")?;

        let mut arena = MultiTreeArena::for_weighting(sources.len(), self.weighting);
        let mut queue = SearchQueue::new();
        let mut budget = VisitBudget::new(max_visited_nodes);
        let mut filter = CoreMatrixFilter::new(self.hierarchy, restrictions);
        let relaxer = Relaxer::new(self.weighting);
        let mut stats = SearchStats::default();

        for (tree, source) in sources.iter().enumerate() {
            if let Some(node) = *source {
                let slot = arena.seed(node, tree);
                queue.push(slot, &arena);
            }
        }

        // Phase 1: upward selection
        let graph = self.graph;
        let hierarchy = self.hierarchy;
        let mut core_entries: BTreeSet<Slot> = BTreeSet::new();
        filter.set_in_core(false);
        let up = drain(&mut arena, &mut queue, &mut budget, |arena, queue, slot| {
            let node = arena.node(slot);
            if hierarchy.is_core(node) {
                core_entries.insert(slot);
                return Ok(ControlFlow::Continue(()));
            }
            for edge in graph.edges_from(node) {
                if !filter.accept(&edge, SearchDirection::Forward) {
                    continue;
                }
                if let Some(next) = relaxer.relax(arena, slot, &edge, |_, _, _| {}) {
                    queue.push(next, arena);
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;
        stats.upward_visited = up.settled;
        stats.reopened += up.reopened;
        stats.core_entry_points = core_entries.len();

        // Phase 2: inside the core, only if a destination hangs off it
        if !core_entries.is_empty() && !self.core_goals.is_empty() {
            filter.set_in_core(true);
            arena.reset_settled();
            let mut goals = (!arena.is_edge_based())
                .then(|| GoalTracker::new(&self.core_goals, sources.len()));
            for &slot in &core_entries {
                if arena.mark_reached_updated(slot) {
                    queue.push(slot, &arena);
                    if let Some(goals) = goals.as_mut() {
                        goals.record_entry(&arena, slot);
                    }
                }
            }
            let core = drain(&mut arena, &mut queue, &mut budget, |arena, queue, slot| {
                let node = arena.node(slot);
                for edge in graph.edges_from(node) {
                    if !filter.accept(&edge, SearchDirection::Forward) {
                        continue;
                    }
                    let adj = edge.adj;
                    let next = relaxer.relax(arena, slot, &edge, |s, tree, weight| {
                        if let Some(goals) = goals.as_mut() {
                            goals.record(adj, s, tree, weight);
                        }
                    });
                    if let Some(next) = next {
                        queue.push(next, arena);
                    }
                }
                let finished = match goals.as_mut() {
                    Some(goals) => goals.is_goal(node) && !goals.can_improve(arena, queue),
                    None => false,
                };
                if finished {
                    return Ok(ControlFlow::Break(()));
                }
                Ok(ControlFlow::Continue(()))
            })?;
            stats.core_visited = core.settled;
            stats.reopened += core.reopened;
            queue.clear();
            filter.set_in_core(false);
        }

        // Phase 3: descend the target graph
        let sub_graph = &self.target_graph.sub_graph;
        arena.reset_settled();
        let seeds: Vec<Slot> = arena
            .slots()
            .filter(|&slot| sub_graph.contains(arena.node(slot)))
            .collect();
        for slot in seeds {
            if arena.mark_reached_updated(slot) {
                queue.push(slot, &arena);
            }
        }
        let down = drain(&mut arena, &mut queue, &mut budget, |arena, queue, slot| {
            let node = arena.node(slot);
            for &(edge_id, lower) in sub_graph.links(node) {
                let edge = graph.edge_view(edge_id, node).ok_or_else(|| {
                    MatrixError::Internal(format!(
                        "target graph link {node} -> {lower} uses edge {edge_id} not incident to {node}"
                    ))
                })?;
                debug_assert_eq!(edge.adj, lower);
                if let Some(next) = relaxer.relax(arena, slot, &edge, |_, _, _| {}) {
                    queue.push(next, arena);
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;
        stats.downward_visited = down.settled;
        stats.reopened += down.reopened;

        tracing::debug!(
            trees = sources.len(),
            upward = stats.upward_visited,
            core = stats.core_visited,
            downward = stats.downward_visited,
            core_entries = stats.core_entry_points,
            entries = arena.len(),
            "rphast search finished"
        );

        Ok(MultiTreeSearch { arena, stats })
    }
}
