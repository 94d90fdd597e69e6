//! Multi-tree search state
//!
//! One traversal advances N source-rooted shortest-path trees at once. Each
//! visited node owns one entry holding N [`TreeItem`]s (tree `i` belongs to
//! source `i`) plus a cached aggregate key: the mean of its finite item
//! weights. The aggregate only orders the queue. Correctness rests on the
//! relaxation rule alone: an item changes only for a strictly smaller weight,
//! and an entry is re-queued whenever any of its items changes, so every
//! tree converges to its shortest paths whatever order nodes are settled in.
//!
//! With turn costs a node gets one entry per arrival edge (the last original
//! edge driven), so a forbidden turn after one approach never hides another
//! approach to the same node. A destination's label is then the best entry
//! at that node.
//!
//! ## Layout
//!
//! - Entries live in a request-scoped arena addressed by [`Slot`]; parents
//!   are slots, never references, so dropping the arena frees everything.
//! - Items are flat: entry `s`, tree `i` sits at `items[s * n_trees + i]`.
//! - The queue is addressable (`priority-queue`): a re-queued entry updates
//!   its key in place instead of leaving a stale copy behind.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::ops::ControlFlow;

use priority_queue::PriorityQueue;
use rustc_hash::{FxBuildHasher, FxHashMap};

use super::error::{MatrixError, Result};
use crate::graph::{EdgeId, EdgeView, NodeId};
use crate::weighting::{traversal_weight, Weighting};

/// Index of an entry in a [`MultiTreeArena`].
pub type Slot = u32;

/// State of one tree at one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeItem {
    pub weight: f64,
    /// Edge over which the tree reached this node
    pub edge: Option<EdgeId>,
    /// Last original edge driven, the turn context for the next relaxation
    pub original_edge: Option<EdgeId>,
    pub parent: Option<Slot>,
    /// Improved since this entry was last expanded
    pub updated: bool,
}

impl TreeItem {
    pub const UNREACHED: TreeItem = TreeItem {
        weight: f64::INFINITY,
        edge: None,
        original_edge: None,
        parent: None,
        updated: false,
    };

    pub const ROOT: TreeItem = TreeItem {
        weight: 0.0,
        edge: None,
        original_edge: None,
        parent: None,
        updated: true,
    };

    #[inline]
    pub fn is_reached(&self) -> bool {
        self.weight.is_finite()
    }
}

// =============================================================================
// ARENA
// =============================================================================

/// All entries created during one computation.
#[derive(Debug, Clone)]
pub struct MultiTreeArena {
    n_trees: usize,
    edge_based: bool,
    slot_of: FxHashMap<(NodeId, Option<EdgeId>), Slot>,
    // Every entry of a node, maintained for edge-based arenas only
    by_node: FxHashMap<NodeId, Vec<Slot>>,
    nodes: Vec<NodeId>,
    settled: Vec<bool>,
    aggregate: Vec<f64>,
    items: Vec<TreeItem>,
}

impl MultiTreeArena {
    /// One entry per node.
    pub fn new(n_trees: usize) -> Self {
        Self {
            n_trees,
            edge_based: false,
            slot_of: FxHashMap::default(),
            by_node: FxHashMap::default(),
            nodes: Vec::new(),
            settled: Vec::new(),
            aggregate: Vec::new(),
            items: Vec::new(),
        }
    }

    /// One entry per node and arrival edge.
    pub fn edge_based(n_trees: usize) -> Self {
        Self {
            edge_based: true,
            ..Self::new(n_trees)
        }
    }

    /// Edge-based exactly when `weighting` charges turns.
    pub fn for_weighting(n_trees: usize, weighting: &dyn Weighting) -> Self {
        if weighting.has_turn_costs() {
            Self::edge_based(n_trees)
        } else {
            Self::new(n_trees)
        }
    }

    #[inline]
    pub fn is_edge_based(&self) -> bool {
        self.edge_based
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.n_trees
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
    fn key(&self, node: NodeId, arrival: Option<EdgeId>) -> (NodeId, Option<EdgeId>) {
        (node, if self.edge_based { arrival } else { None })
    }

    /// Entry for `node` reached over `arrival`. Node-based arenas ignore
    /// the arrival edge.
    #[inline]
    pub fn find(&self, node: NodeId, arrival: Option<EdgeId>) -> Option<Slot> {
        self.slot_of.get(&self.key(node, arrival)).copied()
    }

    /// Entry for `node` without arrival edge: the only entry of a node in a
    /// node-based arena, the seed entry in an edge-based one.
    #[inline]
    pub fn slot(&self, node: NodeId) -> Option<Slot> {
        self.find(node, None)
    }

    /// Every entry of `node`.
    pub fn slots_at(&self, node: NodeId) -> &[Slot] {
        if self.edge_based {
            self.by_node.get(&node).map(Vec::as_slice).unwrap_or(&[])
        } else {
            self.slot_of
                .get(&(node, None))
                .map(std::slice::from_ref)
                .unwrap_or(&[])
        }
    }

    /// Entry with the lowest weight for `tree` at `node`, if any reached it.
    pub fn best(&self, node: NodeId, tree: usize) -> Option<Slot> {
        self.slots_at(node)
            .iter()
            .copied()
            .filter(|&slot| self.item(slot, tree).is_reached())
            .min_by(|&a, &b| {
                self.item(a, tree)
                    .weight
                    .total_cmp(&self.item(b, tree).weight)
            })
    }

    /// Entry for `node` over `arrival`, created unreached on first access.
    pub fn entry(&mut self, node: NodeId, arrival: Option<EdgeId>) -> Slot {
        let key = self.key(node, arrival);
        if let Some(&slot) = self.slot_of.get(&key) {
            return slot;
        }
        let slot = self.nodes.len() as Slot;
        self.slot_of.insert(key, slot);
        if self.edge_based {
            self.by_node.entry(node).or_default().push(slot);
        }
        self.nodes.push(node);
        self.settled.push(false);
        self.aggregate.push(f64::INFINITY);
        self.items
            .extend(std::iter::repeat(TreeItem::UNREACHED).take(self.n_trees));
        slot
    }

    pub fn get_or_insert(&mut self, node: NodeId) -> Slot {
        self.entry(node, None)
    }

    #[inline]
    pub fn node(&self, slot: Slot) -> NodeId {
        self.nodes[slot as usize]
    }

    #[inline]
    pub fn contains_slot(&self, slot: Slot) -> bool {
        (slot as usize) < self.nodes.len()
    }

    #[inline]
    pub fn items(&self, slot: Slot) -> &[TreeItem] {
        let start = slot as usize * self.n_trees;
        &self.items[start..start + self.n_trees]
    }

    #[inline]
    pub fn item(&self, slot: Slot, tree: usize) -> &TreeItem {
        &self.items[slot as usize * self.n_trees + tree]
    }

    #[inline]
    pub fn item_mut(&mut self, slot: Slot, tree: usize) -> &mut TreeItem {
        &mut self.items[slot as usize * self.n_trees + tree]
    }

    /// Root tree `tree` at `node` with weight 0.
    pub fn seed(&mut self, node: NodeId, tree: usize) -> Slot {
        let slot = self.get_or_insert(node);
        *self.item_mut(slot, tree) = TreeItem::ROOT;
        self.refresh_aggregate(slot);
        slot
    }

    /// Recompute the queue key: mean of finite item weights, or infinity.
    pub fn refresh_aggregate(&mut self, slot: Slot) {
        let (sum, count) = self
            .items(slot)
            .iter()
            .filter(|it| it.is_reached())
            .fold((0.0, 0usize), |(s, c), it| (s + it.weight, c + 1));
        self.aggregate[slot as usize] = if count == 0 {
            f64::INFINITY
        } else {
            sum / count as f64
        };
    }

    #[inline]
    pub fn aggregate(&self, slot: Slot) -> f64 {
        self.aggregate[slot as usize]
    }

    /// Returns true the first time `slot` is settled.
    #[inline]
    pub fn mark_settled(&mut self, slot: Slot) -> bool {
        !std::mem::replace(&mut self.settled[slot as usize], true)
    }

    #[inline]
    pub fn is_settled(&self, slot: Slot) -> bool {
        self.settled[slot as usize]
    }

    /// Forget settle state between phases.
    pub fn reset_settled(&mut self) {
        self.settled.fill(false);
    }

    /// Flag every reached item for re-expansion. Returns false when the
    /// entry has no reached item at all.
    pub fn mark_reached_updated(&mut self, slot: Slot) -> bool {
        let start = slot as usize * self.n_trees;
        let mut any = false;
        for item in &mut self.items[start..start + self.n_trees] {
            item.updated = item.is_reached();
            any |= item.updated;
        }
        any
    }

    pub fn clear_updated(&mut self, slot: Slot) {
        let start = slot as usize * self.n_trees;
        for item in &mut self.items[start..start + self.n_trees] {
            item.updated = false;
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = Slot> {
        0..self.nodes.len() as Slot
    }
}

// =============================================================================
// QUEUE
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct QueueKey {
    weight: f64,
    node: NodeId,
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueKey {}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    // Node id breaks ties so settle order never depends on hashing
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Min-queue over arena slots keyed by aggregate weight, with decrease-key.
pub struct SearchQueue {
    heap: PriorityQueue<Slot, Reverse<QueueKey>, FxBuildHasher>,
}

impl Default for SearchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchQueue {
    pub fn new() -> Self {
        Self {
            heap: PriorityQueue::with_hasher(FxBuildHasher),
        }
    }

    /// Insert `slot` or move it to its current aggregate key.
    #[inline]
    pub fn push(&mut self, slot: Slot, arena: &MultiTreeArena) {
        let key = QueueKey {
            weight: arena.aggregate(slot),
            node: arena.node(slot),
        };
        self.heap.push(slot, Reverse(key));
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Slot> {
        self.heap.pop().map(|(slot, _)| slot)
    }

    #[inline]
    pub fn contains(&self, slot: Slot) -> bool {
        self.heap.get(&slot).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

// =============================================================================
// RELAXATION
// =============================================================================

/// Applies the strict-decrease rule for every updated tree of an entry.
pub(crate) struct Relaxer<'a> {
    weighting: &'a dyn Weighting,
    turn_costs: bool,
}

impl<'a> Relaxer<'a> {
    pub fn new(weighting: &'a dyn Weighting) -> Self {
        Self {
            weighting,
            turn_costs: weighting.has_turn_costs(),
        }
    }

    /// Relax `edge` (oriented away from the entry at `from`) for each
    /// updated tree. `on_improve(slot, tree, weight)` sees every item that
    /// changed. Returns the adjacent slot if any tree improved.
    pub fn relax<F>(
        &self,
        arena: &mut MultiTreeArena,
        from: Slot,
        edge: &EdgeView<'_>,
        mut on_improve: F,
    ) -> Option<Slot>
    where
        F: FnMut(Slot, usize, f64),
    {
        // Without turn costs every tree pays the same
        let shared = if self.turn_costs {
            None
        } else {
            let cost = traversal_weight(self.weighting, edge, None);
            if !cost.is_finite() {
                return None;
            }
            Some(cost)
        };

        let arrival = edge.last_original_edge();
        let mut target = arena.find(edge.adj, Some(arrival));
        let mut improved = false;
        for tree in 0..arena.n_trees() {
            let src = *arena.item(from, tree);
            if !src.updated || !src.is_reached() {
                continue;
            }
            let cost = match shared {
                Some(c) => c,
                None => traversal_weight(self.weighting, edge, src.original_edge),
            };
            if !cost.is_finite() {
                continue;
            }
            let candidate = src.weight + cost;
            let current = target.map_or(f64::INFINITY, |t| arena.item(t, tree).weight);
            if candidate < current {
                let t = *target.get_or_insert_with(|| arena.entry(edge.adj, Some(arrival)));
                *arena.item_mut(t, tree) = TreeItem {
                    weight: candidate,
                    edge: Some(edge.id),
                    original_edge: Some(arrival),
                    parent: Some(from),
                    updated: true,
                };
                on_improve(t, tree, candidate);
                improved = true;
            }
        }

        if improved {
            let t = target?;
            arena.refresh_aggregate(t);
            Some(t)
        } else {
            None
        }
    }
}

// =============================================================================
// SETTLE LOOP
// =============================================================================

/// Visited-node budget shared by every phase of one computation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VisitBudget {
    visited: usize,
    limit: usize,
}

impl VisitBudget {
    pub fn new(limit: usize) -> Self {
        Self { visited: 0, limit }
    }

    #[inline]
    pub fn tick(&mut self) -> Result<()> {
        self.visited += 1;
        if self.visited > self.limit {
            return Err(MatrixError::SearchLimitExceeded {
                visited: self.visited,
                limit: self.limit,
            });
        }
        Ok(())
    }

    pub fn visited(&self) -> usize {
        self.visited
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DrainStats {
    pub settled: usize,
    /// Settles of entries already settled earlier in the phase
    pub reopened: usize,
}

/// Pop entries until the queue is empty or `expand` breaks.
///
/// Each pop costs one unit of budget. `expand` relaxes the entry's updated
/// items; their flags are cleared afterwards.
pub(crate) fn drain<F>(
    arena: &mut MultiTreeArena,
    queue: &mut SearchQueue,
    budget: &mut VisitBudget,
    mut expand: F,
) -> Result<DrainStats>
where
    F: FnMut(&mut MultiTreeArena, &mut SearchQueue, Slot) -> Result<ControlFlow<()>>,
{
    let mut stats = DrainStats::default();
    while let Some(slot) = queue.pop() {
        debug_assert!(arena.contains_slot(slot), "queue returned unknown slot {slot}");
        if !arena.contains_slot(slot) {
            return Err(MatrixError::Internal(format!(
                "queue returned slot {slot} outside the arena"
            )));
        }
        budget.tick()?;
        stats.settled += 1;
        if !arena.mark_settled(slot) {
            stats.reopened += 1;
        }
        let flow = expand(arena, queue, slot)?;
        arena.clear_updated(slot);
        if flow.is_break() {
            break;
        }
    }
    Ok(stats)
}

/// Heap-orderable weight.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapWeight(f64);

impl Eq for HeapWeight {}

impl PartialOrd for HeapWeight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapWeight {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Early-stop bookkeeping: whether any queued, updated item could still
/// lower the weight of some goal for some tree.
///
/// Weights are non-negative, so a future label derived from a queued item
/// is never below that item's weight. A tree is finished once its smallest
/// queued weight reaches its largest goal weight, and stays finished. Both
/// bounds are kept in per-tree heaps fed by [`GoalTracker::record`]; entries
/// gone stale are dropped lazily when they surface.
pub(crate) struct GoalTracker {
    n_trees: usize,
    goal_index: FxHashMap<NodeId, usize>,
    // best[goal * n_trees + tree]: lowest weight over the goal's entries
    best: Vec<f64>,
    unreached: Vec<usize>,
    goal_max: Vec<BinaryHeap<(HeapWeight, usize)>>,
    frontier: Vec<BinaryHeap<Reverse<(HeapWeight, Slot)>>>,
    open: Vec<usize>,
}

impl GoalTracker {
    pub fn new(goals: &[NodeId], n_trees: usize) -> Self {
        let mut goal_index = FxHashMap::default();
        for &goal in goals {
            let next = goal_index.len();
            goal_index.entry(goal).or_insert(next);
        }
        let n_goals = goal_index.len();
        Self {
            n_trees,
            goal_index,
            best: vec![f64::INFINITY; n_goals * n_trees],
            unreached: vec![n_goals; n_trees],
            goal_max: (0..n_trees).map(|_| BinaryHeap::new()).collect(),
            frontier: (0..n_trees).map(|_| BinaryHeap::new()).collect(),
            open: (0..n_trees).collect(),
        }
    }

    #[inline]
    pub fn is_goal(&self, node: NodeId) -> bool {
        self.goal_index.contains_key(&node)
    }

    /// Note that tree `tree` of the entry `slot` at `node` now holds `weight`.
    pub fn record(&mut self, node: NodeId, slot: Slot, tree: usize, weight: f64) {
        self.frontier[tree].push(Reverse((HeapWeight(weight), slot)));
        if let Some(&goal) = self.goal_index.get(&node) {
            let best = &mut self.best[goal * self.n_trees + tree];
            if weight < *best {
                if best.is_infinite() {
                    self.unreached[tree] -= 1;
                }
                *best = weight;
                self.goal_max[tree].push((HeapWeight(weight), goal));
            }
        }
    }

    /// Record every updated item of `slot`, for entries queued without a
    /// relaxation (seeds, phase entry points).
    pub fn record_entry(&mut self, arena: &MultiTreeArena, slot: Slot) {
        let node = arena.node(slot);
        for (tree, item) in arena.items(slot).iter().enumerate() {
            if item.updated && item.is_reached() {
                self.record(node, slot, tree, item.weight);
            }
        }
    }

    pub fn can_improve(&mut self, arena: &MultiTreeArena, queue: &SearchQueue) -> bool {
        let Self {
            n_trees,
            best,
            unreached,
            goal_max,
            frontier,
            open,
            ..
        } = self;
        open.retain(|&tree| {
            let queued = queued_min(&mut frontier[tree], arena, queue, tree);
            let bound = if unreached[tree] > 0 {
                f64::INFINITY
            } else {
                largest_goal(&mut goal_max[tree], &best[..], *n_trees, tree)
            };
            queued < bound
        });
        !open.is_empty()
    }
}

fn queued_min(
    heap: &mut BinaryHeap<Reverse<(HeapWeight, Slot)>>,
    arena: &MultiTreeArena,
    queue: &SearchQueue,
    tree: usize,
) -> f64 {
    while let Some(&Reverse((HeapWeight(weight), slot))) = heap.peek() {
        let item = arena.item(slot, tree);
        if item.updated && item.weight == weight && queue.contains(slot) {
            return weight;
        }
        heap.pop();
    }
    f64::INFINITY
}

fn largest_goal(
    heap: &mut BinaryHeap<(HeapWeight, usize)>,
    best: &[f64],
    n_trees: usize,
    tree: usize,
) -> f64 {
    while let Some(&(HeapWeight(weight), goal)) = heap.peek() {
        if best[goal * n_trees + tree] == weight {
            return weight;
        }
        heap.pop();
    }
    f64::INFINITY
}

/// Outcome of one multi-tree computation.
#[derive(Debug, Clone)]
pub struct MultiTreeSearch {
    pub arena: MultiTreeArena,
    pub stats: SearchStats,
}

impl MultiTreeSearch {
    /// Entry holding the best label of `tree` at `destination`.
    pub fn terminal(&self, destination: Option<NodeId>, tree: usize) -> Option<Slot> {
        destination.and_then(|node| self.arena.best(node, tree))
    }
}

/// Per-phase counters of one computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub upward_visited: usize,
    pub core_visited: usize,
    pub downward_visited: usize,
    pub dijkstra_visited: usize,
    pub reopened: usize,
    pub core_entry_points: usize,
}

impl SearchStats {
    pub fn visited(&self) -> usize {
        self.upward_visited + self.core_visited + self.downward_visited + self.dijkstra_visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeAccess, EdgeAttributes, GraphBuilder};
    use crate::weighting::ShortestWeighting;

    #[test]
    fn test_aggregate_is_mean_of_reached_items() {
        let mut arena = MultiTreeArena::new(3);
        let slot = arena.get_or_insert(7);
        assert!(arena.aggregate(slot).is_infinite());

        arena.item_mut(slot, 0).weight = 2.0;
        arena.item_mut(slot, 2).weight = 6.0;
        arena.refresh_aggregate(slot);
        assert_eq!(arena.aggregate(slot), 4.0);
        assert_eq!(arena.get_or_insert(7), slot);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_queue_orders_by_aggregate_then_node() {
        let mut arena = MultiTreeArena::new(1);
        let mut queue = SearchQueue::new();
        for (node, w) in [(5, 3.0), (1, 1.0), (9, 1.0)] {
            let slot = arena.get_or_insert(node);
            arena.item_mut(slot, 0).weight = w;
            arena.refresh_aggregate(slot);
            queue.push(slot, &arena);
        }
        // decrease-key on node 5
        let s5 = arena.slot(5).unwrap();
        arena.item_mut(s5, 0).weight = 0.5;
        arena.refresh_aggregate(s5);
        queue.push(s5, &arena);
        assert_eq!(queue.len(), 3);

        let order: Vec<NodeId> = std::iter::from_fn(|| queue.pop())
            .map(|s| arena.node(s))
            .collect();
        assert_eq!(order, vec![5, 1, 9]);
    }

    #[test]
    fn test_relax_requires_strict_improvement() {
        let mut b = GraphBuilder::new(3);
        b.add_edge(0, 2, 5.0, EdgeAccess::Both, EdgeAttributes::default())
            .unwrap();
        b.add_edge(1, 2, 5.0, EdgeAccess::Both, EdgeAttributes::default())
            .unwrap();
        let g = b.build().unwrap();
        let relaxer = Relaxer::new(&ShortestWeighting);

        let mut arena = MultiTreeArena::new(1);
        let s0 = arena.seed(0, 0);
        let s1 = arena.seed(1, 0);

        let e0 = g.edge_view(0, 0).unwrap();
        let s2 = relaxer.relax(&mut arena, s0, &e0, |_, _, _| {}).unwrap();
        assert_eq!(arena.item(s2, 0).weight, 5.0);
        assert_eq!(arena.item(s2, 0).parent, Some(s0));

        // equal weight from node 1 must not replace the parent
        let e1 = g.edge_view(1, 1).unwrap();
        assert!(relaxer.relax(&mut arena, s1, &e1, |_, _, _| {}).is_none());
        assert_eq!(arena.item(s2, 0).parent, Some(s0));
    }

    #[test]
    fn test_relax_skips_items_not_updated() {
        let mut b = GraphBuilder::new(2);
        b.add_edge(0, 1, 1.0, EdgeAccess::Both, EdgeAttributes::default())
            .unwrap();
        let g = b.build().unwrap();
        let relaxer = Relaxer::new(&ShortestWeighting);

        let mut arena = MultiTreeArena::new(2);
        let s0 = arena.seed(0, 0);
        arena.clear_updated(s0);
        let edge = g.edge_view(0, 0).unwrap();
        assert!(relaxer.relax(&mut arena, s0, &edge, |_, _, _| {}).is_none());
        assert!(arena.slot(1).is_none());

        assert!(arena.mark_reached_updated(s0));
        let s1 = relaxer.relax(&mut arena, s0, &edge, |_, _, _| {}).unwrap();
        assert_eq!(arena.item(s1, 0).weight, 1.0);
        assert!(!arena.item(s1, 1).is_reached());
    }

    #[test]
    fn test_budget_trips_after_limit() {
        let mut budget = VisitBudget::new(1);
        assert!(budget.tick().is_ok());
        assert_eq!(
            budget.tick(),
            Err(MatrixError::SearchLimitExceeded {
                visited: 2,
                limit: 1
            })
        );
    }

    #[test]
    fn test_goal_tracker_bounds() {
        let mut arena = MultiTreeArena::new(1);
        let mut queue = SearchQueue::new();
        let mut goals = GoalTracker::new(&[1, 3], 1);
        let other = arena.seed(2, 0);
        queue.push(other, &arena);
        goals.record_entry(&arena, other);

        let goal = arena.get_or_insert(1);
        *arena.item_mut(goal, 0) = TreeItem {
            weight: 4.0,
            ..TreeItem::ROOT
        };
        goals.record(1, goal, 0, 4.0);
        // goal 3 unreached: anything queued may still help
        assert!(goals.can_improve(&arena, &queue));

        let mut single = GoalTracker::new(&[1], 1);
        single.record_entry(&arena, other);
        single.record(1, goal, 0, 4.0);
        assert!(single.can_improve(&arena, &queue));

        // the queued item no longer beats the goal
        arena.item_mut(other, 0).weight = 4.0;
        single.record(2, other, 0, 4.0);
        assert!(!single.can_improve(&arena, &queue));
        // finished trees stay finished
        arena.item_mut(other, 0).weight = 0.0;
        assert!(!single.can_improve(&arena, &queue));
    }

    #[test]
    fn test_goal_tracker_ignores_expanded_items() {
        let mut arena = MultiTreeArena::new(1);
        let queue = SearchQueue::new();
        let mut goals = GoalTracker::new(&[5], 1);
        let seed = arena.seed(0, 0);
        goals.record_entry(&arena, seed);
        // popped entries are no longer in the queue
        assert!(!goals.can_improve(&arena, &queue));
        assert!(!GoalTracker::new(&[], 1).can_improve(&arena, &queue));
    }

    #[test]
    fn test_edge_based_arena_keeps_one_entry_per_arrival() {
        let mut arena = MultiTreeArena::edge_based(1);
        let a = arena.entry(4, Some(10));
        let b = arena.entry(4, Some(11));
        assert_ne!(a, b);
        assert_eq!(arena.entry(4, Some(10)), a);
        assert_eq!(arena.slots_at(4), &[a, b]);
        assert!(arena.best(4, 0).is_none());

        arena.item_mut(a, 0).weight = 9.0;
        arena.item_mut(b, 0).weight = 3.0;
        assert_eq!(arena.best(4, 0), Some(b));

        let mut nodes = MultiTreeArena::new(1);
        let only = nodes.entry(4, Some(10));
        assert_eq!(nodes.entry(4, Some(11)), only);
        assert_eq!(nodes.slots_at(4), &[only]);
        assert!(nodes.slots_at(5).is_empty());
    }
}
