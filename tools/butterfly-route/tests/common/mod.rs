//! Shared fixtures for the matrix integration tests.
#![allow(dead_code)]

use butterfly_route::filters::{EdgeFilter, EdgeFilterChain, SearchDirection};
use butterfly_route::formats::{EdgeDescription, GraphDescription};
use butterfly_route::graph::{EdgeAccess, EdgeAttributes, EdgeId, GraphBuilder, NodeId, RoutingGraph};
use butterfly_route::matrix::{MatrixResult, UNREACHABLE};
use butterfly_route::weighting::{traversal_weight, Weighting};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct Arc {
    from: NodeId,
    to: NodeId,
    edge: EdgeId,
    weight: f64,
}

pub fn edge(base: NodeId, adj: NodeId, distance: f64) -> EdgeDescription {
    EdgeDescription {
        base,
        adj,
        distance,
        access: EdgeAccess::Both,
        attributes: EdgeAttributes::default(),
    }
}

pub fn one_way(base: NodeId, adj: NodeId, distance: f64) -> EdgeDescription {
    EdgeDescription {
        access: EdgeAccess::Forward,
        ..edge(base, adj, distance)
    }
}

pub fn description(n_nodes: u32, edges: Vec<EdgeDescription>) -> GraphDescription {
    GraphDescription {
        n_nodes,
        levels: None,
        core_level: None,
        edges,
        shortcuts: Vec::new(),
    }
}

/// Graph without hierarchy.
pub fn plain(desc: &GraphDescription) -> RoutingGraph {
    desc.clone().into_graph().unwrap()
}

/// Contract the nodes of `order` one by one; every other node stays in the core.
///
/// No witness search: each pair of arcs `u -> v -> w` through the contracted
/// node becomes a shortcut unless a direct arc `u -> w` is already as cheap.
/// Shortcut weights come from `weighting`, so the result is only valid for it.
pub fn contract(desc: &GraphDescription, order: &[NodeId], weighting: &dyn Weighting) -> RoutingGraph {
    let n = desc.n_nodes as usize;
    let reference = plain(desc);

    let mut builder = GraphBuilder::new(desc.n_nodes);
    let mut arcs = Vec::new();
    for e in &desc.edges {
        let id = builder
            .add_edge(e.base, e.adj, e.distance, e.access, e.attributes)
            .unwrap();
        if e.base == e.adj {
            continue;
        }
        for from in [e.base, e.adj] {
            let view = reference.edge_view(id, from).unwrap();
            let weight = traversal_weight(weighting, &view, None);
            if weight.is_finite() {
                arcs.push(Arc {
                    from,
                    to: view.adj,
                    edge: id,
                    weight,
                });
            }
        }
    }

    let mut contracted = vec![false; n];
    for &v in order {
        let incoming: Vec<Arc> = arcs
            .iter()
            .filter(|a| a.to == v && a.from != v && !contracted[a.from as usize])
            .copied()
            .collect();
        let outgoing: Vec<Arc> = arcs
            .iter()
            .filter(|a| a.from == v && a.to != v && !contracted[a.to as usize])
            .copied()
            .collect();
        for a in &incoming {
            for b in &outgoing {
                if a.from == b.to {
                    continue;
                }
                let weight = a.weight + b.weight;
                let covered = arcs
                    .iter()
                    .any(|d| d.from == a.from && d.to == b.to && d.weight <= weight);
                if covered {
                    continue;
                }
                let id = builder
                    .add_shortcut(a.from, b.to, EdgeAccess::Forward, v, a.edge, b.edge, weight)
                    .unwrap();
                arcs.push(Arc {
                    from: a.from,
                    to: b.to,
                    edge: id,
                    weight,
                });
            }
        }
        contracted[v as usize] = true;
    }

    let core_level = n as u32;
    let mut levels = vec![core_level; n];
    for (rank, &v) in order.iter().enumerate() {
        levels[v as usize] = rank as u32;
    }
    let has_core = order.len() < n;
    builder.set_hierarchy(levels, has_core.then_some(core_level));
    builder.build().unwrap()
}

/// All-pairs weights by Floyd-Warshall over the original edges of `desc`.
///
/// Edges rejected by `restrictions` are left out. Turn costs are not modelled,
/// so only compare against node-based weightings. Unreachable pairs hold
/// `f64::INFINITY`.
pub fn floyd_warshall(
    desc: &GraphDescription,
    weighting: &dyn Weighting,
    restrictions: &EdgeFilterChain,
) -> Vec<Vec<f64>> {
    let n = desc.n_nodes as usize;
    let graph = plain(desc);
    let mut dist = vec![vec![f64::INFINITY; n]; n];
    for (v, row) in dist.iter_mut().enumerate() {
        row[v] = 0.0;
    }
    for from in 0..desc.n_nodes {
        for view in graph.edges_from(from) {
            if view.is_shortcut()
                || view.adj == from
                || !restrictions.accept(&view, SearchDirection::Forward)
            {
                continue;
            }
            let weight = traversal_weight(weighting, &view, None);
            let cell = &mut dist[from as usize][view.adj as usize];
            if weight < *cell {
                *cell = weight;
            }
        }
    }
    for k in 0..n {
        for i in 0..n {
            let via = dist[i][k];
            if via == f64::INFINITY {
                continue;
            }
            for j in 0..n {
                let candidate = via + dist[k][j];
                if candidate < dist[i][j] {
                    dist[i][j] = candidate;
                }
            }
        }
    }
    dist
}

/// Row-major table of `all_pairs` restricted to the requested locations, with
/// the unreachable sentinel in place of infinity.
pub fn reference_table(all_pairs: &[Vec<f64>], sources: &[i64], destinations: &[i64]) -> Vec<f64> {
    let mut table = Vec::with_capacity(sources.len() * destinations.len());
    for &s in sources {
        for &d in destinations {
            let w = all_pairs[s as usize][d as usize];
            table.push(if w.is_finite() { w } else { UNREACHABLE });
        }
    }
    table
}

/// Unit-weight line `0 - 1 - ... - (n-1)`.
pub fn line(n: u32) -> GraphDescription {
    description(n, (0..n - 1).map(|i| edge(i, i + 1, 1.0)).collect())
}

/// Random graph with integer distances. A random spanning path keeps most
/// nodes connected; one-way edges make some pairs unreachable.
pub fn random_graph(rng: &mut StdRng, n: u32, extra_edges: usize, one_way: bool) -> GraphDescription {
    let mut nodes: Vec<NodeId> = (0..n).collect();
    nodes.shuffle(rng);

    let mut edges = Vec::new();
    let mut push = |rng: &mut StdRng, base: NodeId, adj: NodeId| {
        let access = if one_way && rng.random_bool(0.2) {
            if rng.random_bool(0.5) {
                EdgeAccess::Forward
            } else {
                EdgeAccess::Backward
            }
        } else {
            EdgeAccess::Both
        };
        let speeds = [30.0, 50.0, 80.0, 120.0];
        let attributes = EdgeAttributes {
            speed_kmh: speeds[rng.random_range(0..speeds.len())],
            reverse_speed_kmh: if one_way && rng.random_bool(0.3) {
                Some(speeds[rng.random_range(0..speeds.len())])
            } else {
                None
            },
            ..Default::default()
        };
        edges.push(EdgeDescription {
            base,
            adj,
            distance: rng.random_range(1..=100) as f64,
            access,
            attributes,
        });
    };

    for pair in nodes.windows(2) {
        push(rng, pair[0], pair[1]);
    }
    for _ in 0..extra_edges {
        let base = rng.random_range(0..n);
        let adj = rng.random_range(0..n);
        if base != adj {
            push(rng, base, adj);
        }
    }
    description(n, edges)
}

/// Random contraction order leaving `core_size` nodes uncontracted.
pub fn random_order(rng: &mut StdRng, n: u32, core_size: usize) -> Vec<NodeId> {
    let mut order: Vec<NodeId> = (0..n).collect();
    order.shuffle(rng);
    order.truncate(n as usize - core_size);
    order
}

pub fn random_nodes(rng: &mut StdRng, n: u32, count: usize) -> Vec<i64> {
    (0..count).map(|_| rng.random_range(0..n) as i64).collect()
}

pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn assert_close(actual: f64, expected: f64, what: &str) {
    if expected == UNREACHABLE || actual == UNREACHABLE {
        assert_eq!(actual, expected, "{what}");
        return;
    }
    let scale = expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= TOLERANCE * scale,
        "{what}: {actual} != {expected}"
    );
}

pub fn assert_tables_close(actual: Option<&[f64]>, expected: Option<&[f64]>, what: &str) {
    let (actual, expected) = (actual.unwrap(), expected.unwrap());
    assert_eq!(actual.len(), expected.len(), "{what}");
    for (idx, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_close(*a, *e, &format!("{what} cell {idx}"));
    }
}

/// Row `source` of the distance table.
pub fn distance_row(result: &MatrixResult, source: usize) -> Vec<f64> {
    (0..result.n_destinations())
        .map(|d| result.distance(source, d).unwrap())
        .collect()
}
