//! JSON graph description
//!
//! Interchange format for tooling and fixtures. Edge ids are assigned in
//! file order: original edges first, then shortcuts, so a shortcut may only
//! reference edges listed before it.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::graph::{EdgeAccess, EdgeAttributes, EdgeId, GraphBuilder, NodeId, RoutingGraph};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub base: NodeId,
    pub adj: NodeId,
    /// Meters
    pub distance: f64,
    #[serde(default)]
    pub access: EdgeAccess,
    #[serde(default)]
    pub attributes: EdgeAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutDescription {
    pub base: NodeId,
    pub adj: NodeId,
    #[serde(default)]
    pub access: EdgeAccess,
    pub via: NodeId,
    pub first: EdgeId,
    pub second: EdgeId,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub n_nodes: u32,
    /// Contraction level per node; absent for a graph without hierarchy
    #[serde(default)]
    pub levels: Option<Vec<u32>>,
    #[serde(default)]
    pub core_level: Option<u32>,
    #[serde(default)]
    pub edges: Vec<EdgeDescription>,
    #[serde(default)]
    pub shortcuts: Vec<ShortcutDescription>,
}

impl GraphDescription {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading graph description {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing graph description {}", path.display()))
    }

    pub fn into_graph(self) -> Result<RoutingGraph> {
        let mut builder = GraphBuilder::new(self.n_nodes);
        for (idx, e) in self.edges.into_iter().enumerate() {
            builder
                .add_edge(e.base, e.adj, e.distance, e.access, e.attributes)
                .with_context(|| format!("edge #{idx}"))?;
        }
        for (idx, s) in self.shortcuts.into_iter().enumerate() {
            builder
                .add_shortcut(s.base, s.adj, s.access, s.via, s.first, s.second, s.weight)
                .with_context(|| format!("shortcut #{idx}"))?;
        }
        if let Some(levels) = self.levels {
            builder.set_hierarchy(levels, self.core_level);
        }
        Ok(builder.build()?)
    }
}

/// Load and build a graph in one step.
pub fn load_graph<P: AsRef<Path>>(path: P) -> Result<RoutingGraph> {
    let path = path.as_ref();
    GraphDescription::load(path)?
        .into_graph()
        .with_context(|| format!("building graph from {}", path.display()))
}
