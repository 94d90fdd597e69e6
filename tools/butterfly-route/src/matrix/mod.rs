//! Many-to-Many Matrix Computation
//!
//! Computes distance, duration and weight for every source×destination pair
//! with one multi-tree traversal instead of one search per pair.
//!
//! ## 1. Target graph (`target_graph`)
//!
//! Built once per destination set:
//! - Climbs the hierarchy from every destination, lowest level first
//! - Stores the climbed edges downward (`upper -> lower`)
//! - Stops at the core; core nodes met become exit points
//!
//! ## 2. Multi-tree search (`multi_tree`, `rphast`, `dijkstra`)
//!
//! One arena entry per node holds one item per source tree. A single
//! priority queue keyed on the mean of reached weights drives all trees:
//! - `RphastEngine`: upward selection, inside-core phase with restrictions,
//!   downward phase over the target graph
//! - `DijkstraManyToMany`: plain multi-tree Dijkstra over the whole graph
//!
//! ## 3. Extraction (`extractor`)
//!
//! Follows parent links from each destination back to its source, unpacking
//! shortcuts for distance and duration.
//!
//! ## Strategy Selection
//!
//! - **Graph with levels**: `rphast`, batched over sources
//! - **Graph without levels**: `dijkstra`
//! - **Restrictions on a graph without core**: `dijkstra` (restrictions are
//!   only enforced inside the core by `rphast`)

pub mod config;
pub mod dijkstra;
pub mod error;
pub mod extractor;
pub mod multi_tree;
pub mod rphast;
pub mod service;
pub mod target_graph;
pub mod types;

pub use config::MatrixConfig;
pub use dijkstra::DijkstraManyToMany;
pub use error::{MatrixError, Result};
pub use extractor::MetricsExtractor;
pub use multi_tree::{MultiTreeArena, MultiTreeSearch, SearchStats, Slot, TreeItem};
pub use rphast::RphastEngine;
pub use service::MatrixService;
pub use target_graph::{SubGraph, TargetGraph, TargetGraphBuilder};
pub use types::{
    MatrixLocations, MatrixMetrics, MatrixRequest, MatrixResult, MatrixStats, MatrixStrategy,
    MatrixTables, Metric, UNREACHABLE,
};
