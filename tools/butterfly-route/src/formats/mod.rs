//! Graph interchange formats

pub mod graph_json;

pub use graph_json::{load_graph, EdgeDescription, GraphDescription, ShortcutDescription};
