pub mod cli;
pub mod filters;
pub mod formats;
pub mod graph;
pub mod matrix;
pub mod weighting;

pub use graph::{GraphBuilder, RoutingGraph};
pub use matrix::{MatrixConfig, MatrixError, MatrixRequest, MatrixResult, MatrixService};
