//! CLI commands for butterfly-route

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::formats::load_graph;
use crate::graph::RoutingGraph;
use crate::matrix::{MatrixConfig, MatrixRequest, MatrixService};
use crate::weighting::{FastestWeighting, ShortestWeighting, Weighting};

#[derive(Parser)]
#[command(name = "butterfly-route")]
#[command(about = "Many-to-many routing matrices over contracted graphs", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeightingKind {
    /// Edge weight is the distance in meters
    Shortest,
    /// Edge weight is the travel time in seconds
    Fastest,
}

impl WeightingKind {
    fn build(self) -> Box<dyn Weighting> {
        match self {
            WeightingKind::Shortest => Box::new(ShortestWeighting),
            WeightingKind::Fastest => Box::new(FastestWeighting::default()),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute a distance/duration/weight matrix
    Matrix {
        /// Graph description (JSON)
        #[arg(long)]
        graph: PathBuf,

        /// Matrix request (JSON)
        #[arg(long)]
        request: PathBuf,

        /// Matrix engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Weighting used for the search
        #[arg(long, value_enum, default_value = "fastest")]
        weighting: WeightingKind,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Print node, edge, shortcut and core counts of a graph
    Inspect {
        /// Graph description (JSON)
        #[arg(long)]
        graph: PathBuf,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        init_logging(self.json_logs);

        match self.command {
            Commands::Matrix {
                graph,
                request,
                config,
                weighting,
                pretty,
            } => {
                let graph = load(&graph)?;
                let config = match config {
                    Some(path) => MatrixConfig::from_json_file(path)?,
                    None => MatrixConfig::default(),
                };
                let text = std::fs::read_to_string(&request)
                    .with_context(|| format!("reading matrix request {}", request.display()))?;
                let request: MatrixRequest = serde_json::from_str(&text)
                    .with_context(|| format!("parsing matrix request {}", request.display()))?;

                let weighting = weighting.build();
                let service = MatrixService::new(&graph, weighting.as_ref(), config);
                let result = service.compute(&request).context("matrix computation failed")?;
                tracing::info!(
                    weighting = weighting.name(),
                    strategy = ?result.strategy,
                    sources = result.n_sources(),
                    destinations = result.n_destinations(),
                    total_ms = result.stats.total_time_ms,
                    "matrix done"
                );

                let out = if pretty {
                    serde_json::to_string_pretty(&result)?
                } else {
                    serde_json::to_string(&result)?
                };
                println!("{out}");
            }

            Commands::Inspect { graph } => {
                let graph = load(&graph)?;
                let hierarchy = graph.hierarchy();
                let summary = serde_json::json!({
                    "nodes": graph.node_count(),
                    "edges": graph.edge_count(),
                    "shortcuts": graph.shortcut_count(),
                    "has_hierarchy": hierarchy.is_some(),
                    "core_level": hierarchy.filter(|h| h.has_core()).map(|h| h.core_level()),
                    "core_nodes": hierarchy.map_or(0, |h| h.core_node_count()),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }

        Ok(())
    }
}

fn load(path: &Path) -> Result<RoutingGraph> {
    let start = Instant::now();
    let graph = load_graph(path)?;
    tracing::info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        shortcuts = graph.shortcut_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "graph loaded"
    );
    Ok(graph)
}

/// `RUST_LOG` wins over the default `info` level. Logs go to stderr so the
/// JSON result on stdout stays parseable.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // A subscriber may already be installed (tests, embedding)
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
