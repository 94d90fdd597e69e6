//! Request-level entry point
//!
//! Validates a [`MatrixRequest`], picks an engine, runs it (in source
//! batches for the hierarchy-restricted engine) and extracts the tables.

use std::ops::Range;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::config::MatrixConfig;
use super::dijkstra::{check_nodes, DijkstraManyToMany};
use super::error::{MatrixError, Result};
use super::extractor::MetricsExtractor;
use super::multi_tree::SearchStats;
use super::rphast::RphastEngine;
use super::types::{MatrixRequest, MatrixResult, MatrixStats, MatrixStrategy, MatrixTables};
use crate::filters::{restrictions_confined_to_core, EdgeFilterChain};
use crate::graph::RoutingGraph;
use crate::weighting::Weighting;

/// Rows and counters of one source batch.
struct BatchOutcome {
    tables: MatrixTables,
    stats: SearchStats,
    search: Duration,
    extract: Duration,
}

pub struct MatrixService<'a> {
    graph: &'a RoutingGraph,
    weighting: &'a dyn Weighting,
    config: MatrixConfig,
}

impl<'a> MatrixService<'a> {
    pub fn new(graph: &'a RoutingGraph, weighting: &'a dyn Weighting, config: MatrixConfig) -> Self {
        Self {
            graph,
            weighting,
            config,
        }
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    /// Compute every requested metric for every source/destination pair.
    ///
    /// Unresolved locations yield sentinel rows or columns. Any engine
    /// failure, including an exhausted budget in one batch, fails the
    /// whole request.
    pub fn compute(&self, request: &MatrixRequest) -> Result<MatrixResult> {
        let started = Instant::now();

        if request.metrics.is_empty() {
            return Err(MatrixError::InvalidRequest(
                "at least one metric must be requested".to_string(),
            ));
        }
        let limit = request
            .max_visited_nodes
            .unwrap_or(self.config.max_visited_nodes);
        if limit == 0 {
            return Err(MatrixError::InvalidRequest(
                "max_visited_nodes must be positive".to_string(),
            ));
        }
        if self.config.source_batch_size == 0 {
            return Err(MatrixError::Configuration(
                "source_batch_size must be positive".to_string(),
            ));
        }
        check_nodes(self.graph, request.sources.nodes(), "source")?;
        check_nodes(self.graph, request.destinations.nodes(), "destination")?;

        let restrictions = EdgeFilterChain::from_options(&request.options);
        let strategy =
            self.select_strategy(request.strategy.unwrap_or(self.config.strategy), &restrictions)?;

        let n_sources = request.sources.len();
        let n_destinations = request.destinations.len();
        let mut stats = MatrixStats {
            n_sources,
            n_destinations,
            resolved_sources: request.sources.resolved_count(),
            resolved_destinations: request.destinations.resolved_count(),
            ..Default::default()
        };

        let mut tables = MatrixTables::allocate(n_sources, n_destinations, request.metrics);
        if stats.resolved_sources == 0 || stats.resolved_destinations == 0 {
            tracing::debug!(
                sources = n_sources,
                destinations = n_destinations,
                "no resolved sources or destinations, skipping search"
            );
            stats.total_time_ms = as_millis(started.elapsed());
            return Ok(MatrixResult {
                tables,
                units: request.units,
                strategy,
                stats,
            });
        }

        let extractor = MetricsExtractor::new(self.graph, self.weighting, request.units);
        match strategy {
            MatrixStrategy::Rphast => {
                tables = self.run_rphast(request, &restrictions, limit, &extractor, &mut stats)?;
            }
            _ => {
                let search_started = Instant::now();
                let search = DijkstraManyToMany::new(self.graph, self.weighting, &restrictions, limit)
                    .calc_paths(request.sources.nodes(), request.destinations.nodes())?;
                stats.search_time_ms = as_millis(search_started.elapsed());

                let extract_started = Instant::now();
                extractor.extract(&search, &request.sources, &request.destinations, &mut tables)?;
                stats.extract_time_ms = as_millis(extract_started.elapsed());

                stats.batches = 1;
                stats.dijkstra_visited = search.stats.dijkstra_visited;
            }
        }

        stats.total_time_ms = as_millis(started.elapsed());
        tracing::debug!(
            strategy = ?strategy,
            sources = n_sources,
            destinations = n_destinations,
            batches = stats.batches,
            visited = stats.upward_visited
                + stats.core_visited
                + stats.downward_visited
                + stats.dijkstra_visited,
            total_ms = stats.total_time_ms,
            "matrix computed"
        );

        Ok(MatrixResult {
            tables,
            units: request.units,
            strategy,
            stats,
        })
    }

    /// Resolve `Auto` and reject combinations the graph cannot serve.
    ///
    /// The hierarchy-restricted engine enforces restrictions inside the core
    /// only. When the restrictions reject any edge outside it, `Auto` falls
    /// back to the general engine and an explicit `Rphast` is refused.
    fn select_strategy(
        &self,
        requested: MatrixStrategy,
        restrictions: &EdgeFilterChain,
    ) -> Result<MatrixStrategy> {
        if requested == MatrixStrategy::Dijkstra {
            return Ok(MatrixStrategy::Dijkstra);
        }
        if self.graph.hierarchy().is_none() {
            return match requested {
                MatrixStrategy::Rphast => Err(MatrixError::Configuration(
                    "rphast strategy requires a graph with contraction levels".to_string(),
                )),
                _ => Ok(MatrixStrategy::Dijkstra),
            };
        }

        if restrictions_confined_to_core(self.graph, restrictions) {
            return Ok(MatrixStrategy::Rphast);
        }
        match requested {
            MatrixStrategy::Rphast => Err(MatrixError::Configuration(
                "route restrictions reject edges outside the core, which the rphast strategy cannot honour"
                    .to_string(),
            )),
            _ => {
                tracing::debug!("restricted edges outside the core, using dijkstra");
                Ok(MatrixStrategy::Dijkstra)
            }
        }
    }

    fn run_rphast(
        &self,
        request: &MatrixRequest,
        restrictions: &EdgeFilterChain,
        limit: usize,
        extractor: &MetricsExtractor<'_>,
        stats: &mut MatrixStats,
    ) -> Result<MatrixTables> {
        let prepare_started = Instant::now();
        let engine = RphastEngine::prepare(self.graph, self.weighting, request.destinations.nodes())?;
        stats.prepare_time_ms = as_millis(prepare_started.elapsed());

        let target_graph = engine.target_graph();
        stats.target_graph_nodes = target_graph.sub_graph.node_count();
        stats.target_graph_edges = target_graph.sub_graph.edge_count();
        stats.core_exit_points = target_graph.core_exit_points.len();

        let batches = batch_ranges(request.sources.len(), self.config.source_batch_size);
        stats.batches = batches.len();

        let run = |range: &Range<usize>| -> Result<BatchOutcome> {
            let sources = request.sources.slice(range.start, range.end);
            let search_started = Instant::now();
            let search = engine.calc_paths(sources.nodes(), restrictions, limit)?;
            let search_time = search_started.elapsed();

            let extract_started = Instant::now();
            let mut tables = MatrixTables::allocate(
                sources.len(),
                request.destinations.len(),
                request.metrics,
            );
            extractor.extract(&search, &sources, &request.destinations, &mut tables)?;
            Ok(BatchOutcome {
                tables,
                stats: search.stats,
                search: search_time,
                extract: extract_started.elapsed(),
            })
        };

        let outcomes: Vec<BatchOutcome> = if self.config.parallel_batches && batches.len() > 1 {
            batches.par_iter().map(run).collect::<Result<_>>()?
        } else {
            batches.iter().map(run).collect::<Result<_>>()?
        };

        // Rows are stitched back in source order; timings are summed over batches
        let mut tables = MatrixTables::allocate(0, request.destinations.len(), request.metrics);
        let mut search_time = Duration::ZERO;
        let mut extract_time = Duration::ZERO;
        for outcome in outcomes {
            stats.upward_visited += outcome.stats.upward_visited;
            stats.core_visited += outcome.stats.core_visited;
            stats.downward_visited += outcome.stats.downward_visited;
            stats.core_entry_points += outcome.stats.core_entry_points;
            search_time += outcome.search;
            extract_time += outcome.extract;
            tables.append_rows(outcome.tables);
        }
        stats.search_time_ms = as_millis(search_time);
        stats.extract_time_ms = as_millis(extract_time);

        Ok(tables)
    }
}

fn batch_ranges(n: usize, batch_size: usize) -> Vec<Range<usize>> {
    (0..n)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(n))
        .collect()
}

fn as_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
