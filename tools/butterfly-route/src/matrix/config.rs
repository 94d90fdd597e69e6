//! Matrix engine configuration

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::types::MatrixStrategy;

/// Default visited-node budget per request.
pub const DEFAULT_MAX_VISITED_NODES: usize = 100_000_000;

/// Default number of sources per hierarchy-restricted batch.
pub const DEFAULT_SOURCE_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub max_visited_nodes: usize,
    pub strategy: MatrixStrategy,
    /// Sources per batch when the target graph is reused across batches
    pub source_batch_size: usize,
    /// Run source batches on the rayon pool
    pub parallel_batches: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            max_visited_nodes: DEFAULT_MAX_VISITED_NODES,
            strategy: MatrixStrategy::Auto,
            source_batch_size: DEFAULT_SOURCE_BATCH_SIZE,
            parallel_batches: true,
        }
    }
}

impl MatrixConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading matrix config {}", path.display()))?;
        let config: MatrixConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing matrix config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_visited_nodes > 0, "max_visited_nodes must be positive");
        anyhow::ensure!(self.source_batch_size > 0, "source_batch_size must be positive");
        Ok(())
    }
}
