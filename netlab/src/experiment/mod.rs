//! The experiment drivers.

pub mod congestion;
pub mod routing;

use anyhow::{Context, Result};
use netlab_topo::TopologySpec;
use std::path::Path;

/// Writes the topology to a JSON graph file.
pub fn dump_graph(topo: &TopologySpec, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(topo).context("failed to serialize topology")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write graph to {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote topology graph");
    Ok(())
}
