//! Static node list.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arbiter_core::NodeTarget;

/// Load the nodes to query from a JSON array of
/// `{"id": u16, "address": {"ip": "...", "port": u16}}` objects.
pub fn load_nodes(path: &Path) -> Result<Vec<NodeTarget>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read node list {}", path.display()))?;
    let nodes: Vec<NodeTarget> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse node list {}", path.display()))?;

    if nodes.is_empty() {
        bail!("node list {} is empty", path.display());
    }
    let mut ids = HashSet::new();
    if let Some(dup) = nodes.iter().find(|n| !ids.insert(n.id)) {
        bail!("node {} is listed more than once in {}", dup.id, path.display());
    }
    Ok(nodes)
}
