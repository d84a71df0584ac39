//! Graph export.
//!
//! Optional GraphML snapshot of the resolved graph, written to the
//! configured snapshot directory under a content-derived filename so a
//! re-export of identical state overwrites rather than accumulates.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::ResolvedGraph;

/// Error type for export operations.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Snapshot directory could not be created or written.
    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the resolved graph as a GraphML document.
///
/// Nodes are service names; edges carry the winning claim's source,
/// dependency type, and confidence as attributes. Output is
/// deterministic for a given graph.
pub fn to_graphml(graph: &ResolvedGraph) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"confidence\" for=\"edge\" attr.name=\"confidence\" attr.type=\"double\"/>\n");
    out.push_str("  <key id=\"source\" for=\"edge\" attr.name=\"source\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"dependency_type\" for=\"edge\" attr.name=\"dependency_type\" attr.type=\"string\"/>\n");
    out.push_str("  <graph id=\"dependencies\" edgedefault=\"directed\">\n");

    for vertex in graph.vertices() {
        out.push_str(&format!("    <node id=\"{}\"/>\n", xml_escape(vertex.as_str())));
    }
    for (i, claim) in graph.edges().enumerate() {
        out.push_str(&format!(
            "    <edge id=\"e{i}\" source=\"{}\" target=\"{}\">\n",
            xml_escape(claim.from_service().as_str()),
            xml_escape(claim.to_service().as_str()),
        ));
        out.push_str(&format!(
            "      <data key=\"confidence\">{:.6}</data>\n",
            claim.confidence()
        ));
        out.push_str(&format!(
            "      <data key=\"source\">{}</data>\n",
            xml_escape(claim.source())
        ));
        out.push_str(&format!(
            "      <data key=\"dependency_type\">{}</data>\n",
            claim.dependency_type()
        ));
        out.push_str("    </edge>\n");
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}

/// Write a GraphML snapshot to `dir/graph-<fingerprint>.graphml`.
///
/// Returns the path written.
pub fn write_graphml(graph: &ResolvedGraph, dir: &Path) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("graph-{}.graphml", graph.fingerprint()));
    let mut file = std::fs::File::create(&path)?;
    file.write_all(to_graphml(graph).as_bytes())?;
    tracing::info!(path = %path.display(), edges = graph.edge_count(), "graph snapshot exported");
    Ok(path)
}
