//! Graph export as a single streamed JSON document
//!
//! Output shape:
//!
//! ```json
//! {"nodes":[{"id":1,"label":"https://example.com","external":false,"group":"1"}],
//!  "edges":[{"from":1,"to":2,"kind":"hyperlink"}]}
//! ```
//!
//! Nodes and edges are read in keyset-paged chunks so a large graph is never
//! held in memory at once.

use crate::storage::{EdgeRecord, LinkType, NodeRecord, Storage};
use crate::CrawlError;
use serde::Serialize;
use std::io::Write;

/// Nodes read per query
pub const NODE_CHUNK_SIZE: usize = 100;

/// Edges read per query
pub const EDGE_CHUNK_SIZE: usize = 200;

#[derive(Debug, Serialize)]
struct GraphNode<'a> {
    id: i64,
    label: &'a str,
    external: bool,
    /// "0" external, "1" internal
    group: &'static str,
}

impl<'a> From<&'a NodeRecord> for GraphNode<'a> {
    fn from(node: &'a NodeRecord) -> Self {
        Self {
            id: node.id,
            label: &node.url,
            external: node.is_external,
            group: if node.is_external { "0" } else { "1" },
        }
    }
}

#[derive(Debug, Serialize)]
struct GraphEdge {
    from: i64,
    to: i64,
    kind: LinkType,
}

impl From<&EdgeRecord> for GraphEdge {
    fn from(edge: &EdgeRecord) -> Self {
        Self {
            from: edge.source_id,
            to: edge.target_id,
            kind: edge.link_type,
        }
    }
}

/// Counts of what was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphExport {
    pub nodes: u64,
    pub edges: u64,
}

/// Writes a job's graph as JSON
///
/// # Arguments
///
/// * `store` - Storage to read from
/// * `job_id` - The job whose graph is exported
/// * `writer` - Destination (stdout, a file, a buffer)
///
/// # Returns
///
/// * `Ok(GraphExport)` - Number of nodes and edges written
/// * `Err(CrawlError)` - Storage, serialization or IO failure
pub fn write_graph_json<W: Write>(
    store: &dyn Storage,
    job_id: &str,
    writer: &mut W,
) -> Result<GraphExport, CrawlError> {
    let mut export = GraphExport::default();

    writer.write_all(b"{\"nodes\":[")?;
    let mut after_id = 0;
    loop {
        let chunk = store.nodes_after(job_id, after_id, NODE_CHUNK_SIZE)?;
        for node in &chunk {
            if export.nodes > 0 {
                writer.write_all(b",")?;
            }
            serde_json::to_writer(&mut *writer, &GraphNode::from(node))?;
            export.nodes += 1;
        }
        match chunk.last() {
            Some(last) if chunk.len() == NODE_CHUNK_SIZE => after_id = last.id,
            _ => break,
        }
    }

    writer.write_all(b"],\"edges\":[")?;
    let mut after_id = 0;
    loop {
        let chunk = store.edges_after(job_id, after_id, EDGE_CHUNK_SIZE)?;
        for edge in &chunk {
            if export.edges > 0 {
                writer.write_all(b",")?;
            }
            serde_json::to_writer(&mut *writer, &GraphEdge::from(edge))?;
            export.edges += 1;
        }
        match chunk.last() {
            Some(last) if chunk.len() == EDGE_CHUNK_SIZE => after_id = last.id,
            _ => break,
        }
    }

    writer.write_all(b"]}")?;
    writer.flush()?;

    tracing::debug!(
        "Exported graph for job {}: {} nodes, {} edges",
        job_id,
        export.nodes,
        export.edges
    );

    Ok(export)
}
