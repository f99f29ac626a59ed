//! Graph data shared by the view, the relation store and the search engine.
//!
//! Relations are stored directed (`source --relation_type--> target`) but the
//! path search treats them as undirected edges between two nodes.

mod store;
mod view;

pub use store::{Neighbor, RelationStore};
pub use view::{GraphView, InMemoryView, ViewSnapshot};

#[cfg(test)]
pub(crate) use store::tests::{empty_store, sample_store};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque node identifier, e.g. `person:ada`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }
}

/// A single relation in the graph (source --label--> target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Relation id from the store.
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    /// Relation type, e.g. `knows`, `works_at`.
    pub label: String,
}

impl GraphEdge {
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }
}

/// Newly discovered nodes and edges delivered while a search is still running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultBatch {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ResultBatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&NodeId::new("n1")).unwrap();
        assert_eq!(json, "\"n1\"");
    }

    #[test]
    fn test_edge_touches() {
        let edge = GraphEdge {
            id: "r1".to_string(),
            source: "a".into(),
            target: "b".into(),
            label: "knows".to_string(),
        };
        assert!(edge.touches(&"a".into()));
        assert!(edge.touches(&"b".into()));
        assert!(!edge.touches(&"c".into()));
    }
}
