//! The rendered graph: what the user currently sees.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{GraphEdge, GraphNode, NodeId, ResultBatch};

/// Nodes and edges currently rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ViewSnapshot {
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }
}

/// Graph display the relation session prunes and streams results into.
pub trait GraphView {
    /// Delete every node whose id is not in `keep`, together with its edges.
    fn prune_nodes_except(&mut self, keep: &[NodeId]);

    fn has_any_edges(&self) -> bool;

    /// Merge an incremental batch; already present nodes and edges are kept as is.
    fn apply_batch(&mut self, batch: &ResultBatch);

    fn clear(&mut self);

    fn snapshot(&self) -> ViewSnapshot;
}

#[derive(Debug, Default)]
pub struct InMemoryView {
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: BTreeMap<String, GraphEdge>,
}

impl InMemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// View already showing `nodes`, such as the two endpoints of a search.
    pub fn with_nodes(nodes: impl IntoIterator<Item = GraphNode>) -> Self {
        let mut view = Self::new();
        for node in nodes {
            view.add_node(node);
        }
        view
    }

    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Adds the edge and any endpoint not yet rendered.
    pub fn add_edge(&mut self, edge: GraphEdge) {
        for id in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(id) {
                self.nodes.insert(id.clone(), GraphNode::new(id.clone()));
            }
        }
        self.edges.insert(edge.id.clone(), edge);
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl GraphView for InMemoryView {
    fn prune_nodes_except(&mut self, keep: &[NodeId]) {
        self.nodes.retain(|id, _| keep.contains(id));
        let nodes = &self.nodes;
        self.edges
            .retain(|_, e| nodes.contains_key(&e.source) && nodes.contains_key(&e.target));
    }

    fn has_any_edges(&self) -> bool {
        !self.edges.is_empty()
    }

    fn apply_batch(&mut self, batch: &ResultBatch) {
        for node in &batch.nodes {
            self.nodes
                .entry(node.id.clone())
                .or_insert_with(|| node.clone());
        }
        for edge in &batch.edges {
            if !self.edges.contains_key(&edge.id) {
                self.add_edge(edge.clone());
            }
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: &str, source: &str, target: &str) -> GraphEdge {
        GraphEdge {
            id: id.to_string(),
            source: source.into(),
            target: target.into(),
            label: "knows".to_string(),
        }
    }

    fn populated() -> InMemoryView {
        let mut view = InMemoryView::new();
        view.add_edge(edge("r1", "n1", "x"));
        view.add_edge(edge("r2", "x", "n2"));
        view.add_edge(edge("r3", "n1", "n2"));
        view.add_node(GraphNode::new("lonely"));
        view
    }

    #[test]
    fn test_prune_keeps_only_retained_nodes() {
        let mut view = populated();
        view.prune_nodes_except(&["n1".into(), "n2".into()]);

        let snapshot = view.snapshot();
        assert_eq!(snapshot.node_ids(), vec![NodeId::from("n1"), NodeId::from("n2")]);
        // r3 connects two retained nodes and survives
        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.edges[0].id, "r3");
    }

    #[test]
    fn test_prune_ignores_unknown_ids() {
        let mut view = populated();
        view.prune_nodes_except(&["missing".into()]);
        assert_eq!(view.node_count(), 0);
        assert!(!view.has_any_edges());
    }

    #[test]
    fn test_apply_batch_is_idempotent() {
        let mut view = InMemoryView::new();
        let batch = ResultBatch {
            nodes: vec![GraphNode::new("a"), GraphNode::new("b")],
            edges: vec![edge("r1", "a", "b")],
        };
        view.apply_batch(&batch);
        view.apply_batch(&batch);
        assert_eq!(view.node_count(), 2);
        assert_eq!(view.edge_count(), 1);
    }

    #[test]
    fn test_apply_batch_adds_missing_endpoints() {
        let mut view = InMemoryView::new();
        view.apply_batch(&ResultBatch {
            nodes: vec![],
            edges: vec![edge("r1", "a", "b")],
        });
        assert!(view.contains_node(&"a".into()));
        assert!(view.contains_node(&"b".into()));
    }

    #[test]
    fn test_clear() {
        let mut view = populated();
        view.clear();
        assert_eq!(view.snapshot(), ViewSnapshot::default());
    }
}
