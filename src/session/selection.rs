//! The user's node choice, read live by the session on every start.

use std::sync::RwLock;

use crate::error::Result;
use crate::graph::{GraphNode, NodeId, RelationStore};

pub trait NodeSelector: Send + Sync {
    /// Chosen node ids, in the order they were picked.
    fn current_selection(&self) -> Vec<NodeId>;

    /// Replace the selection.
    fn select(&self, ids: Vec<NodeId>);
}

/// Shared selection that the picking side writes and the session reads.
#[derive(Debug, Default)]
pub struct NodeSelection {
    ids: RwLock<Vec<NodeId>>,
}

impl NodeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        Self {
            ids: RwLock::new(ids.into_iter().map(Into::into).collect()),
        }
    }
}

impl NodeSelector for NodeSelection {
    fn current_selection(&self) -> Vec<NodeId> {
        self.ids.read().map(|ids| ids.clone()).unwrap_or_default()
    }

    fn select(&self, ids: Vec<NodeId>) {
        if let Ok(mut current) = self.ids.write() {
            *current = ids;
        }
    }
}

/// Select the nodes matching `keywords` and return them.
pub async fn pickup(
    store: &RelationStore,
    selector: &dyn NodeSelector,
    keywords: &[String],
) -> Result<Vec<GraphNode>> {
    let nodes = store.find_nodes(keywords).await?;
    log::info!("pickup {:?}: {} nodes", keywords, nodes.len());
    selector.select(nodes.iter().map(|n| n.id.clone()).collect());
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::sample_store;

    #[test]
    fn test_select_replaces_selection() {
        let selection = NodeSelection::with_ids(["n1"]);
        selection.select(vec!["n2".into(), "n3".into()]);
        assert_eq!(
            selection.current_selection(),
            vec![NodeId::from("n2"), NodeId::from("n3")]
        );
    }

    #[tokio::test]
    async fn test_pickup_selects_matches() {
        let (store, _temp) = sample_store().await;
        let selection = NodeSelection::new();

        let nodes = pickup(&store, &selection, &["ada".to_string(), "cole".to_string()])
            .await
            .unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(
            selection.current_selection(),
            vec![NodeId::from("person:ada"), NodeId::from("person:cole")]
        );
    }
}
