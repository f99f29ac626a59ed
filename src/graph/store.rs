//! Relation store: `graph_nodes` and `entity_relations` in SQLite.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use rusqlite::params;
use uuid::Uuid;

use super::{GraphEdge, GraphNode, NodeId};
use crate::db::Db;
use crate::error::{RelfinderError, Result};

/// A node adjacent to the queried one, with the relation linking them.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub node: NodeId,
    pub edge: GraphEdge,
}

pub struct RelationStore {
    db: Db,
    neighbors: Mutex<LruCache<NodeId, Vec<Neighbor>>>,
}

impl RelationStore {
    pub fn new(db: Db, cache_capacity: usize) -> Self {
        let cap = NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            db,
            neighbors: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Nodes linked to `node` by a relation in either direction.
    pub async fn neighbors(&self, node: &NodeId) -> Result<Vec<Neighbor>> {
        if let Some(hit) = self.cached(node) {
            return Ok(hit);
        }

        let id = node.as_str().to_string();
        let rows = self
            .db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT relation_id, source_entity, relation_type, target_entity \
                     FROM entity_relations \
                     WHERE source_entity = ?1 OR target_entity = ?1 \
                     ORDER BY relation_id",
                )?;
                let rows = stmt
                    .query_map([&id], |row| {
                        Ok(GraphEdge {
                            id: row.get(0)?,
                            source: NodeId::new(row.get::<_, String>(1)?),
                            label: row.get(2)?,
                            target: NodeId::new(row.get::<_, String>(3)?),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        let found: Vec<Neighbor> = rows
            .into_iter()
            .map(|edge| {
                let other = if &edge.source == node {
                    edge.target.clone()
                } else {
                    edge.source.clone()
                };
                Neighbor { node: other, edge }
            })
            .collect();

        if let Ok(mut cache) = self.neighbors.lock() {
            cache.put(node.clone(), found.clone());
        }
        Ok(found)
    }

    fn cached(&self, node: &NodeId) -> Option<Vec<Neighbor>> {
        self.neighbors.lock().ok()?.get(node).cloned()
    }

    /// Labelled nodes for `ids`, in the given order. Ids with no `graph_nodes`
    /// row come back without a label.
    pub async fn resolve_nodes(&self, ids: Vec<NodeId>) -> Result<Vec<GraphNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        let labels: HashMap<String, Option<String>> = self
            .db
            .with_connection(move |conn| {
                let placeholders = keys.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let query = format!(
                    "SELECT node_id, label FROM graph_nodes WHERE node_id IN ({})",
                    placeholders
                );
                let mut stmt = conn.prepare(&query)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(keys.iter()), |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
                    })?
                    .collect::<std::result::Result<HashMap<_, _>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        Ok(ids
            .into_iter()
            .map(|id| {
                let label = labels.get(id.as_str()).cloned().flatten();
                GraphNode { id, label }
            })
            .collect())
    }

    /// Nodes to render before a search: labelled from `graph_nodes` when the
    /// store exists, bare otherwise. Never creates the store file.
    pub async fn endpoint_nodes(&self, ids: Vec<NodeId>) -> Result<Vec<GraphNode>> {
        if !self.db.exists() {
            return Ok(ids.into_iter().map(GraphNode::new).collect());
        }
        self.resolve_nodes(ids).await
    }

    /// Nodes whose id or label contains any of `keywords` (case-insensitive for ASCII).
    pub async fn find_nodes(&self, keywords: &[String]) -> Result<Vec<GraphNode>> {
        let patterns: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| format!("%{}%", k))
            .collect();

        if patterns.is_empty() {
            return Err(RelfinderError::InvalidInput(
                "at least one non-empty keyword is required".to_string(),
            ));
        }

        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, MAX(label) FROM ( \
                         SELECT node_id AS id, label FROM graph_nodes \
                         UNION ALL SELECT source_entity, NULL FROM entity_relations \
                         UNION ALL SELECT target_entity, NULL FROM entity_relations \
                     ) WHERE id LIKE ?1 OR label LIKE ?1 \
                     GROUP BY id ORDER BY id",
                )?;

                let mut out: Vec<GraphNode> = Vec::new();
                for pattern in &patterns {
                    let rows = stmt
                        .query_map([pattern], |row| {
                            Ok(GraphNode {
                                id: NodeId::new(row.get::<_, String>(0)?),
                                label: row.get(1)?,
                            })
                        })?
                        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                    for node in rows {
                        if !out.iter().any(|n| n.id == node.id) {
                            out.push(node);
                        }
                    }
                }
                Ok(out)
            })
            .await
    }

    pub async fn insert_node(&self, node: GraphNode) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO graph_nodes (node_id, label) VALUES (?1, ?2)",
                    params![node.id.as_str(), node.label],
                )?;
                Ok(())
            })
            .await
    }

    /// Store `source --relation_type--> target` and return the new relation id.
    pub async fn insert_relation(
        &self,
        source: &NodeId,
        relation_type: &str,
        target: &NodeId,
    ) -> Result<String> {
        let relation_id = Uuid::new_v4().to_string();
        let row = (
            relation_id.clone(),
            source.as_str().to_string(),
            relation_type.to_string(),
            target.as_str().to_string(),
        );
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO entity_relations (relation_id, source_entity, relation_type, target_entity) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![row.0, row.1, row.2, row.3],
                )?;
                Ok(())
            })
            .await?;

        if let Ok(mut cache) = self.neighbors.lock() {
            cache.pop(source);
            cache.pop(target);
        }
        Ok(relation_id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::migrate;
    use tempfile::TempDir;

    /// Migrated store in a temp dir; keep the TempDir alive for the test.
    pub(crate) async fn empty_store() -> (RelationStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("graph.db"));
        db.with_connection(|conn| migrate::run_migrations(conn).map(|_| ()))
            .await
            .unwrap();
        (RelationStore::new(db, 64), temp_dir)
    }

    /// a - b - c chain plus a - d, with a label on `a`.
    pub(crate) async fn sample_store() -> (RelationStore, TempDir) {
        let (store, temp_dir) = empty_store().await;
        store
            .insert_node(GraphNode {
                id: "person:ada".into(),
                label: Some("Ada Lovelace".to_string()),
            })
            .await
            .unwrap();
        store
            .insert_relation(&"person:ada".into(), "knows", &"person:babbage".into())
            .await
            .unwrap();
        store
            .insert_relation(&"person:babbage".into(), "knows", &"person:cole".into())
            .await
            .unwrap();
        store
            .insert_relation(&"person:dora".into(), "knows", &"person:ada".into())
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_neighbors_are_undirected() {
        let (store, _temp) = sample_store().await;
        let neighbors = store.neighbors(&"person:ada".into()).await.unwrap();
        let mut ids: Vec<_> = neighbors.iter().map(|n| n.node.as_str().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["person:babbage", "person:dora"]);
    }

    #[tokio::test]
    async fn test_neighbors_unknown_node_is_empty() {
        let (store, _temp) = sample_store().await;
        assert!(store.neighbors(&"person:nobody".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_relation_invalidates_cache() {
        let (store, _temp) = sample_store().await;
        let cole: NodeId = "person:cole".into();
        assert_eq!(store.neighbors(&cole).await.unwrap().len(), 1);

        store
            .insert_relation(&cole, "knows", &"person:eve".into())
            .await
            .unwrap();
        assert_eq!(store.neighbors(&cole).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_endpoint_nodes_carry_labels() {
        let (store, _temp) = sample_store().await;
        let nodes = store
            .endpoint_nodes(vec!["person:ada".into(), "person:cole".into()])
            .await
            .unwrap();
        assert_eq!(nodes[0].label.as_deref(), Some("Ada Lovelace"));
        assert_eq!(nodes[1].id, NodeId::from("person:cole"));
    }

    #[tokio::test]
    async fn test_endpoint_nodes_without_store_leave_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = RelationStore::new(Db::new(temp_dir.path().join("absent.db")), 8);
        let nodes = store
            .endpoint_nodes(vec!["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(nodes, vec![GraphNode::new("a"), GraphNode::new("b")]);
        assert!(!store.db().exists());
    }

    #[tokio::test]
    async fn test_resolve_nodes_keeps_order_and_labels() {
        let (store, _temp) = sample_store().await;
        let nodes = store
            .resolve_nodes(vec!["person:cole".into(), "person:ada".into()])
            .await
            .unwrap();
        assert_eq!(nodes[0].id, NodeId::from("person:cole"));
        assert_eq!(nodes[0].label, None);
        assert_eq!(nodes[1].label.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_find_nodes_by_label_and_id() {
        let (store, _temp) = sample_store().await;
        let found = store
            .find_nodes(&["lovelace".to_string(), "cole".to_string()])
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["person:ada", "person:cole"]);
        assert_eq!(found[0].label.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_find_nodes_rejects_blank_keywords() {
        let (store, _temp) = sample_store().await;
        let result = store.find_nodes(&["  ".to_string()]).await;
        assert!(matches!(result, Err(RelfinderError::InvalidInput(_))));
    }
}
