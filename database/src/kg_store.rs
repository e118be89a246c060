use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use howell_core::{
    error::{HowellError, Result},
    models::{Entity, KnowledgeGraph, Relation},
    repository::KnowledgeGraphStore,
};

use crate::atomic_file::{ensure_parent_dir, load_with_fallback, write_atomic};

/// JSON-file-backed knowledge graph store (spec.md §4.2). The whole
/// document is loaded under the store's mutex, mutated in memory, and
/// written back atomically before the mutex is released.
pub struct JsonKnowledgeGraphStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonKnowledgeGraphStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<KnowledgeGraph> {
        load_with_fallback(&self.path).await
    }

    async fn write(&self, graph: &KnowledgeGraph) -> Result<()> {
        ensure_parent_dir(&self.path).await?;
        write_atomic(&self.path, graph).await
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl KnowledgeGraphStore for JsonKnowledgeGraphStore {
    async fn load(&self) -> Result<KnowledgeGraph> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn upsert_entity(&self, name: &str, entity_type: &str, observations: Vec<String>) -> Result<Entity> {
        let _guard = self.lock.lock().await;
        let mut graph = self.read().await?;
        let entity = graph
            .entities
            .entry(name.to_string())
            .or_insert_with(|| Entity {
                name: name.to_string(),
                entity_type: entity_type.to_string(),
                observations: Vec::new(),
                created_at: Utc::now(),
            });
        entity.entity_type = entity_type.to_string();
        for obs in observations {
            if !entity.observations.contains(&obs) {
                entity.observations.push(obs);
            }
        }
        let result = entity.clone();
        graph.last_sync = Some(Utc::now());
        self.write(&graph).await?;
        Ok(result)
    }

    async fn add_observation(&self, name: &str, observation: String) -> Result<Entity> {
        let _guard = self.lock.lock().await;
        let mut graph = self.read().await?;
        let entity = graph
            .entities
            .get_mut(name)
            .ok_or_else(|| HowellError::not_found(format!("entity '{name}'")))?;
        if !entity.observations.contains(&observation) {
            entity.observations.push(observation);
        }
        let result = entity.clone();
        graph.last_sync = Some(Utc::now());
        self.write(&graph).await?;
        Ok(result)
    }

    async fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        let _guard = self.lock.lock().await;
        let graph = self.read().await?;
        Ok(graph.entities.get(name).cloned())
    }

    async fn delete_entity(&self, name: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut graph = self.read().await?;
        if graph.entities.remove(name).is_none() {
            return Err(HowellError::not_found(format!("entity '{name}'")));
        }
        graph
            .relations
            .retain(|r| r.from_entity != name && r.to_entity != name);
        graph.last_sync = Some(Utc::now());
        self.write(&graph).await
    }

    async fn delete_observation_by_substring(&self, name: &str, substring: &str) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut graph = self.read().await?;
        let entity = graph
            .entities
            .get_mut(name)
            .ok_or_else(|| HowellError::not_found(format!("entity '{name}'")))?;
        let before = entity.observations.len();
        entity.observations.retain(|o| !contains_ci(o, substring));
        let removed = before - entity.observations.len();
        graph.last_sync = Some(Utc::now());
        self.write(&graph).await?;
        Ok(removed)
    }

    async fn add_relation(&self, from_entity: &str, relation_type: &str, to_entity: &str) -> Result<Relation> {
        let _guard = self.lock.lock().await;
        let mut graph = self.read().await?;
        if !graph.entities.contains_key(from_entity) {
            return Err(HowellError::not_found(format!("entity '{from_entity}'")));
        }
        if !graph.entities.contains_key(to_entity) {
            return Err(HowellError::not_found(format!("entity '{to_entity}'")));
        }
        let relation = Relation {
            from_entity: from_entity.to_string(),
            relation_type: relation_type.to_string(),
            to_entity: to_entity.to_string(),
            created_at: Utc::now(),
        };
        let already_present = graph.relations.iter().any(|r| {
            r.from_entity == relation.from_entity
                && r.relation_type == relation.relation_type
                && r.to_entity == relation.to_entity
        });
        if !already_present {
            graph.relations.push(relation.clone());
        }
        graph.last_sync = Some(Utc::now());
        self.write(&graph).await?;
        Ok(relation)
    }

    async fn delete_relation(&self, from_entity: &str, relation_type: &str, to_entity: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut graph = self.read().await?;
        let before = graph.relations.len();
        graph.relations.retain(|r| {
            !(r.from_entity == from_entity && r.relation_type == relation_type && r.to_entity == to_entity)
        });
        if graph.relations.len() == before {
            return Err(HowellError::not_found("relation"));
        }
        graph.last_sync = Some(Utc::now());
        self.write(&graph).await
    }

    async fn rename_entity(&self, old_name: &str, new_name: &str) -> Result<Entity> {
        let _guard = self.lock.lock().await;
        let mut graph = self.read().await?;
        if graph.entities.contains_key(new_name) {
            return Err(HowellError::conflict(format!(
                "entity '{new_name}' already exists"
            )));
        }
        let mut entity = graph
            .entities
            .remove(old_name)
            .ok_or_else(|| HowellError::not_found(format!("entity '{old_name}'")))?;
        entity.name = new_name.to_string();
        for relation in graph.relations.iter_mut() {
            if relation.from_entity == old_name {
                relation.from_entity = new_name.to_string();
            }
            if relation.to_entity == old_name {
                relation.to_entity = new_name.to_string();
            }
        }
        graph.entities.insert(new_name.to_string(), entity.clone());
        graph.last_sync = Some(Utc::now());
        self.write(&graph).await?;
        Ok(entity)
    }

    async fn merge_entities(&self, source: &str, target: &str) -> Result<Entity> {
        let _guard = self.lock.lock().await;
        let mut graph = self.read().await?;
        if !graph.entities.contains_key(target) {
            return Err(HowellError::not_found(format!("entity '{target}'")));
        }
        let src = graph
            .entities
            .remove(source)
            .ok_or_else(|| HowellError::not_found(format!("entity '{source}'")))?;

        for relation in graph.relations.iter_mut() {
            if relation.from_entity == source {
                relation.from_entity = target.to_string();
            }
            if relation.to_entity == source {
                relation.to_entity = target.to_string();
            }
        }
        // Drop self-loops created by the redirect, then dedup by full triple.
        graph.relations.retain(|r| r.from_entity != r.to_entity);
        let mut seen = std::collections::HashSet::new();
        graph.relations.retain(|r| {
            seen.insert((r.from_entity.clone(), r.relation_type.clone(), r.to_entity.clone()))
        });

        let target_entity = graph.entities.get_mut(target).expect("checked above");
        for obs in src.observations {
            if !target_entity.observations.contains(&obs) {
                target_entity.observations.push(obs);
            }
        }
        let result = target_entity.clone();
        graph.last_sync = Some(Utc::now());
        self.write(&graph).await?;
        Ok(result)
    }

    async fn search(&self, query: &str) -> Result<Vec<Entity>> {
        let _guard = self.lock.lock().await;
        let graph = self.read().await?;
        let mut matches: Vec<Entity> = graph
            .entities
            .values()
            .filter(|e| {
                contains_ci(&e.name, query)
                    || contains_ci(&e.entity_type, query)
                    || e.observations.iter().any(|o| contains_ci(o, query))
            })
            .cloned()
            .collect();
        let relation_matches: std::collections::HashSet<String> = graph
            .relations
            .iter()
            .filter(|r| {
                contains_ci(&r.from_entity, query)
                    || contains_ci(&r.relation_type, query)
                    || contains_ci(&r.to_entity, query)
            })
            .flat_map(|r| [r.from_entity.clone(), r.to_entity.clone()])
            .collect();
        for name in relation_matches {
            if let Some(e) = graph.entities.get(&name) {
                if !matches.iter().any(|m| m.name == e.name) {
                    matches.push(e.clone());
                }
            }
        }
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matches)
    }

    async fn stats(&self) -> Result<(usize, usize)> {
        let _guard = self.lock.lock().await;
        let graph = self.read().await?;
        Ok((graph.entities.len(), graph.relations.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> JsonKnowledgeGraphStore {
        JsonKnowledgeGraphStore::new(dir.path().join("knowledge.json"))
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_unions_observations() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.upsert_entity("alpha", "concept", vec!["a1".into()]).await.unwrap();
        let e = store
            .upsert_entity("alpha", "concept", vec!["a1".into(), "a2".into()])
            .await
            .unwrap();
        assert_eq!(e.observations, vec!["a1".to_string(), "a2".to_string()]);
    }

    #[tokio::test]
    async fn add_relation_refuses_missing_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.upsert_entity("alpha", "t", vec![]).await.unwrap();
        let err = store.add_relation("alpha", "uses", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_entity_cascades_relations() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.upsert_entity("alpha", "t", vec![]).await.unwrap();
        store.upsert_entity("beta", "t", vec![]).await.unwrap();
        store.add_relation("alpha", "uses", "beta").await.unwrap();
        store.delete_entity("alpha").await.unwrap();
        let graph = store.load().await.unwrap();
        assert!(graph.relations.is_empty());
    }

    #[tokio::test]
    async fn rename_rewrites_relations_and_refuses_collision() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.upsert_entity("alpha", "t", vec![]).await.unwrap();
        store.upsert_entity("beta", "t", vec![]).await.unwrap();
        store.add_relation("alpha", "uses", "beta").await.unwrap();
        store.rename_entity("alpha", "gamma").await.unwrap();
        let graph = store.load().await.unwrap();
        assert!(graph.entities.contains_key("gamma"));
        assert_eq!(graph.relations[0].from_entity, "gamma");

        let err = store.rename_entity("beta", "gamma").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn merge_unions_observations_drops_self_loops_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.upsert_entity("alpha", "t", vec!["a1".into(), "a2".into()]).await.unwrap();
        store.upsert_entity("beta", "t", vec!["a2".into(), "b1".into()]).await.unwrap();
        store.upsert_entity("gamma", "t", vec![]).await.unwrap();
        store.add_relation("alpha", "uses", "gamma").await.unwrap();
        store.add_relation("beta", "uses", "gamma").await.unwrap();
        store.add_relation("alpha", "owns", "beta").await.unwrap();

        let merged = store.merge_entities("beta", "alpha").await.unwrap();
        let mut obs = merged.observations.clone();
        obs.sort();
        assert_eq!(obs, vec!["a1".to_string(), "a2".to_string(), "b1".to_string()]);

        let graph = store.load().await.unwrap();
        assert!(!graph.entities.contains_key("beta"));
        assert!(!graph.relations.iter().any(|r| r.to_entity == "beta" || r.from_entity == "beta"));
        assert!(!graph.relations.iter().any(|r| r.from_entity == "alpha" && r.to_entity == "alpha"));
        let uses_gamma = graph
            .relations
            .iter()
            .filter(|r| r.from_entity == "alpha" && r.relation_type == "uses" && r.to_entity == "gamma")
            .count();
        assert_eq!(uses_gamma, 1);
    }

    #[tokio::test]
    async fn search_matches_name_type_and_observations() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.upsert_entity("Alpha Project", "project", vec!["uses Rust".into()]).await.unwrap();
        assert_eq!(store.search("rust").await.unwrap().len(), 1);
        assert_eq!(store.search("ALPHA").await.unwrap().len(), 1);
        assert_eq!(store.search("nomatch").await.unwrap().len(), 0);
    }
}
