//! Integration tests for the `howell-test-support` fakes: exercise each
//! fake through its trait interface the way a protocol-layer test would.

use howell_core::models::{HandoffPriority, NewTask, NoteCategory, TaskPriority};
use howell_core::repository::{InstanceRegistry, KnowledgeGraphStore, StratigraphyStore, TaskStore};
use mocks::{FakeInstanceRegistry, FakeKnowledgeGraphStore, FakeStratigraphyStore, FakeTaskStore};

#[tokio::test]
async fn fake_task_store_round_trips_create_and_get() {
    let store = FakeTaskStore::default();
    let task = store
        .create(NewTask {
            title: "write tests".into(),
            description: "cover the fakes".into(),
            project: "howell".into(),
            scope: Default::default(),
            priority: TaskPriority::High,
            dependencies: Vec::new(),
            created_by: "agent-1".into(),
        })
        .await
        .unwrap();

    let fetched = store.get(&task.id).await.unwrap();
    assert_eq!(fetched.title, "write tests");
    assert_eq!(fetched.priority, TaskPriority::High);
}

#[tokio::test]
async fn fake_task_store_error_injection() {
    let store = FakeTaskStore::default();
    store.inject_error(howell_core::error::HowellError::internal("boom"));

    let result = store
        .create(NewTask {
            title: "x".into(),
            description: "x".into(),
            project: "x".into(),
            scope: Default::default(),
            priority: TaskPriority::Low,
            dependencies: Vec::new(),
            created_by: "agent-1".into(),
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn fake_knowledge_graph_store_add_entity_and_relation() {
    let store = FakeKnowledgeGraphStore::default();
    store.upsert_entity("alpha", "concept", vec!["a1".into()]).await.unwrap();
    store.upsert_entity("beta", "concept", vec!["b1".into()]).await.unwrap();
    store.add_relation("alpha", "uses", "beta").await.unwrap();

    let graph = store.load().await.unwrap();
    assert_eq!(graph.entities.len(), 2);
    assert_eq!(graph.relations.len(), 1);
}

#[tokio::test]
async fn fake_stratigraphy_store_claim_handoff_once() {
    let store = FakeStratigraphyStore::default();
    let handoff = store
        .create_handoff("agent-1".into(), "ws".into(), "hand off".into(), HandoffPriority::Normal)
        .await
        .unwrap();

    let claimed = store.claim_handoff(handoff.id, "agent-2").await.unwrap();
    assert_eq!(claimed.claimed_by.as_deref(), Some("agent-2"));

    let second = store.claim_handoff(handoff.id, "agent-3").await;
    assert!(second.is_err());
}

#[tokio::test]
async fn fake_stratigraphy_store_records_note_category() {
    let store = FakeStratigraphyStore::default();
    let agent = store
        .register_agent("cli".into(), "ws".into(), "model".into(), None)
        .await
        .unwrap();
    let note = store
        .add_note(&agent.id, NoteCategory::Blocker, "stuck".into(), vec![])
        .await
        .unwrap();
    assert_eq!(note.category, NoteCategory::Blocker);
}

#[tokio::test]
async fn fake_instance_registry_conflict_check() {
    let registry = FakeInstanceRegistry::default();
    let a = registry.register("ws".into(), "cli".into(), "editing".into()).await.unwrap();
    let b = registry.register("ws".into(), "cli".into(), "editing".into()).await.unwrap();

    registry
        .heartbeat(&a.id, None, Some(vec!["src/main.rs".into()]))
        .await
        .unwrap();

    let conflicts = registry
        .check_conflicts(&b.id, &["src/main.rs".to_string()])
        .await
        .unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].other_id, a.id);
}
