//! End-to-end coordination scenarios (spec.md §8), driven against a real
//! `Coordinator` wired to the on-disk stores: a JSON task store, a
//! SQLite stratigraphy store, and the in-memory instance registry.
//! Each test stands up its own tempdir so runs never interfere.

use std::sync::Arc;

use howell_core::models::{HandoffPriority, NewTask, NoteCategory, TaskPriority, TaskScope};
use howell_core::{Config, Coordinator};

async fn coordinator() -> (tempfile::TempDir, Arc<Coordinator>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.persist_root = dir.path().to_string_lossy().to_string();
    let coordinator = mcp_server::build_coordinator(config).await.expect("build_coordinator");
    (dir, coordinator)
}

fn scoped(tags: &[&str]) -> TaskScope {
    TaskScope {
        files: Vec::new(),
        directories: Vec::new(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// S1 - Scope conflict: claiming A blocks B (overlapping tag `"ui"`)
/// from availability and from a second instance's claim attempt.
#[tokio::test]
async fn s1_scope_conflict() {
    let (_dir, coordinator) = coordinator().await;

    let a = coordinator
        .tasks
        .create(NewTask {
            title: "Task A".into(),
            description: "touches the UI".into(),
            project: "p".into(),
            scope: scoped(&["ui"]),
            priority: TaskPriority::Medium,
            dependencies: Vec::new(),
            created_by: "tester".into(),
        })
        .await
        .unwrap();
    let b = coordinator
        .tasks
        .create(NewTask {
            title: "Task B".into(),
            description: "touches UI copy".into(),
            project: "p".into(),
            scope: scoped(&["ui", "copy"]),
            priority: TaskPriority::Medium,
            dependencies: Vec::new(),
            created_by: "tester".into(),
        })
        .await
        .unwrap();

    coordinator.tasks.claim(&a.id, "instance-x").await.unwrap();

    let available = coordinator.tasks.available().await.unwrap();
    assert!(available.iter().all(|t| t.id != b.id), "B must not be available while A holds an overlapping scope");

    let claim_b = coordinator.tasks.claim(&b.id, "instance-y").await;
    assert!(claim_b.is_err(), "claiming B must fail while its scope overlaps A's");
}

/// S2 - Dependency gate: B (depends on A) is hidden from availability
/// until A completes, then appears.
#[tokio::test]
async fn s2_dependency_gate() {
    let (_dir, coordinator) = coordinator().await;

    let a = coordinator
        .tasks
        .create(NewTask {
            title: "Task A".into(),
            description: "prerequisite".into(),
            project: "p".into(),
            scope: TaskScope::default(),
            priority: TaskPriority::Medium,
            dependencies: Vec::new(),
            created_by: "tester".into(),
        })
        .await
        .unwrap();
    let b = coordinator
        .tasks
        .create(NewTask {
            title: "Task B".into(),
            description: "depends on A".into(),
            project: "p".into(),
            scope: TaskScope::default(),
            priority: TaskPriority::Medium,
            dependencies: vec![a.id.clone()],
            created_by: "tester".into(),
        })
        .await
        .unwrap();

    let available = coordinator.tasks.available().await.unwrap();
    assert!(available.iter().all(|t| t.id != b.id), "B must be blocked until A completes");

    coordinator.tasks.claim(&a.id, "instance-x").await.unwrap();
    coordinator.tasks.complete(&a.id, "instance-x", "done".into(), Vec::new()).await.unwrap();

    let available = coordinator.tasks.available().await.unwrap();
    assert!(available.iter().any(|t| t.id == b.id), "B must become available once A completes");
}

/// S3 - Auto-release on deregister: a task claimed and started by an
/// instance returns to pending, with the original note plus an
/// auto-release note, when that instance disconnects.
#[tokio::test]
async fn s3_auto_release_on_deregister() {
    let (_dir, coordinator) = coordinator().await;

    let instance = coordinator.instances.register("ws".into(), "claude-code".into(), "idle".into()).await.unwrap();
    let task = coordinator
        .tasks
        .create(NewTask {
            title: "Task A".into(),
            description: "will be abandoned".into(),
            project: "p".into(),
            scope: TaskScope::default(),
            priority: TaskPriority::Medium,
            dependencies: Vec::new(),
            created_by: "tester".into(),
        })
        .await
        .unwrap();

    coordinator.tasks.claim(&task.id, &instance.id).await.unwrap();
    coordinator.tasks.start(&task.id, &instance.id).await.unwrap();
    coordinator.tasks.add_progress_note(&task.id, &instance.id, "halfway".into()).await.unwrap();

    coordinator.instances.deregister(&instance.id).await.unwrap();
    let released = coordinator.auto_release_instance(&instance.id).await.unwrap();
    assert_eq!(released.len(), 1);

    let task = coordinator.tasks.get(&task.id).await.unwrap();
    assert_eq!(task.status, howell_core::models::TaskStatus::Pending);
    assert!(task.claimed_by.is_none());
    let texts: Vec<_> = task.progress_notes.iter().map(|n| n.text.as_str()).collect();
    assert!(texts.iter().any(|t| *t == "halfway"));
    assert!(texts.len() >= 2, "expected the original note plus an auto-release note, got {texts:?}");
}

/// S4 - Handoff race: of two back-to-back claims on the same handoff,
/// exactly one succeeds; the other fails, and the handoff no longer
/// appears among unclaimed handoffs for its scope.
#[tokio::test]
async fn s4_handoff_race() {
    let (_dir, coordinator) = coordinator().await;

    let agent = coordinator.stratigraphy.register_agent("claude-code".into(), "w".into(), "opus".into(), None).await.unwrap();
    let handoff = coordinator
        .stratigraphy
        .create_handoff(agent.id.clone(), "w".into(), "please continue this".into(), HandoffPriority::Normal)
        .await
        .unwrap();

    let first = coordinator.stratigraphy.claim_handoff(handoff.id, "g1").await;
    let second = coordinator.stratigraphy.claim_handoff(handoff.id, "g2").await;

    assert!(first.is_ok() ^ second.is_ok(), "exactly one of the two racing claims must succeed");

    let unclaimed = coordinator.stratigraphy.list_handoffs("w", true).await.unwrap();
    assert!(unclaimed.iter().all(|h| h.id != handoff.id));
}

/// S5 - Merge semantics: merging beta into alpha unions observations,
/// redirects relations, drops the resulting self-loop, and removes
/// every trace of beta.
#[tokio::test]
async fn s5_merge_semantics() {
    let (_dir, coordinator) = coordinator().await;
    let graph = &coordinator.graph;

    graph.upsert_entity("alpha", "concept", vec!["a1".into(), "a2".into()]).await.unwrap();
    graph.upsert_entity("beta", "concept", vec!["a2".into(), "b1".into()]).await.unwrap();
    graph.upsert_entity("gamma", "concept", Vec::new()).await.unwrap();

    graph.add_relation("alpha", "uses", "gamma").await.unwrap();
    graph.add_relation("beta", "uses", "gamma").await.unwrap();
    graph.add_relation("alpha", "owns", "beta").await.unwrap();

    let merged = graph.merge_entities("beta", "alpha").await.unwrap();
    assert_eq!(merged.name, "alpha");

    let mut observations = merged.observations.clone();
    observations.sort();
    assert_eq!(observations, vec!["a1".to_string(), "a2".to_string(), "b1".to_string()]);

    assert!(graph.get_entity("beta").await.unwrap().is_none());

    let full = graph.load().await.unwrap();
    assert!(full.entities.iter().all(|(name, _)| name != "beta"));
    assert!(full
        .relations
        .iter()
        .all(|r| r.from_entity != "beta" && r.to_entity != "beta"));
    assert!(full.relations.iter().all(|r| !(r.from_entity == "alpha" && r.to_entity == "alpha")));
    let uses_gamma = full.relations.iter().filter(|r| r.from_entity == "alpha" && r.relation_type == "uses" && r.to_entity == "gamma").count();
    assert_eq!(uses_gamma, 1, "the (alpha, uses, gamma) triple must be deduplicated, not doubled");
}

/// Availability priority ordering (spec.md §8 boundary behavior):
/// critical before high before medium before low, ties broken by
/// creation order.
#[tokio::test]
async fn availability_orders_by_priority_then_creation() {
    let (_dir, coordinator) = coordinator().await;

    let mut ids = Vec::new();
    for (title, priority) in [
        ("low", TaskPriority::Low),
        ("medium", TaskPriority::Medium),
        ("high", TaskPriority::High),
        ("critical", TaskPriority::Critical),
        ("medium-2", TaskPriority::Medium),
    ] {
        let task = coordinator
            .tasks
            .create(NewTask {
                title: title.into(),
                description: "".into(),
                project: "p".into(),
                scope: TaskScope::default(),
                priority,
                dependencies: Vec::new(),
                created_by: "tester".into(),
            })
            .await
            .unwrap();
        ids.push(task.id);
    }

    let available = coordinator.tasks.available().await.unwrap();
    let titles: Vec<_> = available.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["critical", "high", "medium", "medium-2", "low"]);
}

/// Agent note categories outside the closed set are rejected (spec.md §3).
#[tokio::test]
async fn note_category_validation() {
    let (_dir, coordinator) = coordinator().await;
    let agent = coordinator.stratigraphy.register_agent("claude-code".into(), "w".into(), "opus".into(), None).await.unwrap();

    let note = coordinator.stratigraphy.add_note(&agent.id, NoteCategory::Learned, "figured it out".into(), Vec::new()).await.unwrap();
    assert_eq!(note.category, NoteCategory::Learned);

    // The HTTP layer rejects unknown categories before they ever reach the
    // store (see mcp-server/src/http.rs add_note); `NoteCategory::parse`
    // is the guard it calls.
    assert!(howell_core::models::NoteCategory::parse("not-a-real-category").is_none());
}

/// Lazy-expiry auto-release (spec.md Open Questions): a claim held by an
/// instance the registry no longer recognizes - because it expired
/// rather than explicitly deregistering - is released the same way an
/// explicit deregister releases it.
#[tokio::test]
async fn reap_orphaned_claims_releases_tasks_held_by_expired_instances() {
    let (_dir, coordinator) = coordinator().await;

    let instance = coordinator.instances.register("ws".into(), "claude-code".into(), "idle".into()).await.unwrap();
    let task = coordinator
        .tasks
        .create(NewTask {
            title: "Task A".into(),
            description: "claimed then abandoned without deregistering".into(),
            project: "p".into(),
            scope: TaskScope::default(),
            priority: TaskPriority::Medium,
            dependencies: Vec::new(),
            created_by: "tester".into(),
        })
        .await
        .unwrap();
    coordinator.tasks.claim(&task.id, &instance.id).await.unwrap();

    // No deregister call here: the instance simply vanishes (its lease
    // expires). A task claimed by a live instance must not be touched.
    let live_task = coordinator
        .tasks
        .create(NewTask {
            title: "Task B".into(),
            description: "claimed by a still-live instance".into(),
            project: "p".into(),
            scope: TaskScope::default(),
            priority: TaskPriority::Medium,
            dependencies: Vec::new(),
            created_by: "tester".into(),
        })
        .await
        .unwrap();
    let live_instance = coordinator.instances.register("ws".into(), "claude-code".into(), "idle".into()).await.unwrap();
    coordinator.tasks.claim(&live_task.id, &live_instance.id).await.unwrap();

    coordinator.instances.deregister(&instance.id).await.unwrap();
    let released = coordinator.reap_orphaned_claims().await.unwrap();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].id, task.id);

    let task = coordinator.tasks.get(&task.id).await.unwrap();
    assert_eq!(task.status, howell_core::models::TaskStatus::Pending);
    assert!(task.claimed_by.is_none());

    let live_task = coordinator.tasks.get(&live_task.id).await.unwrap();
    assert_eq!(live_task.claimed_by.as_deref(), Some(live_instance.id.as_str()));
}

/// Scope-overlap boundary case (spec.md §8): `src` and `src/` are the
/// same directory; `src` and `srcs` are not.
#[test]
fn scope_overlap_directory_boundary() {
    use howell_core::validation::scopes_overlap;

    let src = scoped_dirs(&["src"]);
    let src_slash = scoped_dirs(&["src/"]);
    let srcs = scoped_dirs(&["srcs"]);

    assert!(scopes_overlap(&src, &src_slash));
    assert!(!scopes_overlap(&src, &srcs));
}

fn scoped_dirs(dirs: &[&str]) -> TaskScope {
    TaskScope {
        files: Vec::new(),
        directories: dirs.iter().map(|d| d.to_string()).collect(),
        tags: Vec::new(),
    }
}
