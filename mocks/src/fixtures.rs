//! Ready-made fixtures for common test scenarios, grounded on the
//! teacher's `create_test_task*` helpers.

use howell_core::models::{TaskPriority, TaskScope, TaskStatus};

use crate::builders::{HandoffBuilder, TaskBuilder};

/// A single pending task with no scope and medium priority.
pub fn pending_task() -> howell_core::models::Task {
    TaskBuilder::new().build()
}

/// A task already claimed by `agent`, in the `Claimed` state.
pub fn claimed_task(agent: &str) -> howell_core::models::Task {
    TaskBuilder::new().with_claimed_by(agent).build()
}

/// Two tasks whose scopes overlap on a shared directory, for scope-conflict
/// tests (scenario S1 in spec.md §8).
pub fn overlapping_scope_pair() -> (howell_core::models::Task, howell_core::models::Task) {
    let scope_a = TaskScope {
        directories: vec!["src".to_string()],
        ..Default::default()
    };
    let scope_b = TaskScope {
        directories: vec!["src/module".to_string()],
        ..Default::default()
    };
    let a = TaskBuilder::new().with_id("a").with_scope(scope_a).build();
    let b = TaskBuilder::new().with_id("b").with_scope(scope_b).build();
    (a, b)
}

/// A chain of two tasks where `b` depends on `a`, for dependency-gate
/// tests (scenario S2).
pub fn dependent_task_pair() -> (howell_core::models::Task, howell_core::models::Task) {
    let a = TaskBuilder::new().with_id("a").with_status(TaskStatus::Pending).build();
    let b = TaskBuilder::new()
        .with_id("b")
        .with_dependencies(vec!["a".to_string()])
        .build();
    (a, b)
}

/// A set of five tasks spanning every [`TaskPriority`], useful for
/// verifying availability sort order.
pub fn priority_spread() -> Vec<howell_core::models::Task> {
    vec![
        TaskBuilder::new().with_id("low").with_priority(TaskPriority::Low).build(),
        TaskBuilder::new().with_id("med").with_priority(TaskPriority::Medium).build(),
        TaskBuilder::new().with_id("high").with_priority(TaskPriority::High).build(),
        TaskBuilder::new()
            .with_id("crit")
            .with_priority(TaskPriority::Critical)
            .build(),
    ]
}

/// An unclaimed handoff addressed to every workspace.
pub fn broadcast_handoff(from_agent: &str) -> howell_core::models::Handoff {
    HandoffBuilder::new(from_agent).with_scope("*").build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use howell_core::validation::scopes_overlap;

    #[test]
    fn overlapping_scope_pair_actually_overlaps() {
        let (a, b) = overlapping_scope_pair();
        assert!(scopes_overlap(&a.scope, &b.scope));
    }

    #[test]
    fn priority_spread_covers_every_rank() {
        let tasks = priority_spread();
        let mut ranks: Vec<u8> = tasks.iter().map(|t| t.priority.rank()).collect();
        ranks.sort();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }
}
