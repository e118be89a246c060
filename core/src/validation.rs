use crate::{
    error::{HowellError, Result},
    models::{CreateFromTemplate, NewTask, NoteCategory, Task, TaskPriority, TaskScope, TaskTemplate},
};

/// Business-rule validation for the coordination engine. Mirrors the
/// teacher's "validator struct of associated functions" shape.
pub struct Validator;

impl Validator {
    pub fn validate_non_empty(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(HowellError::invalid_argument(format!(
                "field '{field}' cannot be empty"
            )));
        }
        Ok(())
    }

    pub fn validate_new_task(task: &NewTask) -> Result<()> {
        Self::validate_non_empty("title", &task.title)?;
        Self::validate_non_empty("description", &task.description)?;
        Self::validate_non_empty("created_by", &task.created_by)?;
        Ok(())
    }

    pub fn validate_note_category(raw: &str) -> Result<NoteCategory> {
        NoteCategory::parse(raw)
            .ok_or_else(|| HowellError::invalid_argument(format!("unknown note category '{raw}'")))
    }
}

/// Normalize a directory string to forward slashes with exactly one
/// trailing separator, so prefix comparisons catch both containment
/// directions and exact matches (spec.md §4.1).
pub fn normalize_dir(dir: &str) -> String {
    let mut s = dir.replace('\\', "/");
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

/// Two directories "overlap" iff one normalized form prefixes the
/// other. `src` and `src/` match; `src` and `srcs` do not (the trailing
/// separator is what prevents the false match).
fn directories_overlap(a: &str, b: &str) -> bool {
    let na = normalize_dir(a);
    let nb = normalize_dir(b);
    na.starts_with(&nb) || nb.starts_with(&na)
}

/// The scope-overlap predicate of spec.md §4.1: symmetric, string-only,
/// true iff the two scopes share a file, a directory prefix
/// relationship, or a tag.
pub fn scopes_overlap(a: &TaskScope, b: &TaskScope) -> bool {
    if a.files.iter().any(|f| b.files.contains(f)) {
        return true;
    }
    if a.tags.iter().any(|t| b.tags.contains(t)) {
        return true;
    }
    for da in &a.directories {
        for db in &b.directories {
            if directories_overlap(da, db) {
                return true;
            }
        }
    }
    false
}

/// A task is available iff pending, every dependency is completed, and
/// its scope does not overlap any currently claimed/in-progress task
/// (spec.md §4.1 "Availability query").
pub fn is_available(
    task: &Task,
    completed_ids: &std::collections::HashSet<&str>,
    held_scopes: &[&TaskScope],
) -> bool {
    use crate::models::TaskStatus;
    if task.status != TaskStatus::Pending {
        return false;
    }
    if !task
        .dependencies
        .iter()
        .all(|dep| completed_ids.contains(dep.as_str()))
    {
        return false;
    }
    !held_scopes.iter().any(|held| scopes_overlap(&task.scope, held))
}

/// Sort order for availability results: priority rank ascending (so
/// critical first), ties broken by creation order.
pub fn availability_sort_key(task: &Task) -> (u8, chrono::DateTime<chrono::Utc>) {
    (task.priority.rank(), task.created_at)
}

/// The fixed catalog of known task templates (spec.md §4.1 "Templates").
pub fn template_catalog() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate {
            name: "bug".to_string(),
            title_prefix: "[BUG] ".to_string(),
            default_priority: TaskPriority::High,
            default_tags: vec!["bug".to_string()],
            description_scaffold: "## Repro steps\n\n## Expected\n\n## Actual\n".to_string(),
        },
        TaskTemplate {
            name: "feature".to_string(),
            title_prefix: "[FEATURE] ".to_string(),
            default_priority: TaskPriority::Medium,
            default_tags: vec!["feature".to_string()],
            description_scaffold: "## Motivation\n\n## Approach\n".to_string(),
        },
        TaskTemplate {
            name: "refactor".to_string(),
            title_prefix: "[REFACTOR] ".to_string(),
            default_priority: TaskPriority::Low,
            default_tags: vec!["refactor".to_string()],
            description_scaffold: "## Current state\n\n## Target state\n".to_string(),
        },
        TaskTemplate {
            name: "review".to_string(),
            title_prefix: "[REVIEW] ".to_string(),
            default_priority: TaskPriority::Medium,
            default_tags: vec!["review".to_string()],
            description_scaffold: "## What to review\n\n## Checklist\n".to_string(),
        },
        TaskTemplate {
            name: "deploy".to_string(),
            title_prefix: "[DEPLOY] ".to_string(),
            default_priority: TaskPriority::High,
            default_tags: vec!["deploy".to_string()],
            description_scaffold: "## Target\n\n## Rollback plan\n".to_string(),
        },
    ]
}

pub fn find_template(name: &str) -> Result<TaskTemplate> {
    template_catalog()
        .into_iter()
        .find(|t| t.name == name)
        .ok_or_else(|| {
            let known: Vec<_> = template_catalog().into_iter().map(|t| t.name).collect();
            HowellError::invalid_argument(format!(
                "unknown template '{name}', known templates: {}",
                known.join(", ")
            ))
        })
}

/// Instantiate a `NewTask` from a template plus caller extras (§4.1
/// `create_from_template`): title is the template prefix concatenated
/// with the caller's title, tags are the template set unioned with
/// caller extras.
pub fn instantiate_template(req: CreateFromTemplate) -> Result<NewTask> {
    let template = find_template(&req.template_name)?;
    let mut tags = template.default_tags.clone();
    for t in req.extra_tags {
        if !tags.contains(&t) {
            tags.push(t);
        }
    }
    let mut scope = req.extra_scope;
    for t in tags {
        if !scope.tags.contains(&t) {
            scope.tags.push(t);
        }
    }
    let description = req
        .description
        .unwrap_or_else(|| template.description_scaffold.clone());
    Ok(NewTask {
        title: format!("{}{}", template.title_prefix, req.title),
        description,
        project: req.project,
        scope,
        priority: template.default_priority,
        dependencies: Vec::new(),
        created_by: req.created_by,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Task, TaskStatus};
    use chrono::Utc;
    use std::collections::HashSet;

    fn scope(files: &[&str], dirs: &[&str], tags: &[&str]) -> TaskScope {
        TaskScope {
            files: files.iter().map(|s| s.to_string()).collect(),
            directories: dirs.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn directory_src_and_src_slash_match() {
        let a = scope(&[], &["src"], &[]);
        let b = scope(&[], &["src/"], &[]);
        assert!(scopes_overlap(&a, &b));
    }

    #[test]
    fn directory_src_and_srcs_do_not_match() {
        let a = scope(&[], &["src"], &[]);
        let b = scope(&[], &["srcs"], &[]);
        assert!(!scopes_overlap(&a, &b));
    }

    #[test]
    fn directory_containment_either_direction() {
        let parent = scope(&[], &["src"], &[]);
        let child = scope(&[], &["src/module"], &[]);
        assert!(scopes_overlap(&parent, &child));
        assert!(scopes_overlap(&child, &parent));
    }

    #[test]
    fn shared_tag_overlaps() {
        let a = scope(&[], &[], &["ui"]);
        let b = scope(&[], &[], &["ui", "copy"]);
        assert!(scopes_overlap(&a, &b));
    }

    #[test]
    fn shared_file_overlaps() {
        let a = scope(&["a.rs"], &[], &[]);
        let b = scope(&["a.rs", "b.rs"], &[], &[]);
        assert!(scopes_overlap(&a, &b));
    }

    #[test]
    fn disjoint_scopes_do_not_overlap() {
        let a = scope(&["a.rs"], &["src"], &["ui"]);
        let b = scope(&["b.rs"], &["lib"], &["copy"]);
        assert!(!scopes_overlap(&a, &b));
    }

    fn make_task(id: &str, status: TaskStatus, deps: &[&str], scope: TaskScope) -> Task {
        Task {
            id: id.to_string(),
            title: "t".into(),
            description: "d".into(),
            project: "p".into(),
            scope,
            priority: TaskPriority::Medium,
            status,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            created_by: "tester".into(),
            created_at: Utc::now(),
            claimed_by: None,
            claimed_at: None,
            started_at: None,
            completed_at: None,
            result: None,
            artifacts: Vec::new(),
            progress_notes: Vec::new(),
        }
    }

    #[test]
    fn unmet_dependency_blocks_availability() {
        let task = make_task("B", TaskStatus::Pending, &["A"], TaskScope::default());
        let completed: HashSet<&str> = HashSet::new();
        assert!(!is_available(&task, &completed, &[]));
    }

    #[test]
    fn met_dependency_allows_availability() {
        let task = make_task("B", TaskStatus::Pending, &["A"], TaskScope::default());
        let mut completed: HashSet<&str> = HashSet::new();
        completed.insert("A");
        assert!(is_available(&task, &completed, &[]));
    }

    #[test]
    fn overlapping_held_scope_blocks_availability() {
        let held = scope(&[], &[], &["ui"]);
        let task = make_task(
            "B",
            TaskStatus::Pending,
            &[],
            scope(&[], &[], &["ui", "copy"]),
        );
        let completed: HashSet<&str> = HashSet::new();
        assert!(!is_available(&task, &completed, &[&held]));
    }

    #[test]
    fn template_unknown_name_lists_known() {
        let err = find_template("nope").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bug"));
    }

    #[test]
    fn instantiate_template_unions_tags_and_prefixes_title() {
        let req = CreateFromTemplate {
            template_name: "bug".to_string(),
            title: "login crash".to_string(),
            description: None,
            project: "web".to_string(),
            extra_tags: vec!["urgent".to_string()],
            extra_scope: TaskScope::default(),
            created_by: "agent-1".to_string(),
        };
        let new_task = instantiate_template(req).unwrap();
        assert_eq!(new_task.title, "[BUG] login crash");
        assert!(new_task.scope.tags.contains(&"bug".to_string()));
        assert!(new_task.scope.tags.contains(&"urgent".to_string()));
        assert_eq!(new_task.priority, TaskPriority::High);
    }
}
