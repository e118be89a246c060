//! The tool-RPC catalog (spec.md §4.6, §E): a static descriptor list for
//! `tools/list`, and the `tools/call` dispatcher that maps a tool name
//! to the corresponding core operation on the [`Coordinator`].

use std::sync::Arc;

use howell_core::{
    error::{HowellError, Result},
    models::{
        CreateFromTemplate, HandoffPriority, NewTask, NoteCategory, TaskFilter, TaskPriority,
        TaskScope,
    },
    Coordinator,
};
use serde_json::{json, Value};

/// One entry of the static catalog returned by `tools/list`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// The static catalog. Every core mutation in spec.md §4.1-§4.4 has a
/// tool, plus the composite `howell_bootstrap` read (§E "Tool-RPC: the
/// tool catalog must include at minimum a bootstrap tool...").
pub fn catalog() -> Vec<ToolDescriptor> {
    vec![
        // --- Knowledge graph (§4.2) ---
        ToolDescriptor {
            name: "howell_add_entity",
            description: "Create or merge a knowledge-graph entity, unioning observations.",
            input_schema: schema(
                json!({
                    "name": {"type": "string"},
                    "entity_type": {"type": "string"},
                    "observations": {"type": "array", "items": {"type": "string"}},
                }),
                &["name", "entity_type"],
            ),
        },
        ToolDescriptor {
            name: "howell_add_observation",
            description: "Append one observation to an existing entity.",
            input_schema: schema(
                json!({"name": {"type": "string"}, "observation": {"type": "string"}}),
                &["name", "observation"],
            ),
        },
        ToolDescriptor {
            name: "howell_add_relation",
            description: "Create a directed relation between two existing entities.",
            input_schema: schema(
                json!({
                    "from_entity": {"type": "string"},
                    "relation_type": {"type": "string"},
                    "to_entity": {"type": "string"},
                }),
                &["from_entity", "relation_type", "to_entity"],
            ),
        },
        ToolDescriptor {
            name: "howell_delete_entity",
            description: "Delete an entity and every relation incident to it.",
            input_schema: schema(json!({"name": {"type": "string"}}), &["name"]),
        },
        ToolDescriptor {
            name: "howell_delete_observation",
            description: "Remove every observation containing a substring (case-insensitive).",
            input_schema: schema(
                json!({"name": {"type": "string"}, "substring": {"type": "string"}}),
                &["name", "substring"],
            ),
        },
        ToolDescriptor {
            name: "howell_delete_relation",
            description: "Delete one exact relation triple.",
            input_schema: schema(
                json!({
                    "from_entity": {"type": "string"},
                    "relation_type": {"type": "string"},
                    "to_entity": {"type": "string"},
                }),
                &["from_entity", "relation_type", "to_entity"],
            ),
        },
        ToolDescriptor {
            name: "howell_rename_entity",
            description: "Rename an entity and rewrite every incident relation.",
            input_schema: schema(
                json!({"old_name": {"type": "string"}, "new_name": {"type": "string"}}),
                &["old_name", "new_name"],
            ),
        },
        ToolDescriptor {
            name: "howell_merge_entities",
            description: "Merge a source entity into a target, deduplicating observations and relations.",
            input_schema: schema(
                json!({"source": {"type": "string"}, "target": {"type": "string"}}),
                &["source", "target"],
            ),
        },
        ToolDescriptor {
            name: "howell_search_graph",
            description: "Substring search over entity names, types, observations and relations.",
            input_schema: schema(json!({"query": {"type": "string"}}), &["query"]),
        },
        // --- Task coordination (§4.1) ---
        ToolDescriptor {
            name: "howell_create_task",
            description: "Create a new pending task.",
            input_schema: schema(
                json!({
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "project": {"type": "string"},
                    "priority": {"type": "string", "enum": ["low", "medium", "high", "critical"]},
                    "scope_files": {"type": "array", "items": {"type": "string"}},
                    "scope_directories": {"type": "array", "items": {"type": "string"}},
                    "scope_tags": {"type": "array", "items": {"type": "string"}},
                    "dependencies": {"type": "array", "items": {"type": "string"}},
                    "created_by": {"type": "string"},
                }),
                &["title", "description", "created_by"],
            ),
        },
        ToolDescriptor {
            name: "howell_create_task_from_template",
            description: "Instantiate a task from a named template (unknown names fail with the known list).",
            input_schema: schema(
                json!({
                    "template_name": {"type": "string"},
                    "title": {"type": "string"},
                    "project": {"type": "string"},
                    "extra_tags": {"type": "array", "items": {"type": "string"}},
                    "created_by": {"type": "string"},
                }),
                &["template_name", "title", "created_by"],
            ),
        },
        ToolDescriptor {
            name: "howell_get_task",
            description: "Fetch one task by id.",
            input_schema: schema(json!({"id": {"type": "string"}}), &["id"]),
        },
        ToolDescriptor {
            name: "howell_list_tasks",
            description: "List tasks, optionally filtered by status, project, or claimant.",
            input_schema: schema(
                json!({
                    "status": {"type": "string"},
                    "project": {"type": "string"},
                    "claimed_by": {"type": "string"},
                }),
                &[],
            ),
        },
        ToolDescriptor {
            name: "howell_get_available_tasks",
            description: "List pending tasks whose dependencies are met and whose scope is free, priority-sorted.",
            input_schema: schema(json!({}), &[]),
        },
        ToolDescriptor {
            name: "howell_claim_task",
            description: "Claim a pending, available task for an instance.",
            input_schema: schema(
                json!({"id": {"type": "string"}, "instance_id": {"type": "string"}}),
                &["id", "instance_id"],
            ),
        },
        ToolDescriptor {
            name: "howell_start_task",
            description: "Transition a claimed task to in-progress (claimer only).",
            input_schema: schema(
                json!({"id": {"type": "string"}, "instance_id": {"type": "string"}}),
                &["id", "instance_id"],
            ),
        },
        ToolDescriptor {
            name: "howell_add_task_progress_note",
            description: "Append a free-text progress note to a claimed task (claimer only).",
            input_schema: schema(
                json!({"id": {"type": "string"}, "instance_id": {"type": "string"}, "text": {"type": "string"}}),
                &["id", "instance_id", "text"],
            ),
        },
        ToolDescriptor {
            name: "howell_complete_task",
            description: "Complete a claimed or in-progress task (claimer only).",
            input_schema: schema(
                json!({
                    "id": {"type": "string"},
                    "instance_id": {"type": "string"},
                    "result": {"type": "string"},
                    "artifacts": {"type": "array", "items": {"type": "string"}},
                }),
                &["id", "instance_id", "result"],
            ),
        },
        ToolDescriptor {
            name: "howell_fail_task",
            description: "Recycle a claimed or in-progress task back to pending with a failure note (claimer only).",
            input_schema: schema(
                json!({"id": {"type": "string"}, "instance_id": {"type": "string"}, "reason": {"type": "string"}}),
                &["id", "instance_id", "reason"],
            ),
        },
        ToolDescriptor {
            name: "howell_release_task",
            description: "Release a claimed task back to pending without recording a failure (claimer only).",
            input_schema: schema(
                json!({"id": {"type": "string"}, "instance_id": {"type": "string"}}),
                &["id", "instance_id"],
            ),
        },
        ToolDescriptor {
            name: "howell_delete_task",
            description: "Delete a pending, completed, or failed task (refused on active tasks).",
            input_schema: schema(json!({"id": {"type": "string"}}), &["id"]),
        },
        ToolDescriptor {
            name: "howell_list_task_templates",
            description: "List the fixed template catalog.",
            input_schema: schema(json!({}), &[]),
        },
        // --- Agent stratigraphy (§4.3) ---
        ToolDescriptor {
            name: "howell_register_agent",
            description: "Register a new agent record, allocating the next CH-YYMMDD-N id for today.",
            input_schema: schema(
                json!({
                    "platform": {"type": "string"},
                    "workspace": {"type": "string"},
                    "model": {"type": "string"},
                    "parent": {"type": "string"},
                }),
                &["platform", "workspace", "model"],
            ),
        },
        ToolDescriptor {
            name: "howell_end_agent",
            description: "Mark an agent record ended with an optional summary.",
            input_schema: schema(
                json!({"id": {"type": "string"}, "summary": {"type": "string"}}),
                &["id"],
            ),
        },
        ToolDescriptor {
            name: "howell_get_agent",
            description: "Fetch one agent record by id.",
            input_schema: schema(json!({"id": {"type": "string"}}), &["id"]),
        },
        ToolDescriptor {
            name: "howell_list_agents",
            description: "List agent records, optionally filtered by workspace.",
            input_schema: schema(json!({"workspace": {"type": "string"}}), &[]),
        },
        ToolDescriptor {
            name: "howell_add_note",
            description: "Add an immutable note against an agent record.",
            input_schema: schema(
                json!({
                    "agent_id": {"type": "string"},
                    "category": {"type": "string", "enum": ["learned", "decision", "blocker", "warning", "context", "observation"]},
                    "content": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                }),
                &["agent_id", "category", "content"],
            ),
        },
        ToolDescriptor {
            name: "howell_list_notes",
            description: "List notes, optionally filtered by agent and category.",
            input_schema: schema(
                json!({"agent_id": {"type": "string"}, "category": {"type": "string"}}),
                &[],
            ),
        },
        ToolDescriptor {
            name: "howell_create_handoff",
            description: "Leave a handoff addressed to a workspace, '*', or a specific agent id.",
            input_schema: schema(
                json!({
                    "from_agent": {"type": "string"},
                    "to_scope": {"type": "string"},
                    "content": {"type": "string"},
                    "priority": {"type": "string", "enum": ["low", "normal", "high", "critical"]},
                }),
                &["from_agent", "to_scope", "content"],
            ),
        },
        ToolDescriptor {
            name: "howell_claim_handoff",
            description: "Atomically claim an unclaimed handoff.",
            input_schema: schema(
                json!({"id": {"type": "integer"}, "claimant": {"type": "string"}}),
                &["id", "claimant"],
            ),
        },
        ToolDescriptor {
            name: "howell_list_handoffs",
            description: "List handoffs visible to a scope, optionally unclaimed-only.",
            input_schema: schema(
                json!({"scope": {"type": "string"}, "unclaimed_only": {"type": "boolean"}}),
                &["scope"],
            ),
        },
        // --- Instance registry (§4.4) ---
        ToolDescriptor {
            name: "howell_register_instance",
            description: "Register a new live instance, returning its opaque id.",
            input_schema: schema(
                json!({"workspace": {"type": "string"}, "platform": {"type": "string"}, "activity": {"type": "string"}}),
                &["workspace", "platform"],
            ),
        },
        ToolDescriptor {
            name: "howell_heartbeat",
            description: "Refresh an instance's liveness clock, optionally updating activity and active files.",
            input_schema: schema(
                json!({
                    "id": {"type": "string"},
                    "activity": {"type": "string"},
                    "active_files": {"type": "array", "items": {"type": "string"}},
                }),
                &["id"],
            ),
        },
        ToolDescriptor {
            name: "howell_update_instance_status",
            description: "Lightweight partial update of an instance's status string; does not reset its expiry clock.",
            input_schema: schema(json!({"id": {"type": "string"}, "status": {"type": "string"}}), &["id", "status"]),
        },
        ToolDescriptor {
            name: "howell_deregister_instance",
            description: "Remove an instance and auto-release every task it held.",
            input_schema: schema(json!({"id": {"type": "string"}}), &["id"]),
        },
        ToolDescriptor {
            name: "howell_list_instances",
            description: "List live instances, optionally filtered by workspace.",
            input_schema: schema(json!({"workspace": {"type": "string"}}), &[]),
        },
        ToolDescriptor {
            name: "howell_check_file_conflicts",
            description: "Check a file list against every other live instance's active files.",
            input_schema: schema(
                json!({"id": {"type": "string"}, "files": {"type": "array", "items": {"type": "string"}}}),
                &["id", "files"],
            ),
        },
        // --- Composite bootstrap (§E) ---
        ToolDescriptor {
            name: "howell_bootstrap",
            description: "Composite context for a newly-joining agent: identity summary, full graph, live siblings, and available/in-progress tasks for the caller's instance.",
            input_schema: schema(
                json!({"workspace": {"type": "string"}, "instance_id": {"type": "string"}}),
                &["workspace"],
            ),
        },
    ]
}

fn arg_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HowellError::invalid_argument(format!("missing required argument '{key}'")))
}

fn arg_str_opt(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn arg_str_vec(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn arg_i64(args: &Value, key: &str) -> Result<i64> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| HowellError::invalid_argument(format!("missing required integer argument '{key}'")))
}

/// Dispatch one `tools/call` by name against the shared coordinator
/// state, returning the raw JSON result (wrapped by the caller into the
/// `{"result": ...}` content body, or `{"error": ...}` on failure).
pub async fn call_tool(coordinator: &Arc<Coordinator>, name: &str, args: Value) -> Result<Value> {
    match name {
        // Knowledge graph
        "howell_add_entity" => {
            let entity_name = arg_str(&args, "name")?;
            let entity_type = arg_str(&args, "entity_type")?;
            let observations = arg_str_vec(&args, "observations");
            let n = observations.len();
            let entity = coordinator.graph.upsert_entity(&entity_name, &entity_type, observations).await?;
            Ok(json!(format!(
                "Created entity '{}' ({}) with {} observations",
                entity.name, entity.entity_type, n
            )))
        }
        "howell_add_observation" => {
            let entity_name = arg_str(&args, "name")?;
            let observation = arg_str(&args, "observation")?;
            let entity = coordinator.graph.add_observation(&entity_name, observation).await?;
            Ok(json!(entity))
        }
        "howell_add_relation" => {
            let from = arg_str(&args, "from_entity")?;
            let rel = arg_str(&args, "relation_type")?;
            let to = arg_str(&args, "to_entity")?;
            let relation = coordinator.graph.add_relation(&from, &rel, &to).await?;
            Ok(json!(relation))
        }
        "howell_delete_entity" => {
            let entity_name = arg_str(&args, "name")?;
            coordinator.graph.delete_entity(&entity_name).await?;
            Ok(json!(format!("Deleted entity '{entity_name}'")))
        }
        "howell_delete_observation" => {
            let entity_name = arg_str(&args, "name")?;
            let substring = arg_str(&args, "substring")?;
            let n = coordinator.graph.delete_observation_by_substring(&entity_name, &substring).await?;
            Ok(json!(format!("Removed {n} observation(s) from '{entity_name}'")))
        }
        "howell_delete_relation" => {
            let from = arg_str(&args, "from_entity")?;
            let rel = arg_str(&args, "relation_type")?;
            let to = arg_str(&args, "to_entity")?;
            coordinator.graph.delete_relation(&from, &rel, &to).await?;
            Ok(json!(format!("Deleted relation {from} -{rel}-> {to}")))
        }
        "howell_rename_entity" => {
            let old_name = arg_str(&args, "old_name")?;
            let new_name = arg_str(&args, "new_name")?;
            let entity = coordinator.graph.rename_entity(&old_name, &new_name).await?;
            Ok(json!(entity))
        }
        "howell_merge_entities" => {
            let source = arg_str(&args, "source")?;
            let target = arg_str(&args, "target")?;
            let entity = coordinator.graph.merge_entities(&source, &target).await?;
            Ok(json!(entity))
        }
        "howell_search_graph" => {
            let query = arg_str(&args, "query")?;
            let entities = coordinator.graph.search(&query).await?;
            Ok(json!(entities))
        }

        // Task coordination
        "howell_create_task" => {
            let scope = TaskScope {
                files: arg_str_vec(&args, "scope_files"),
                directories: arg_str_vec(&args, "scope_directories"),
                tags: arg_str_vec(&args, "scope_tags"),
            };
            let priority = arg_str_opt(&args, "priority")
                .and_then(|p| serde_json::from_value(json!(p)).ok())
                .unwrap_or(TaskPriority::Medium);
            let task = coordinator
                .tasks
                .create(NewTask {
                    title: arg_str(&args, "title")?,
                    description: arg_str(&args, "description")?,
                    project: arg_str_opt(&args, "project").unwrap_or_default(),
                    scope,
                    priority,
                    dependencies: arg_str_vec(&args, "dependencies"),
                    created_by: arg_str(&args, "created_by")?,
                })
                .await?;
            Ok(json!(task))
        }
        "howell_create_task_from_template" => {
            let task = coordinator
                .tasks
                .create_from_template(CreateFromTemplate {
                    template_name: arg_str(&args, "template_name")?,
                    title: arg_str(&args, "title")?,
                    description: arg_str_opt(&args, "description"),
                    project: arg_str_opt(&args, "project").unwrap_or_default(),
                    extra_tags: arg_str_vec(&args, "extra_tags"),
                    extra_scope: TaskScope::default(),
                    created_by: arg_str(&args, "created_by")?,
                })
                .await?;
            Ok(json!(task))
        }
        "howell_get_task" => Ok(json!(coordinator.tasks.get(&arg_str(&args, "id")?).await?)),
        "howell_list_tasks" => {
            let filter = TaskFilter {
                status: arg_str_opt(&args, "status").and_then(|s| serde_json::from_value(json!(s)).ok()),
                project: arg_str_opt(&args, "project"),
                claimed_by: arg_str_opt(&args, "claimed_by"),
            };
            Ok(json!(coordinator.tasks.list(filter).await?))
        }
        "howell_get_available_tasks" => Ok(json!(coordinator.tasks.available().await?)),
        "howell_claim_task" => Ok(json!(
            coordinator.tasks.claim(&arg_str(&args, "id")?, &arg_str(&args, "instance_id")?).await?
        )),
        "howell_start_task" => Ok(json!(
            coordinator.tasks.start(&arg_str(&args, "id")?, &arg_str(&args, "instance_id")?).await?
        )),
        "howell_add_task_progress_note" => Ok(json!(coordinator
            .tasks
            .add_progress_note(&arg_str(&args, "id")?, &arg_str(&args, "instance_id")?, arg_str(&args, "text")?)
            .await?)),
        "howell_complete_task" => Ok(json!(coordinator
            .tasks
            .complete(
                &arg_str(&args, "id")?,
                &arg_str(&args, "instance_id")?,
                arg_str(&args, "result")?,
                arg_str_vec(&args, "artifacts"),
            )
            .await?)),
        "howell_fail_task" => Ok(json!(coordinator
            .tasks
            .fail_and_requeue(&arg_str(&args, "id")?, &arg_str(&args, "instance_id")?, arg_str(&args, "reason")?)
            .await?)),
        "howell_release_task" => Ok(json!(
            coordinator.tasks.release(&arg_str(&args, "id")?, &arg_str(&args, "instance_id")?).await?
        )),
        "howell_delete_task" => {
            let id = arg_str(&args, "id")?;
            coordinator.tasks.delete(&id).await?;
            Ok(json!(format!("Deleted task '{id}'")))
        }
        "howell_list_task_templates" => Ok(json!(coordinator.tasks.templates().await?)),

        // Agent stratigraphy
        "howell_register_agent" => Ok(json!(coordinator
            .stratigraphy
            .register_agent(
                arg_str(&args, "platform")?,
                arg_str(&args, "workspace")?,
                arg_str(&args, "model")?,
                arg_str_opt(&args, "parent"),
            )
            .await?)),
        "howell_end_agent" => Ok(json!(
            coordinator.stratigraphy.end_agent(&arg_str(&args, "id")?, arg_str_opt(&args, "summary")).await?
        )),
        "howell_get_agent" => Ok(json!(coordinator.stratigraphy.get_agent(&arg_str(&args, "id")?).await?)),
        "howell_list_agents" => Ok(json!(
            coordinator.stratigraphy.list_agents(arg_str_opt(&args, "workspace").as_deref()).await?
        )),
        "howell_add_note" => {
            let category_raw = arg_str(&args, "category")?;
            let category = NoteCategory::parse(&category_raw)
                .ok_or_else(|| HowellError::invalid_argument(format!("unknown note category '{category_raw}'")))?;
            Ok(json!(coordinator
                .stratigraphy
                .add_note(&arg_str(&args, "agent_id")?, category, arg_str(&args, "content")?, arg_str_vec(&args, "tags"))
                .await?))
        }
        "howell_list_notes" => {
            let category = arg_str_opt(&args, "category").and_then(|c| NoteCategory::parse(&c));
            Ok(json!(coordinator
                .stratigraphy
                .list_notes(arg_str_opt(&args, "agent_id").as_deref(), category)
                .await?))
        }
        "howell_create_handoff" => {
            let priority = arg_str_opt(&args, "priority")
                .map(|p| HandoffPriority::coerce(&p))
                .unwrap_or_default();
            Ok(json!(coordinator
                .stratigraphy
                .create_handoff(arg_str(&args, "from_agent")?, arg_str(&args, "to_scope")?, arg_str(&args, "content")?, priority)
                .await?))
        }
        "howell_claim_handoff" => Ok(json!(
            coordinator.stratigraphy.claim_handoff(arg_i64(&args, "id")?, &arg_str(&args, "claimant")?).await?
        )),
        "howell_list_handoffs" => {
            let scope = arg_str(&args, "scope")?;
            let unclaimed_only = args.get("unclaimed_only").and_then(Value::as_bool).unwrap_or(false);
            Ok(json!(coordinator.stratigraphy.list_handoffs(&scope, unclaimed_only).await?))
        }

        // Instance registry
        "howell_register_instance" => Ok(json!(coordinator
            .instances
            .register(arg_str(&args, "workspace")?, arg_str(&args, "platform")?, arg_str_opt(&args, "activity").unwrap_or_default())
            .await?)),
        "howell_heartbeat" => {
            let active_files = args.get("active_files").map(|_| arg_str_vec(&args, "active_files"));
            Ok(json!(coordinator
                .instances
                .heartbeat(&arg_str(&args, "id")?, arg_str_opt(&args, "activity"), active_files)
                .await?))
        }
        "howell_update_instance_status" => Ok(json!(coordinator
            .instances
            .update_status(&arg_str(&args, "id")?, arg_str(&args, "status")?)
            .await?)),
        "howell_deregister_instance" => {
            let id = arg_str(&args, "id")?;
            coordinator.instances.deregister(&id).await?;
            coordinator.auto_release_instance(&id).await?;
            Ok(json!(format!("Deregistered instance '{id}'")))
        }
        "howell_list_instances" => Ok(json!(
            coordinator.instances.list(arg_str_opt(&args, "workspace").as_deref()).await?
        )),
        "howell_check_file_conflicts" => Ok(json!(coordinator
            .instances
            .check_conflicts(&arg_str(&args, "id")?, &arg_str_vec(&args, "files"))
            .await?)),

        // Composite bootstrap
        "howell_bootstrap" => {
            let workspace = arg_str(&args, "workspace")?;
            let graph = coordinator.graph.load().await?;
            let instance_id = arg_str_opt(&args, "instance_id");
            // With a caller instance, claim-all on its behalf; without
            // one, fall back to the read-only preview (§4.3).
            let context = match &instance_id {
                Some(id) => coordinator.stratigraphy.bootstrap_context(&workspace, id).await?,
                None => coordinator.stratigraphy.preview_bootstrap_context(&workspace).await?,
            };
            let siblings = coordinator.instances.list(Some(&workspace)).await?;
            let (available, in_progress) = if let Some(instance_id) = instance_id {
                let available = coordinator.tasks.available().await?;
                let in_progress = coordinator
                    .tasks
                    .list(TaskFilter {
                        status: None,
                        project: None,
                        claimed_by: Some(instance_id),
                    })
                    .await?;
                (available, in_progress)
            } else {
                (Vec::new(), Vec::new())
            };
            Ok(json!({
                "workspace": workspace,
                "graph": graph,
                "stratigraphy_context": context,
                "live_siblings": siblings,
                "available_tasks": available,
                "claimed_tasks": in_progress,
            }))
        }

        other => Err(HowellError::invalid_argument(format!("unknown tool '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_are_unique() {
        let names: Vec<_> = catalog().into_iter().map(|t| t.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names.len(), sorted.len());
    }

    #[test]
    fn catalog_includes_bootstrap_tool() {
        assert!(catalog().iter().any(|t| t.name == "howell_bootstrap"));
    }
}
