//! Handlebars-driven rendering for the two outbound-POST workers: a
//! generation-plan workflow body and a scheduled-post body with an
//! injected honest timestamp footer (spec.md §4.7).

use chrono::Utc;
use handlebars::Handlebars;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowContext<'a> {
    pub plan_id: &'a str,
    pub prompt: &'a str,
}

const WORKFLOW_TEMPLATE: &str = r#"{"plan_id": "{{plan_id}}", "prompt": "{{prompt}}"}"#;

/// Renders the JSON body POSTed to the external generation renderer.
pub fn render_workflow(ctx: &WorkflowContext) -> anyhow::Result<String> {
    let hb = Handlebars::new();
    Ok(hb.render_template(WORKFLOW_TEMPLATE, ctx)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct PostContext<'a> {
    pub content: &'a str,
    pub footer: String,
}

const POST_TEMPLATE: &str = "{{content}}\n\n{{footer}}";

/// Renders the scheduled post body with an honest, non-backdated
/// timestamp footer — the source never claims a post was written at
/// its scheduled time, only at the moment it was actually sent.
pub fn render_post(content: &str) -> anyhow::Result<String> {
    let hb = Handlebars::new();
    let ctx = PostContext { content, footer: format!("— posted {}", Utc::now().format("%Y-%m-%d %H:%M UTC")) };
    Ok(hb.render_template(POST_TEMPLATE, &ctx)?)
}
