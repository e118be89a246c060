use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tokio::sync::Mutex;

use howell_core::{
    error::{HowellError, Result},
    models::{AgentRecord, Handoff, HandoffPriority, Note, NoteCategory},
    repository::{AgentWithNotes, BootstrapContext, StratigraphyStore},
};

const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed agent stratigraphy store (spec.md §4.3): the
/// permanent ledger of every agent that has ever existed, their notes,
/// and their handoffs. Schema is applied idempotently at startup and
/// records its own version row. A single mutex serializes every
/// mutation, matching the write discipline of the other durable
/// stores even though SQLite already serializes at the row level — it
/// is what makes agent-id generation (max+1 scan) race-free.
pub struct SqliteStratigraphyStore {
    pool: SqlitePool,
    lock: Mutex<()>,
}

impl SqliteStratigraphyStore {
    /// Connects with WAL journaling and foreign keys enabled, matching
    /// the connection discipline used elsewhere for single-file SQLite
    /// stores in this workspace.
    pub async fn connect(database_path: &str) -> Result<Self> {
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| HowellError::internal(format!("failed to open stratigraphy store: {e}")))?;

        let store = Self {
            pool,
            lock: Mutex::new(()),
        };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect(":memory:").await
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        if row.is_none() {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(SCHEMA_VERSION)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                parent TEXT,
                platform TEXT NOT NULL,
                workspace TEXT NOT NULL,
                model TEXT NOT NULL,
                created_at TEXT NOT NULL,
                ended_at TEXT,
                end_summary TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id TEXT NOT NULL REFERENCES agents(id),
                category TEXT NOT NULL,
                content TEXT NOT NULL,
                tags TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS handoffs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_agent TEXT NOT NULL REFERENCES agents(id),
                to_scope TEXT NOT NULL,
                content TEXT NOT NULL,
                priority TEXT NOT NULL,
                claimed_by TEXT,
                created_at TEXT NOT NULL,
                claimed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Scans ids matching `CH-<YYMMDD>-%` and returns max+1 (0 if none),
    /// called only inside the write mutex (spec.md §4.3 id generation).
    async fn next_sequence(&self, date: &str) -> Result<u32> {
        let prefix = format!("CH-{date}-");
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM agents WHERE id LIKE ?")
            .bind(format!("{prefix}%"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let max = rows
            .iter()
            .filter_map(|(id,)| id.strip_prefix(&prefix))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .max();
        Ok(max.map(|n| n + 1).unwrap_or(0))
    }

    /// Shared composition for both bootstrap variants: last five agents
    /// for `workspace` enriched with up to ten eligible notes each, plus
    /// aggregate stats (§4.3).
    async fn compose_bootstrap_context(&self, workspace: &str, handoffs: Vec<Handoff>) -> Result<BootstrapContext> {
        let recent = self.list_agents(Some(workspace)).await?.into_iter().take(5).collect::<Vec<_>>();

        let eligible = [
            NoteCategory::Learned,
            NoteCategory::Decision,
            NoteCategory::Warning,
            NoteCategory::Blocker,
        ];
        let mut recent_agents = Vec::with_capacity(recent.len());
        for agent in recent {
            let mut notes = self.list_notes(Some(&agent.id), None).await?;
            notes.retain(|n| eligible.contains(&n.category));
            notes.truncate(10);
            recent_agents.push(AgentWithNotes { agent, notes });
        }

        Ok(BootstrapContext {
            handoffs,
            recent_agents,
            stats: self.stats().await?,
        })
    }
}

fn db_err(e: sqlx::Error) -> HowellError {
    HowellError::internal(format!("stratigraphy store error: {e}"))
}

fn row_to_agent(row: &SqliteRow) -> Result<AgentRecord> {
    Ok(AgentRecord {
        id: row.try_get("id").map_err(db_err)?,
        parent: row.try_get("parent").map_err(db_err)?,
        platform: row.try_get("platform").map_err(db_err)?,
        workspace: row.try_get("workspace").map_err(db_err)?,
        model: row.try_get("model").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        ended_at: row.try_get("ended_at").map_err(db_err)?,
        end_summary: row.try_get("end_summary").map_err(db_err)?,
    })
}

fn row_to_note(row: &SqliteRow) -> Result<Note> {
    let category_raw: String = row.try_get("category").map_err(db_err)?;
    let category = NoteCategory::parse(&category_raw)
        .ok_or_else(|| HowellError::internal(format!("corrupt note category '{category_raw}'")))?;
    let tags_raw: String = row.try_get("tags").map_err(db_err)?;
    let tags: Vec<String> = serde_json::from_str(&tags_raw).unwrap_or_default();
    Ok(Note {
        id: row.try_get("id").map_err(db_err)?,
        agent_id: row.try_get("agent_id").map_err(db_err)?,
        category,
        content: row.try_get("content").map_err(db_err)?,
        tags,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn row_to_handoff(row: &SqliteRow) -> Result<Handoff> {
    let priority_raw: String = row.try_get("priority").map_err(db_err)?;
    Ok(Handoff {
        id: row.try_get("id").map_err(db_err)?,
        from_agent: row.try_get("from_agent").map_err(db_err)?,
        to_scope: row.try_get("to_scope").map_err(db_err)?,
        content: row.try_get("content").map_err(db_err)?,
        priority: HandoffPriority::coerce(&priority_raw),
        claimed_by: row.try_get("claimed_by").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        claimed_at: row.try_get("claimed_at").map_err(db_err)?,
    })
}

#[async_trait]
impl StratigraphyStore for SqliteStratigraphyStore {
    async fn register_agent(&self, platform: String, workspace: String, model: String, parent: Option<String>) -> Result<AgentRecord> {
        let _guard = self.lock.lock().await;
        let now = Utc::now();
        let date = now.format("%y%m%d").to_string();
        let seq = self.next_sequence(&date).await?;
        let id = format!("CH-{date}-{seq}");

        sqlx::query(
            "INSERT INTO agents (id, parent, platform, workspace, model, created_at, ended_at, end_summary) VALUES (?, ?, ?, ?, ?, ?, NULL, NULL)",
        )
        .bind(&id)
        .bind(&parent)
        .bind(&platform)
        .bind(&workspace)
        .bind(&model)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(AgentRecord {
            id,
            parent,
            platform,
            workspace,
            model,
            created_at: now,
            ended_at: None,
            end_summary: None,
        })
    }

    async fn end_agent(&self, id: &str, summary: Option<String>) -> Result<AgentRecord> {
        let _guard = self.lock.lock().await;
        let existing = self.get_agent(id).await?;
        if existing.ended_at.is_some() {
            return Err(HowellError::conflict(format!("agent '{id}' already ended")));
        }
        let now = Utc::now();
        sqlx::query("UPDATE agents SET ended_at = ?, end_summary = ? WHERE id = ?")
            .bind(now)
            .bind(&summary)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(AgentRecord {
            ended_at: Some(now),
            end_summary: summary,
            ..existing
        })
    }

    async fn get_agent(&self, id: &str) -> Result<AgentRecord> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| HowellError::not_found(format!("agent '{id}'")))?;
        row_to_agent(&row)
    }

    async fn list_agents(&self, workspace: Option<&str>) -> Result<Vec<AgentRecord>> {
        let rows = match workspace {
            Some(ws) => sqlx::query("SELECT * FROM agents WHERE workspace = ? ORDER BY created_at DESC")
                .bind(ws)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?,
            None => sqlx::query("SELECT * FROM agents ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?,
        };
        rows.iter().map(row_to_agent).collect()
    }

    async fn add_note(&self, agent_id: &str, category: NoteCategory, content: String, tags: Vec<String>) -> Result<Note> {
        let _guard = self.lock.lock().await;
        self.get_agent(agent_id).await?;
        let now = Utc::now();
        let tags_json = serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string());
        let id: i64 = sqlx::query(
            "INSERT INTO notes (agent_id, category, content, tags, created_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(agent_id)
        .bind(category.as_str())
        .bind(&content)
        .bind(&tags_json)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?
        .try_get("id")
        .map_err(db_err)?;

        Ok(Note {
            id,
            agent_id: agent_id.to_string(),
            category,
            content,
            tags,
            created_at: now,
        })
    }

    async fn list_notes(&self, agent_id: Option<&str>, category: Option<NoteCategory>) -> Result<Vec<Note>> {
        let rows = sqlx::query("SELECT * FROM notes ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let notes: Result<Vec<Note>> = rows.iter().map(row_to_note).collect();
        let mut notes = notes?;
        if let Some(agent_id) = agent_id {
            notes.retain(|n| n.agent_id == agent_id);
        }
        if let Some(category) = category {
            notes.retain(|n| n.category == category);
        }
        Ok(notes)
    }

    async fn create_handoff(&self, from_agent: String, to_scope: String, content: String, priority: HandoffPriority) -> Result<Handoff> {
        let _guard = self.lock.lock().await;
        self.get_agent(&from_agent).await?;
        let now = Utc::now();
        let priority_str = match priority {
            HandoffPriority::Low => "low",
            HandoffPriority::Normal => "normal",
            HandoffPriority::High => "high",
            HandoffPriority::Critical => "critical",
        };
        let id: i64 = sqlx::query(
            "INSERT INTO handoffs (from_agent, to_scope, content, priority, claimed_by, created_at, claimed_at) VALUES (?, ?, ?, ?, NULL, ?, NULL) RETURNING id",
        )
        .bind(&from_agent)
        .bind(&to_scope)
        .bind(&content)
        .bind(priority_str)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?
        .try_get("id")
        .map_err(db_err)?;

        Ok(Handoff {
            id,
            from_agent,
            to_scope,
            content,
            priority,
            claimed_by: None,
            created_at: now,
            claimed_at: None,
        })
    }

    async fn claim_handoff(&self, id: i64, claimant: &str) -> Result<Handoff> {
        let _guard = self.lock.lock().await;
        let now = Utc::now();
        // Compare-and-set: the row only updates if claimed_by is still
        // null, so concurrent claimants race on this statement and
        // exactly one succeeds (spec.md §4.3, §5).
        let result = sqlx::query(
            "UPDATE handoffs SET claimed_by = ?, claimed_at = ? WHERE id = ? AND claimed_by IS NULL",
        )
        .bind(claimant)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(HowellError::conflict(format!("handoff '{id}' already claimed")));
        }

        let row = sqlx::query("SELECT * FROM handoffs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| HowellError::not_found(format!("handoff '{id}'")))?;
        row_to_handoff(&row)
    }

    async fn list_handoffs(&self, scope: &str, unclaimed_only: bool) -> Result<Vec<Handoff>> {
        let rows = sqlx::query("SELECT * FROM handoffs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let handoffs: Result<Vec<Handoff>> = rows.iter().map(row_to_handoff).collect();
        let mut handoffs = handoffs?;
        handoffs.retain(|h| h.to_scope == "*" || h.to_scope == scope);
        if unclaimed_only {
            handoffs.retain(|h| h.claimed_by.is_none());
        }
        Ok(handoffs)
    }

    async fn bootstrap_context(&self, workspace: &str, claimant: &str) -> Result<BootstrapContext> {
        let unclaimed = self.list_handoffs(workspace, true).await?;
        let mut claimed = Vec::with_capacity(unclaimed.len());
        for handoff in unclaimed {
            // Claim-all: each attempt either wins or loses the race to
            // another concurrent caller; losses are simply skipped
            // (§4.3 "races are tolerated").
            if let Ok(won) = self.claim_handoff(handoff.id, claimant).await {
                claimed.push(won);
            }
        }
        self.compose_bootstrap_context(workspace, claimed).await
    }

    async fn preview_bootstrap_context(&self, workspace: &str) -> Result<BootstrapContext> {
        let unclaimed = self.list_handoffs(workspace, true).await?;
        self.compose_bootstrap_context(workspace, unclaimed).await
    }

    async fn stats(&self) -> Result<std::collections::HashMap<String, u64>> {
        let mut stats = std::collections::HashMap::new();
        let agents: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM agents")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let notes: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notes")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let unclaimed: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM handoffs WHERE claimed_by IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        stats.insert("agents".to_string(), agents.0 as u64);
        stats.insert("notes".to_string(), notes.0 as u64);
        stats.insert("unclaimed_handoffs".to_string(), unclaimed.0 as u64);
        Ok(stats)
    }

    async fn reap_stale_claims(&self, active_ids: &[String], max_age: chrono::Duration) -> Result<Vec<i64>> {
        let _guard = self.lock.lock().await;
        let rows = sqlx::query("SELECT id, claimed_by, claimed_at FROM handoffs WHERE claimed_by IS NOT NULL")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let now = Utc::now();
        let mut released = Vec::new();
        for row in rows {
            let id: i64 = row.try_get("id").map_err(db_err)?;
            let claimed_by: String = row.try_get("claimed_by").map_err(db_err)?;
            let claimed_at: DateTime<Utc> = row.try_get("claimed_at").map_err(db_err)?;
            if active_ids.contains(&claimed_by) {
                continue;
            }
            if now.signed_duration_since(claimed_at) < max_age {
                continue;
            }
            sqlx::query("UPDATE handoffs SET claimed_by = NULL, claimed_at = NULL WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            released.push(id);
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let store = SqliteStratigraphyStore::connect_in_memory().await.unwrap();
        store.migrate().await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn agent_ids_increment_within_a_day() {
        let store = SqliteStratigraphyStore::connect_in_memory().await.unwrap();
        let a = store.register_agent("claude".to_string(), "web".to_string(), "opus".to_string(), None).await.unwrap();
        let b = store.register_agent("claude".to_string(), "web".to_string(), "opus".to_string(), None).await.unwrap();
        assert_ne!(a.id, b.id);
        let suffix_a: u32 = a.id.rsplit('-').next().unwrap().parse().unwrap();
        let suffix_b: u32 = b.id.rsplit('-').next().unwrap().parse().unwrap();
        assert_eq!(suffix_b, suffix_a + 1);
    }

    #[tokio::test]
    async fn end_agent_sets_once() {
        let store = SqliteStratigraphyStore::connect_in_memory().await.unwrap();
        let a = store.register_agent("claude".to_string(), "web".to_string(), "opus".to_string(), None).await.unwrap();
        store.end_agent(&a.id, Some("done".to_string())).await.unwrap();
        let err = store.end_agent(&a.id, None).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn note_category_is_validated_on_read() {
        let store = SqliteStratigraphyStore::connect_in_memory().await.unwrap();
        let a = store.register_agent("claude".to_string(), "web".to_string(), "opus".to_string(), None).await.unwrap();
        let note = store.add_note(&a.id, NoteCategory::Learned, "content".to_string(), vec!["tag".to_string()]).await.unwrap();
        assert_eq!(note.category, NoteCategory::Learned);
    }

    #[tokio::test]
    async fn scenario_s4_handoff_race_exactly_one_wins() {
        let store = SqliteStratigraphyStore::connect_in_memory().await.unwrap();
        let a = store.register_agent("claude".to_string(), "w".to_string(), "opus".to_string(), None).await.unwrap();
        let handoff = store
            .create_handoff(a.id.clone(), "w".to_string(), "content".to_string(), HandoffPriority::Normal)
            .await
            .unwrap();

        let first = store.claim_handoff(handoff.id, "g1").await;
        let second = store.claim_handoff(handoff.id, "g2").await;
        assert!(first.is_ok());
        assert!(second.is_err());

        let unclaimed = store.list_handoffs("w", true).await.unwrap();
        assert!(!unclaimed.iter().any(|h| h.id == handoff.id));
    }

    #[tokio::test]
    async fn bootstrap_context_claims_and_composes_agents_and_notes() {
        let store = SqliteStratigraphyStore::connect_in_memory().await.unwrap();
        let a = store.register_agent("claude".to_string(), "w".to_string(), "opus".to_string(), None).await.unwrap();
        store.add_note(&a.id, NoteCategory::Learned, "n1".to_string(), vec![]).await.unwrap();
        let handoff = store
            .create_handoff(a.id.clone(), "w".to_string(), "content".to_string(), HandoffPriority::Normal)
            .await
            .unwrap();

        let ctx = store.bootstrap_context("w", "claimer-1").await.unwrap();
        assert_eq!(ctx.recent_agents.len(), 1);
        assert_eq!(ctx.recent_agents[0].notes.len(), 1);
        assert_eq!(ctx.handoffs.len(), 1);
        assert_eq!(ctx.handoffs[0].claimed_by.as_deref(), Some("claimer-1"));

        let unclaimed = store.list_handoffs("w", true).await.unwrap();
        assert!(!unclaimed.iter().any(|h| h.id == handoff.id));
    }

    #[tokio::test]
    async fn preview_bootstrap_context_does_not_claim() {
        let store = SqliteStratigraphyStore::connect_in_memory().await.unwrap();
        let a = store.register_agent("claude".to_string(), "w".to_string(), "opus".to_string(), None).await.unwrap();
        store
            .create_handoff(a.id.clone(), "w".to_string(), "content".to_string(), HandoffPriority::Normal)
            .await
            .unwrap();

        let preview = store.preview_bootstrap_context("w").await.unwrap();
        assert_eq!(preview.handoffs.len(), 1);
        assert!(preview.handoffs[0].claimed_by.is_none());

        let still_unclaimed = store.list_handoffs("w", true).await.unwrap();
        assert_eq!(still_unclaimed.len(), 1);
    }

    #[tokio::test]
    async fn stale_claim_reaper_releases_only_inactive_old_claims() {
        let store = SqliteStratigraphyStore::connect_in_memory().await.unwrap();
        let a = store.register_agent("claude".to_string(), "w".to_string(), "opus".to_string(), None).await.unwrap();
        let handoff = store
            .create_handoff(a.id.clone(), "w".to_string(), "content".to_string(), HandoffPriority::Normal)
            .await
            .unwrap();
        store.claim_handoff(handoff.id, "ghost-instance").await.unwrap();

        let released = store.reap_stale_claims(&[], chrono::Duration::seconds(-1)).await.unwrap();
        assert_eq!(released, vec![handoff.id]);
    }
}
