use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{ConversationTurn, Role, SessionStore, ThreadSummary};
use crate::core::errors::PersistenceError;

/// Checkpoint store backed by a sqlite file.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteSessionStore {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(PersistenceError::unavailable)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS threads (
                tenant_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, thread_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS turns (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                message_id TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                sources TEXT NOT NULL DEFAULT '[]'
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_thread ON turns(tenant_id, thread_id, seq)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(
        &self,
        tenant_id: &str,
        thread_id: &str,
    ) -> Result<Vec<ConversationTurn>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT message_id, role, content, created_at, sources FROM turns \
             WHERE tenant_id = ? AND thread_id = ? ORDER BY seq ASC",
        )
        .bind(tenant_id)
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.try_get("role")?;
            let role = Role::parse(&role).ok_or_else(|| {
                PersistenceError::Unavailable(format!("unknown role '{}' in checkpoint", role))
            })?;
            let message_id: String = row.try_get("message_id")?;
            let sources: String = row.try_get("sources")?;
            let sources = serde_json::from_str(&sources).map_err(|e| {
                PersistenceError::Unavailable(format!(
                    "corrupt sources for turn '{}' in checkpoint: {}",
                    message_id, e
                ))
            })?;
            turns.push(ConversationTurn {
                message_id,
                role,
                content: row.try_get("content")?,
                created_at: row.try_get("created_at")?,
                sources,
            });
        }
        Ok(turns)
    }

    async fn append_all(
        &self,
        tenant_id: &str,
        thread_id: &str,
        turns: Vec<ConversationTurn>,
    ) -> Result<(), PersistenceError> {
        if turns.is_empty() {
            return Ok(());
        }
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO threads (tenant_id, thread_id, created_at, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(tenant_id, thread_id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(tenant_id)
        .bind(thread_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for turn in &turns {
            let sources =
                serde_json::to_string(&turn.sources).map_err(PersistenceError::unavailable)?;
            sqlx::query(
                "INSERT INTO turns (tenant_id, thread_id, message_id, role, content, created_at, sources) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(tenant_id)
            .bind(thread_id)
            .bind(&turn.message_id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(&turn.created_at)
            .bind(sources)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_threads(&self, tenant_id: &str) -> Result<Vec<ThreadSummary>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT t.thread_id, t.updated_at, COUNT(m.seq) AS turn_count \
             FROM threads t \
             LEFT JOIN turns m ON m.tenant_id = t.tenant_id AND m.thread_id = t.thread_id \
             WHERE t.tenant_id = ? \
             GROUP BY t.thread_id, t.updated_at \
             ORDER BY t.updated_at DESC \
             LIMIT 100",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut threads = Vec::with_capacity(rows.len());
        for row in rows {
            threads.push(ThreadSummary {
                thread_id: row.try_get("thread_id")?,
                turn_count: row.try_get("turn_count")?,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, SqliteSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints").join("sop_agent.sqlite");
        let store = SqliteSessionStore::open(path).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn unknown_thread_loads_empty() {
        let (_dir, store) = temp_store().await;
        let turns = store.load("default", "nobody").await.unwrap();
        assert!(turns.is_empty());
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn append_all_preserves_order_and_sources() {
        let (_dir, store) = temp_store().await;
        let user = ConversationTurn::user("What is the return window for electronics?");
        let agent = ConversationTurn::agent(
            "15 days.",
            vec!["returns/electronics.md".to_string()],
        );

        store
            .append_all("default", "t1", vec![user.clone(), agent.clone()])
            .await
            .unwrap();

        let turns = store.load("default", "t1").await.unwrap();
        assert_eq!(turns, vec![user, agent]);
    }

    #[tokio::test]
    async fn same_message_twice_is_two_turns() {
        let (_dir, store) = temp_store().await;
        let first = ConversationTurn::user("hello");
        let second = ConversationTurn::user("hello");

        store.append("default", "t1", first.clone()).await.unwrap();
        store.append("default", "t1", second.clone()).await.unwrap();

        let turns = store.load("default", "t1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].message_id, first.message_id);
        assert_eq!(turns[1].message_id, second.message_id);
    }

    #[tokio::test]
    async fn threads_are_scoped_by_tenant() {
        let (_dir, store) = temp_store().await;
        store
            .append("tenant_a", "shared", ConversationTurn::user("a"))
            .await
            .unwrap();
        store
            .append_all(
                "tenant_b",
                "shared",
                vec![ConversationTurn::user("b"), ConversationTurn::agent("ok", vec![])],
            )
            .await
            .unwrap();

        assert_eq!(store.load("tenant_a", "shared").await.unwrap().len(), 1);

        let threads = store.list_threads("tenant_b").await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].thread_id, "shared");
        assert_eq!(threads[0].turn_count, 2);
    }

    #[tokio::test]
    async fn failed_batch_appends_nothing() {
        let (_dir, store) = temp_store().await;
        let existing = ConversationTurn::user("first");
        store.append("default", "t1", existing.clone()).await.unwrap();

        // duplicate message id violates the unique constraint mid-batch
        let result = store
            .append_all(
                "default",
                "t1",
                vec![ConversationTurn::user("second"), existing.clone()],
            )
            .await;
        assert!(matches!(result, Err(PersistenceError::Unavailable(_))));

        let turns = store.load("default", "t1").await.unwrap();
        assert_eq!(turns, vec![existing]);
    }

    #[tokio::test]
    async fn corrupt_sources_fail_the_load() {
        let (_dir, store) = temp_store().await;
        let turn = ConversationTurn::agent("15 days.", vec!["returns/electronics.md".to_string()]);
        store.append("default", "t1", turn.clone()).await.unwrap();

        sqlx::query("UPDATE turns SET sources = ? WHERE message_id = ?")
            .bind("not json")
            .bind(&turn.message_id)
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.load("default", "t1").await.unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Unavailable(ref reason) if reason.contains(&turn.message_id)
        ));
    }

    #[tokio::test]
    async fn reopening_keeps_turns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sop_agent.sqlite");
        {
            let store = SqliteSessionStore::open(&path).await.unwrap();
            store
                .append("default", "default_thread", ConversationTurn::user("persist me"))
                .await
                .unwrap();
        }

        let reopened = SqliteSessionStore::open(&path).await.unwrap();
        let turns = reopened.load("default", "default_thread").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "persist me");
    }
}
