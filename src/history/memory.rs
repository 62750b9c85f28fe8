use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ConversationTurn, SessionStore, ThreadSummary};
use crate::core::errors::PersistenceError;

type ThreadKey = (String, String);

/// Process-local store, used when the checkpoint file cannot be opened.
#[derive(Default)]
pub struct MemorySessionStore {
    threads: RwLock<HashMap<ThreadKey, Vec<ConversationTurn>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(
        &self,
        tenant_id: &str,
        thread_id: &str,
    ) -> Result<Vec<ConversationTurn>, PersistenceError> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(&(tenant_id.to_string(), thread_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn append_all(
        &self,
        tenant_id: &str,
        thread_id: &str,
        turns: Vec<ConversationTurn>,
    ) -> Result<(), PersistenceError> {
        let mut threads = self.threads.write().await;
        threads
            .entry((tenant_id.to_string(), thread_id.to_string()))
            .or_default()
            .extend(turns);
        Ok(())
    }

    async fn list_threads(&self, tenant_id: &str) -> Result<Vec<ThreadSummary>, PersistenceError> {
        let threads = self.threads.read().await;
        let mut summaries: Vec<ThreadSummary> = threads
            .iter()
            .filter(|((tenant, _), _)| tenant == tenant_id)
            .map(|((_, thread_id), turns)| ThreadSummary {
                thread_id: thread_id.clone(),
                turn_count: turns.len() as i64,
                updated_at: turns
                    .last()
                    .map(|t| t.created_at.clone())
                    .unwrap_or_default(),
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
