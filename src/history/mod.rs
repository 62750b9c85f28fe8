//! Conversation checkpoints keyed by (tenant, thread).

mod memory;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::PersistenceError;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "agent" => Some(Role::Agent),
            _ => None,
        }
    }
}

/// One message of a conversation. Turns are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub message_id: String,
    pub role: Role,
    pub content: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), Vec::new())
    }

    pub fn agent(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self::new(Role::Agent, content.into(), sources)
    }

    fn new(role: Role, content: String, sources: Vec<String>) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            created_at: chrono::Utc::now().to_rfc3339(),
            sources,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub turn_count: i64,
    pub updated_at: String,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    fn name(&self) -> &str;

    /// All turns of a thread in append order; unknown threads load as empty.
    async fn load(
        &self,
        tenant_id: &str,
        thread_id: &str,
    ) -> Result<Vec<ConversationTurn>, PersistenceError>;

    /// Durable before it returns.
    async fn append(
        &self,
        tenant_id: &str,
        thread_id: &str,
        turn: ConversationTurn,
    ) -> Result<(), PersistenceError> {
        self.append_all(tenant_id, thread_id, vec![turn]).await
    }

    /// Appends every turn or none of them.
    async fn append_all(
        &self,
        tenant_id: &str,
        thread_id: &str,
        turns: Vec<ConversationTurn>,
    ) -> Result<(), PersistenceError>;

    /// Threads of a tenant, most recently updated first.
    async fn list_threads(&self, tenant_id: &str) -> Result<Vec<ThreadSummary>, PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_turns_get_unique_ids_and_timestamps() {
        let first = ConversationTurn::user("hello");
        let second = ConversationTurn::user("hello");

        assert_ne!(first.message_id, second.message_id);
        assert!(chrono::DateTime::parse_from_rfc3339(&first.created_at).is_ok());
        assert_eq!(first.role, Role::User);
    }

    #[test]
    fn roles_round_trip_through_their_names() {
        for role in [Role::User, Role::Agent] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("assistant"), None);
    }
}
