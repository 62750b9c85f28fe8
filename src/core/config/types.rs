use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Per-tenant agent configuration.
///
/// Every field has a default so partial documents deserialize; unknown keys
/// are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub system_prompt: String,
    /// Template with `{conversation}` and `{search_query}` placeholders.
    pub retrieval_prompt: String,
    /// Template with `{conversation}`, `{context}` and `{search_query}` placeholders.
    pub rag_prompt: String,
    /// Number of prior messages rendered into prompts.
    pub history_window: usize,
    #[serde(alias = "discovery_engine")]
    pub vector_search: VectorSearchConfig,
    pub retrieval_config: RetrievalConfig,
    pub llm_config: LlmConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retrieval_prompt: DEFAULT_RETRIEVAL_PROMPT.to_string(),
            rag_prompt: DEFAULT_RAG_PROMPT.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            vector_search: VectorSearchConfig::default(),
            retrieval_config: RetrievalConfig::default(),
            llm_config: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverKind {
    #[default]
    Databricks,
    DiscoveryEngine,
}

impl RetrieverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrieverKind::Databricks => "databricks",
            RetrieverKind::DiscoveryEngine => "discovery_engine",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSearchConfig {
    pub backend: RetrieverKind,
    /// Index name (Databricks) or data store id (Discovery Engine).
    #[serde(alias = "index_name", alias = "data_store_id")]
    pub corpus_id: Option<String>,
    pub endpoint_name: Option<String>,
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub columns: ColumnMap,
}

/// Maps snippet fields onto the columns of a Databricks index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub id: String,
    pub text: String,
    pub source: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            text: "chunk_text".to_string(),
            source: "source_path".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: u32,
    pub score_threshold: f32,
    /// Cap on the rendered `{context}` block in characters.
    pub max_context_chars: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            max_context_chars: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub retrieval_model: String,
    pub retrieval_temperature: f32,
    pub response_model: String,
    pub response_temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            retrieval_model: DEFAULT_RETRIEVAL_MODEL.to_string(),
            retrieval_temperature: DEFAULT_RETRIEVAL_TEMPERATURE,
            response_model: DEFAULT_RESPONSE_MODEL.to_string(),
            response_temperature: DEFAULT_RESPONSE_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}
