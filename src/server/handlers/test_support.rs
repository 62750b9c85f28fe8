use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map};

use crate::core::config::{ConfigService, ConfigSource, Settings};
use crate::core::errors::{ProviderError, RetrievalError};
use crate::history::MemorySessionStore;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::pipeline::PipelineExecutor;
use crate::rag::{Retriever, SearchRequest, Snippet};
use crate::state::AppState;

/// Answers query formulation with a fixed query and synthesis with a fixed answer.
pub(crate) struct CannedLlm;

#[async_trait]
impl LlmProvider for CannedLlm {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        if request.max_tokens.is_some() {
            Ok("Electronics can be returned within 15 days.".to_string())
        } else {
            Ok("electronics return window".to_string())
        }
    }
}

pub(crate) struct CannedRetriever;

#[async_trait]
impl Retriever for CannedRetriever {
    fn name(&self) -> &str {
        "canned"
    }

    async fn search(&self, _request: &SearchRequest) -> Result<Vec<Snippet>, RetrievalError> {
        Ok(vec![Snippet {
            id: "1".to_string(),
            text: "Electronics may be returned within 15 days.".to_string(),
            score: 0.9,
            source: "returns/electronics.md".to_string(),
            metadata: Map::new(),
        }])
    }
}

/// State over in-memory fakes.
pub(crate) fn test_state(api_key: Option<&str>) -> Arc<AppState> {
    let mut settings = Settings::default();
    settings.api_key = api_key.map(str::to_string);

    let config = ConfigService::load(ConfigSource::Value(json!({
        "retrieval_config": { "top_k": 7, "score_threshold": 0.0 }
    })))
    .unwrap();
    let executor = PipelineExecutor::new(
        config.clone(),
        Arc::new(CannedLlm),
        Arc::new(CannedRetriever),
        Arc::new(MemorySessionStore::new()),
    );

    AppState::from_parts(settings, config, executor)
}
