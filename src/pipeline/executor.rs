use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::Instrument;

use super::prompt::{render_conversation, render_conversation_with, render_template};
use crate::core::config::{AgentConfig, ConfigService, Settings};
use crate::core::errors::{
    PersistenceError, PipelineError, ProviderError, RetrievalError, Stage,
};
use crate::history::{ConversationTurn, SessionStore};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::rag::{RagContextBuilder, Retriever, SearchRequest, Snippet};

/// Upper bounds for each kind of external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTimeouts {
    pub llm: Duration,
    pub retrieval: Duration,
    pub persistence: Duration,
}

impl Default for PipelineTimeouts {
    fn default() -> Self {
        Self {
            llm: Duration::from_secs(60),
            retrieval: Duration::from_secs(30),
            persistence: Duration::from_secs(10),
        }
    }
}

impl PipelineTimeouts {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            llm: settings.llm_timeout,
            retrieval: settings.retrieval_timeout,
            persistence: settings.persistence_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub tenant_id: String,
    pub thread_id: String,
    pub message: String,
}

/// Result of the three stages, before anything is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnAnswer {
    pub search_query: String,
    pub snippets: Vec<Snippet>,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PersistenceStatus {
    Persisted,
    Failed(String),
}

impl PersistenceStatus {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistenceStatus::Persisted)
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub answer: String,
    pub search_query: String,
    pub snippets: Vec<Snippet>,
    pub sources: Vec<String>,
    /// Id of the user turn that triggered this answer.
    pub message_id: String,
    /// Id of the agent turn holding the answer.
    pub response_id: String,
    pub persistence: PersistenceStatus,
}

/// Runs query formulation, retrieval and answer synthesis for one user turn,
/// then checkpoints the completed exchange.
#[derive(Clone)]
pub struct PipelineExecutor {
    config: ConfigService,
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<dyn Retriever>,
    store: Arc<dyn SessionStore>,
    timeouts: PipelineTimeouts,
}

impl PipelineExecutor {
    pub fn new(
        config: ConfigService,
        llm: Arc<dyn LlmProvider>,
        retriever: Arc<dyn Retriever>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            llm,
            retriever,
            store,
            timeouts: PipelineTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: PipelineTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutput, PipelineError> {
        let span = tracing::info_span!(
            "turn",
            tenant = %request.tenant_id,
            thread = %request.thread_id
        );
        self.handle_turn_inner(request).instrument(span).await
    }

    async fn handle_turn_inner(&self, request: TurnRequest) -> Result<TurnOutput, PipelineError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(PipelineError::InvalidInput(
                "message cannot be empty".to_string(),
            ));
        }

        let config = self.config.snapshot(&request.tenant_id)?;

        let history = bounded(
            self.timeouts.persistence,
            self.store.load(&request.tenant_id, &request.thread_id),
            |after| PersistenceError::Unavailable(format!("load timed out after {:?}", after)),
        )
        .await?;

        let answer = self.run(&config, &history, message).await?;

        let user_turn = ConversationTurn::user(message);
        let agent_turn = ConversationTurn::agent(
            answer.answer.clone(),
            RagContextBuilder::sources(&answer.snippets),
        );
        let message_id = user_turn.message_id.clone();
        let response_id = agent_turn.message_id.clone();
        let sources = agent_turn.sources.clone();

        let persisted = bounded(
            self.timeouts.persistence,
            self.store.append_all(
                &request.tenant_id,
                &request.thread_id,
                vec![user_turn, agent_turn],
            ),
            |after| PersistenceError::Unavailable(format!("append timed out after {:?}", after)),
        )
        .await;
        let persistence = match persisted {
            Ok(()) => PersistenceStatus::Persisted,
            Err(err) => {
                tracing::warn!("Answer delivered but turn was not checkpointed: {}", err);
                PersistenceStatus::Failed(err.to_string())
            }
        };

        Ok(TurnOutput {
            answer: answer.answer,
            search_query: answer.search_query,
            snippets: answer.snippets,
            sources,
            message_id,
            response_id,
            persistence,
        })
    }

    /// The three stages over an already-loaded history. Persists nothing.
    pub async fn run(
        &self,
        config: &AgentConfig,
        history: &[ConversationTurn],
        message: &str,
    ) -> Result<TurnAnswer, PipelineError> {
        let search_query = self.formulate_query(config, history, message).await?;
        tracing::info!(query = %search_query, "Generated search query");

        let request = SearchRequest::from_config(search_query.clone(), config);
        let snippets = bounded(
            self.timeouts.retrieval,
            self.retriever.search(&request),
            RetrievalError::timed_out,
        )
        .await?;
        tracing::info!(count = snippets.len(), "Retrieved policy snippets");

        let answer = self
            .synthesize_answer(config, history, message, &snippets)
            .await?;

        Ok(TurnAnswer {
            search_query,
            snippets,
            answer,
        })
    }

    async fn formulate_query(
        &self,
        config: &AgentConfig,
        history: &[ConversationTurn],
        message: &str,
    ) -> Result<String, PipelineError> {
        let conversation = render_conversation(history, config.history_window);
        let prompt = render_template(
            &config.retrieval_prompt,
            &[("conversation", conversation.as_str()), ("search_query", message)],
        );
        tracing::debug!(prompt = %prompt, "Query formulation prompt");

        let request = CompletionRequest::new(
            config.llm_config.retrieval_model.clone(),
            vec![ChatMessage::user(prompt)],
            config.llm_config.retrieval_temperature,
        );
        let raw = self.complete(Stage::QueryFormulation, &request).await?;

        let query = raw.trim();
        if query.is_empty() {
            return Err(PipelineError::Provider {
                stage: Stage::QueryFormulation,
                source: ProviderError::InvalidResponse("empty search query".to_string()),
            });
        }
        Ok(query.to_string())
    }

    async fn synthesize_answer(
        &self,
        config: &AgentConfig,
        history: &[ConversationTurn],
        message: &str,
        snippets: &[Snippet],
    ) -> Result<String, PipelineError> {
        let conversation = render_conversation_with(history, config.history_window, message);
        let context = RagContextBuilder::new(config.retrieval_config.max_context_chars)
            .build(snippets);
        // the answer prompt sees the user's own wording, not the rewritten query
        let prompt = render_template(
            &config.rag_prompt,
            &[
                ("conversation", conversation.as_str()),
                ("context", context.as_str()),
                ("search_query", message),
            ],
        );
        tracing::debug!(prompt = %prompt, "Answer synthesis prompt");

        let mut messages = Vec::with_capacity(2);
        if !config.system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(config.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(prompt));

        let request = CompletionRequest::new(
            config.llm_config.response_model.clone(),
            messages,
            config.llm_config.response_temperature,
        )
        .with_max_tokens(config.llm_config.max_tokens);

        let answer = self.complete(Stage::AnswerSynthesis, &request).await?;
        Ok(answer.trim().to_string())
    }

    async fn complete(
        &self,
        stage: Stage,
        request: &CompletionRequest,
    ) -> Result<String, PipelineError> {
        bounded(
            self.timeouts.llm,
            self.llm.complete(request),
            ProviderError::timed_out,
        )
        .await
        .map_err(|source| {
            tracing::error!(
                stage = %stage,
                provider = self.llm.name(),
                "LLM call failed: {}",
                source
            );
            PipelineError::Provider { stage, source }
        })
    }
}

async fn bounded<T, E, F>(
    limit: Duration,
    fut: F,
    on_elapsed: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_elapsed(limit)),
    }
}
