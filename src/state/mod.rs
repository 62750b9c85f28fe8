use std::sync::Arc;

use anyhow::anyhow;

use crate::core::config::{AppPaths, ConfigService, ConfigSource, RetrieverKind, Settings};
use crate::core::security::ApiKey;
use crate::history::{MemorySessionStore, SessionStore, SqliteSessionStore};
use crate::llm::{LlmProvider, OpenAiCompatibleProvider};
use crate::pipeline::{PipelineExecutor, PipelineTimeouts};
use crate::rag::{BackendRouter, DatabricksVectorSearch, DiscoveryEngineSearch, Retriever};

pub mod error;

use error::InitializationError;

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub config: ConfigService,
    pub api_key: ApiKey,
    pub executor: PipelineExecutor,
}

impl AppState {
    /// Loads the agent config, opens the checkpoint store and wires the
    /// LLM and retrieval backends named by `settings`.
    pub async fn initialize(
        settings: Settings,
        paths: AppPaths,
    ) -> Result<Arc<Self>, InitializationError> {
        let config = load_config(&settings, &paths).await?;
        let store = open_store(&paths).await;

        let base_url = settings.resolved_llm_base_url().ok_or_else(|| {
            InitializationError::Llm(anyhow!(
                "set SOP_AGENT_LLM_BASE_URL or DATABRICKS_HOST to reach a chat-completions endpoint"
            ))
        })?;
        let llm: Arc<dyn LlmProvider> = Arc::new(
            OpenAiCompatibleProvider::new(base_url, settings.resolved_llm_api_key())
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let retriever = build_retriever(&settings)?;

        let executor = PipelineExecutor::new(config.clone(), llm, retriever, store)
            .with_timeouts(PipelineTimeouts::from_settings(&settings));

        let state = Self::from_parts(settings, config, executor);
        if !state.api_key.is_enabled() {
            tracing::warn!(
                "SOP_AGENT_API_KEY is not set; the HTTP API accepts unauthenticated calls"
            );
        }
        Ok(state)
    }

    pub fn from_parts(
        settings: Settings,
        config: ConfigService,
        executor: PipelineExecutor,
    ) -> Arc<Self> {
        Arc::new(AppState {
            api_key: ApiKey::new(settings.api_key.clone()),
            settings: Arc::new(settings),
            config,
            executor,
        })
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        self.executor.store()
    }
}

async fn load_config(
    settings: &Settings,
    paths: &AppPaths,
) -> Result<ConfigService, InitializationError> {
    if let Some(url) = &settings.config_url {
        return ConfigService::load_remote(url, settings.retrieval_timeout)
            .await
            .map_err(|e| InitializationError::Config(e.into()));
    }

    let source = if paths.config_path.exists() {
        ConfigSource::File(paths.config_path.clone())
    } else {
        tracing::info!(
            "No agent config at {}, using defaults",
            paths.config_path.display()
        );
        ConfigSource::Defaults
    };
    ConfigService::load(source).map_err(|e| InitializationError::Config(e.into()))
}

async fn open_store(paths: &AppPaths) -> Arc<dyn SessionStore> {
    match SqliteSessionStore::open(&paths.checkpoint_path).await {
        Ok(store) => {
            tracing::info!("Checkpoint store opened at {}", store.path().display());
            Arc::new(store)
        }
        Err(err) => {
            tracing::warn!(
                "Failed to open checkpoint store at {}: {}; conversations will not survive a restart",
                paths.checkpoint_path.display(),
                err
            );
            Arc::new(MemorySessionStore::new())
        }
    }
}

fn build_retriever(settings: &Settings) -> Result<Arc<dyn Retriever>, InitializationError> {
    let mut router = BackendRouter::new();

    if let Some(host) = &settings.databricks_host {
        let databricks = DatabricksVectorSearch::new(
            host.clone(),
            settings.databricks_token.clone(),
            settings.default_vs_endpoint_name.clone(),
            settings.default_vs_index_name.clone(),
        )
        .map_err(|e| InitializationError::Retrieval(e.into()))?;
        router = router.with_backend(RetrieverKind::Databricks, Arc::new(databricks));
    } else {
        tracing::warn!("DATABRICKS_HOST is not set; Databricks vector search is unavailable");
    }

    let discovery_engine = DiscoveryEngineSearch::new(
        settings.gcp_access_token.clone(),
        settings.gcp_project_id.clone(),
        settings.gcp_location.clone(),
    )
    .map_err(|e| InitializationError::Retrieval(e.into()))?;
    router = router.with_backend(RetrieverKind::DiscoveryEngine, Arc::new(discovery_engine));

    Ok(Arc::new(router))
}
