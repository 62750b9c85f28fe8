use std::sync::Arc;

use async_trait::async_trait;

use super::retriever::{Retriever, SearchRequest, Snippet};
use crate::core::config::RetrieverKind;
use crate::core::errors::RetrievalError;

/// Dispatches each search to the backend named by the tenant's
/// `vector_search.backend`.
#[derive(Clone, Default)]
pub struct BackendRouter {
    databricks: Option<Arc<dyn Retriever>>,
    discovery_engine: Option<Arc<dyn Retriever>>,
}

impl BackendRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, kind: RetrieverKind, retriever: Arc<dyn Retriever>) -> Self {
        match kind {
            RetrieverKind::Databricks => self.databricks = Some(retriever),
            RetrieverKind::DiscoveryEngine => self.discovery_engine = Some(retriever),
        }
        self
    }

    fn backend(&self, kind: RetrieverKind) -> Option<&Arc<dyn Retriever>> {
        match kind {
            RetrieverKind::Databricks => self.databricks.as_ref(),
            RetrieverKind::DiscoveryEngine => self.discovery_engine.as_ref(),
        }
    }
}

#[async_trait]
impl Retriever for BackendRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Snippet>, RetrievalError> {
        let kind = request.target.backend;
        let backend = self.backend(kind).ok_or_else(|| {
            RetrievalError::Misconfigured(format!("no '{}' retriever is configured", kind.as_str()))
        })?;
        tracing::debug!(backend = backend.name(), "dispatching retrieval");
        backend.search(request).await
    }
}
