use async_trait::async_trait;

use super::types::CompletionRequest;
use crate::core::errors::ProviderError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name used in logs (e.g. "openai_compatible")
    fn name(&self) -> &str;

    /// chat completion (non-streaming), single attempt
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
