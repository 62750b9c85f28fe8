use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::CompletionRequest;
use crate::core::errors::ProviderError;

const CONTENT_FILTER: &str = "content_filter";

/// Chat completions against any OpenAI-compatible endpoint, including
/// Databricks model serving (`{host}/serving-endpoints`).
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Setup(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "stream": false,
        });
        if let (Some(obj), Some(max_tokens)) = (body.as_object_mut(), request.max_tokens) {
            obj.insert("max_tokens".to_string(), json!(max_tokens));
        }

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = builder.send().await.map_err(|e| ProviderError::Transient {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        })?;

        let status = res.status();
        tracing::debug!(status = %status, model = %request.model, "completion response received");

        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(classify_failure(status, text));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let choice = &payload["choices"][0];

        if choice["finish_reason"].as_str() == Some(CONTENT_FILTER) {
            return Err(ProviderError::ContentFiltered {
                status: Some(status.as_u16()),
            });
        }

        choice["message"]["content"]
            .as_str()
            .map(|content| content.to_string())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("missing choices[0].message.content".to_string())
            })
    }
}

fn classify_failure(status: StatusCode, body: String) -> ProviderError {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
            status: code,
            message: body,
        },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { message: body },
        StatusCode::BAD_REQUEST if is_content_filter_error(&body) => {
            ProviderError::ContentFiltered { status: Some(code) }
        }
        s if s == StatusCode::REQUEST_TIMEOUT || s.is_server_error() => ProviderError::Transient {
            status: Some(code),
            message: body,
        },
        _ => ProviderError::Rejected {
            status: code,
            message: body,
        },
    }
}

fn is_content_filter_error(body: &str) -> bool {
    let Ok(payload) = serde_json::from_str::<Value>(body) else {
        return body.contains(CONTENT_FILTER);
    };
    let error = &payload["error"];
    error["code"].as_str() == Some(CONTENT_FILTER)
        || error["type"].as_str() == Some(CONTENT_FILTER)
        || error["message"]
            .as_str()
            .map(|m| m.contains(CONTENT_FILTER))
            .unwrap_or(false)
}
