use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::utils::{resolve_tenant, resolve_thread};
use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::pipeline::TurnRequest;
use crate::rag::Snippet;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub search_query: String,
    pub sources: Vec<Snippet>,
    pub message_id: String,
    pub response_id: String,
    pub persisted: bool,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    require_api_key(&headers, &state.api_key)?;

    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message cannot be empty".to_string()));
    }

    let request = TurnRequest {
        tenant_id: resolve_tenant(payload.tenant_id.as_deref(), &headers),
        thread_id: resolve_thread(payload.thread_id.as_deref()),
        message: payload.message,
    };

    let output = state.executor.handle_turn(request).await?;

    Ok(Json(ChatResponse {
        answer: output.answer,
        search_query: output.search_query,
        persisted: output.persistence.is_persisted(),
        sources: output.snippets,
        message_id: output.message_id,
        response_id: output.response_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::handlers::test_support::test_state;
    use axum::http::HeaderValue;

    fn body(message: &str) -> Json<ChatRequest> {
        Json(ChatRequest {
            message: message.to_string(),
            tenant_id: None,
            thread_id: None,
        })
    }

    #[tokio::test]
    async fn answers_and_checkpoints_under_tenant_header() {
        let state = test_state(None);
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", HeaderValue::from_static("tenant_a"));

        let Json(response) = chat(
            State(state.clone()),
            headers,
            body("What is the return window for electronics?"),
        )
        .await
        .unwrap();

        assert_eq!(response.search_query, "electronics return window");
        assert_eq!(response.sources.len(), 1);
        assert!(response.persisted);

        let turns = state
            .store()
            .load("tenant_a", "default_thread")
            .await
            .unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].message_id, response.message_id);
    }

    #[tokio::test]
    async fn rejects_blank_message() {
        let state = test_state(None);
        let err = chat(State(state), HeaderMap::new(), body("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn requires_api_key_when_configured() {
        let state = test_state(Some("secret"));
        let err = chat(State(state.clone()), HeaderMap::new(), body("returns?"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("secret"));
        assert!(chat(State(state), headers, body("returns?")).await.is_ok());
    }
}
