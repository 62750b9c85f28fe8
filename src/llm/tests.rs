use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::openai::OpenAiCompatibleProvider;
use super::provider::LlmProvider;
use super::types::{ChatMessage, CompletionRequest};
use crate::core::errors::ProviderError;

fn test_request() -> CompletionRequest {
    CompletionRequest::new(
        "databricks-meta-llama-3-3-70b-instruct",
        vec![
            ChatMessage::system("You are the SOP Assistant."),
            ChatMessage::user("What is the return window for electronics?"),
        ],
        0.1,
    )
    .with_max_tokens(128)
}

async fn provider_for(server: &MockServer) -> OpenAiCompatibleProvider {
    OpenAiCompatibleProvider::new(server.uri(), Some("test-token".to_string())).unwrap()
}

async fn mount_status(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_json(&body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn complete_returns_first_choice_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "model": "databricks-meta-llama-3-3-70b-instruct",
            "max_tokens": 128,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "electronics return window" },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let content = provider.complete(&test_request()).await.unwrap();

    assert_eq!(content, "electronics return window");
}

#[tokio::test]
async fn classifies_auth_and_rate_limit_failures() {
    let server = MockServer::start().await;
    mount_status(&server, 401, json!({ "error": { "message": "invalid token" } })).await;
    let provider = provider_for(&server).await;

    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Auth { status: 401, .. }));

    let server = MockServer::start().await;
    mount_status(&server, 429, json!({ "error": { "message": "slow down" } })).await;
    let provider = provider_for(&server).await;

    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited { .. }));
    assert_eq!(err.status(), Some(429));
}

#[tokio::test]
async fn server_errors_are_transient_and_carry_status() {
    let server = MockServer::start().await;
    mount_status(&server, 503, json!({ "error": { "message": "overloaded" } })).await;
    let provider = provider_for(&server).await;

    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Transient {
            status: Some(503),
            ..
        }
    ));
}

#[tokio::test]
async fn detects_content_filter_in_error_body_and_finish_reason() {
    let server = MockServer::start().await;
    mount_status(
        &server,
        400,
        json!({ "error": { "code": "content_filter", "message": "blocked" } }),
    )
    .await;
    let provider = provider_for(&server).await;
    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::ContentFiltered { status: Some(400) }
    ));

    let server = MockServer::start().await;
    mount_status(
        &server,
        200,
        json!({ "choices": [{ "message": { "content": "" }, "finish_reason": "content_filter" }] }),
    )
    .await;
    let provider = provider_for(&server).await;
    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::ContentFiltered { .. }));
}

#[tokio::test]
async fn request_timeout_is_transient() {
    let server = MockServer::start().await;
    mount_status(&server, 408, json!({ "error": { "message": "upstream timed out" } })).await;
    let provider = provider_for(&server).await;

    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Transient { status: Some(408), .. }));
}

#[tokio::test]
async fn other_client_errors_are_rejected() {
    let server = MockServer::start().await;
    mount_status(&server, 400, json!({ "error": { "message": "unknown model" } })).await;
    let provider = provider_for(&server).await;

    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));
}

#[tokio::test]
async fn missing_content_is_an_invalid_response() {
    let server = MockServer::start().await;
    mount_status(&server, 200, json!({ "choices": [] })).await;
    let provider = provider_for(&server).await;

    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_transient() {
    let provider =
        OpenAiCompatibleProvider::new("http://127.0.0.1:1", None).unwrap();

    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Transient { status: None, .. }));
}
