use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

pub async fn get_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    Ok(Json(state.config.raw()?))
}

pub async fn patch_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    state.config.update(payload)?;
    Ok(Json(json!({"status": "success"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::handlers::test_support::test_state;

    #[tokio::test]
    async fn patch_merges_and_get_redacts() {
        let state = test_state(None);

        patch_config(
            State(state.clone()),
            HeaderMap::new(),
            Json(json!({
                "retrieval_config": { "top_k": 2 },
                "observability": { "api_key": "sk-live" }
            })),
        )
        .await
        .unwrap();

        let Json(config) = get_config(State(state.clone()), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(config["retrieval_config"]["top_k"], json!(2));
        assert_eq!(config["observability"]["api_key"], json!("****"));
        assert_eq!(state.config.snapshot("default").unwrap().retrieval_config.top_k, 2);
    }

    #[tokio::test]
    async fn invalid_patch_is_bad_request_and_keeps_config() {
        let state = test_state(None);

        let err = patch_config(
            State(state.clone()),
            HeaderMap::new(),
            Json(json!({ "retrieval_config": { "top_k": 0 } })),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(state.config.snapshot("default").unwrap().retrieval_config.top_k, 7);
    }
}
