use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::utils::resolve_tenant;
use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::history::{ConversationTurn, ThreadSummary};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Option<String>,
}

pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Vec<ThreadSummary>>, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let tenant_id = resolve_tenant(query.tenant_id.as_deref(), &headers);
    let threads = state.store().list_threads(&tenant_id).await?;
    Ok(Json(threads))
}

pub async fn get_thread_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Vec<ConversationTurn>>, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let tenant_id = resolve_tenant(query.tenant_id.as_deref(), &headers);
    let turns = state.store().load(&tenant_id, &thread_id).await?;
    Ok(Json(turns))
}
