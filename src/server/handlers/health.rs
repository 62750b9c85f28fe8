use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let tenants = state.config.tenant_ids().unwrap_or_default();
    Json(json!({
        "status": "ok",
        "agent": state.settings.agent_name,
        "version": env!("CARGO_PKG_VERSION"),
        "session_store": state.store().name(),
        "tenants": tenants,
    }))
}
