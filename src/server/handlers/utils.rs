use axum::http::HeaderMap;

use crate::core::config::defaults::{DEFAULT_TENANT, DEFAULT_THREAD};

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Explicit value, then the `X-Tenant-ID` header, then `default`.
pub fn resolve_tenant(explicit: Option<&str>, headers: &HeaderMap) -> String {
    non_blank(explicit)
        .or_else(|| non_blank(headers.get(TENANT_HEADER).and_then(|v| v.to_str().ok())))
        .unwrap_or(DEFAULT_TENANT)
        .to_string()
}

pub fn resolve_thread(explicit: Option<&str>) -> String {
    non_blank(explicit).unwrap_or(DEFAULT_THREAD).to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
