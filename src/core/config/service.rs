use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::{Map, Value};

use super::defaults::DEFAULT_TENANT;
use super::types::AgentConfig;
use super::validation::validate_config;
use crate::core::errors::ConfigError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 10] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
    "client_secret",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 2] = ["max_tokens", "tokens"];

/// Where the initial agent configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    File(PathBuf),
    Value(Value),
    Defaults,
}

/// A parsed, validated configuration document.
struct ConfigState {
    document: Value,
    tenants: HashMap<String, Arc<AgentConfig>>,
    multi_tenant: bool,
}

/// Owned configuration store.
///
/// Readers take an `Arc<AgentConfig>` snapshot per turn. Updates merge into a
/// copy of the current document, validate and re-parse it, then swap the
/// whole state in one step; a rejected update leaves the store untouched.
#[derive(Clone)]
pub struct ConfigService {
    state: Arc<RwLock<Arc<ConfigState>>>,
}

impl ConfigService {
    pub fn load(source: ConfigSource) -> Result<Self, ConfigError> {
        let document = match source {
            ConfigSource::File(path) => load_file(&path)?,
            ConfigSource::Value(value) => value,
            ConfigSource::Defaults => Value::Object(Map::new()),
        };
        Self::from_document(document)
    }

    /// Fetches the document from `url`; the body may be JSON or YAML.
    pub async fn load_remote(url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Remote(e.to_string()))?;
        let res = client
            .get(url)
            .send()
            .await
            .map_err(|e| ConfigError::Remote(e.to_string()))?;

        if !res.status().is_success() {
            return Err(ConfigError::Remote(format!(
                "{} returned status {}",
                url,
                res.status()
            )));
        }

        let body = res
            .text()
            .await
            .map_err(|e| ConfigError::Remote(e.to_string()))?;
        let document = parse_yaml(&body)?;
        tracing::info!("Loaded agent config from {}", url);
        Self::from_document(document)
    }

    fn from_document(document: Value) -> Result<Self, ConfigError> {
        let state = build_state(document)?;
        Ok(Self {
            state: Arc::new(RwLock::new(Arc::new(state))),
        })
    }

    /// Immutable configuration for one turn of `tenant_id`.
    ///
    /// Unknown tenants fall back to the `default` tenant.
    pub fn snapshot(&self, tenant_id: &str) -> Result<Arc<AgentConfig>, ConfigError> {
        let state = self.current()?;
        if let Some(config) = state.tenants.get(tenant_id) {
            return Ok(config.clone());
        }

        let fallback = state
            .tenants
            .get(DEFAULT_TENANT)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownTenant(tenant_id.to_string()))?;
        if state.multi_tenant {
            tracing::warn!(
                "Tenant {} not found, falling back to '{}'",
                tenant_id,
                DEFAULT_TENANT
            );
        }
        Ok(fallback)
    }

    /// Deep-merges `partial` into the current document.
    pub fn update(&self, partial: Value) -> Result<(), ConfigError> {
        if !partial.is_object() {
            return Err(ConfigError::invalid("root", "expected object"));
        }

        let mut guard = self.state.write().map_err(|_| ConfigError::Poisoned)?;
        let restored = restore_redacted_values(&partial, &guard.document);
        let merged = deep_merge(&guard.document, &restored);
        let next = build_state(merged)?;
        *guard = Arc::new(next);
        tracing::info!("Agent config updated");
        Ok(())
    }

    pub fn document(&self) -> Result<Value, ConfigError> {
        Ok(self.current()?.document.clone())
    }

    /// The current document with credential-like values masked.
    pub fn raw(&self) -> Result<Value, ConfigError> {
        Ok(redact_sensitive_values(&self.current()?.document))
    }

    pub fn tenant_ids(&self) -> Result<Vec<String>, ConfigError> {
        let state = self.current()?;
        let mut ids: Vec<String> = state.tenants.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn current(&self) -> Result<Arc<ConfigState>, ConfigError> {
        let guard = self.state.read().map_err(|_| ConfigError::Poisoned)?;
        Ok(guard.clone())
    }
}

fn build_state(document: Value) -> Result<ConfigState, ConfigError> {
    validate_config(&document)?;

    let mut tenants = HashMap::new();
    let multi_tenant = match document.get("tenants").and_then(|v| v.as_object()) {
        Some(entries) => {
            for (tenant_id, entry) in entries {
                let config: AgentConfig = serde_json::from_value(entry.clone()).map_err(|e| {
                    ConfigError::Parse(format!("tenants.{}: {}", tenant_id, e))
                })?;
                tenants.insert(tenant_id.clone(), Arc::new(config));
            }
            true
        }
        None => {
            let config: AgentConfig = serde_json::from_value(document.clone())
                .map_err(|e| ConfigError::Parse(e.to_string()))?;
            tenants.insert(DEFAULT_TENANT.to_string(), Arc::new(config));
            false
        }
    };

    Ok(ConfigState {
        document,
        tenants,
        multi_tenant,
    })
}

fn load_file(path: &Path) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let document = if is_toml {
        toml::from_str::<Value>(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?
    } else {
        parse_yaml(&contents)?
    };
    tracing::info!("Loaded agent config from {}", path.display());
    Ok(document)
}

// YAML is a superset of JSON, so this covers both.
fn parse_yaml(contents: &str) -> Result<Value, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_yaml::from_str::<Value>(contents).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

// A client that round-trips a redacted document must not overwrite secrets
// with the placeholder.
fn restore_redacted_values(new_value: &Value, original: &Value) -> Value {
    match new_value {
        Value::Object(map) => {
            let mut restored = Map::new();
            let original_map = original.as_object();

            for (key, value) in map {
                let orig_val = original_map.and_then(|m| m.get(key));
                if value.as_str() == Some(REDACT_PLACEHOLDER) {
                    if let Some(orig) = orig_val {
                        restored.insert(key.clone(), orig.clone());
                    }
                    continue;
                }

                if value.is_object() {
                    let merged = restore_redacted_values(value, orig_val.unwrap_or(&Value::Null));
                    restored.insert(key.clone(), merged);
                } else {
                    restored.insert(key.clone(), value.clone());
                }
            }

            Value::Object(restored)
        }
        _ => new_value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
