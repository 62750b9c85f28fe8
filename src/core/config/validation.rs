use serde_json::{Map, Value};

use crate::core::errors::ConfigError;

const TENANTS_KEY: &str = "tenants";

/// Structural checks on a raw config document before it is parsed.
///
/// Unknown keys are ignored; only fields the agent reads are checked.
pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    match root.get(TENANTS_KEY) {
        Some(Value::Object(tenants)) => {
            if tenants.is_empty() {
                return Err(ConfigError::invalid(
                    TENANTS_KEY,
                    "at least one tenant is required",
                ));
            }
            for (tenant_id, value) in tenants {
                let prefix = format!("{}.{}", TENANTS_KEY, tenant_id);
                let entry = value
                    .as_object()
                    .ok_or_else(|| config_type_error(&prefix, "object"))?;
                validate_agent_section(entry, &prefix)?;
            }
            Ok(())
        }
        Some(_) => Err(config_type_error(TENANTS_KEY, "object")),
        None => validate_agent_section(root, ""),
    }
}

fn validate_agent_section(section: &Map<String, Value>, prefix: &str) -> Result<(), ConfigError> {
    let path = |key: &str| join_path(prefix, key);

    validate_optional_string_field(section, &path("system_prompt"), "system_prompt")?;
    validate_non_empty_string_field(section, &path("retrieval_prompt"), "retrieval_prompt")?;
    validate_non_empty_string_field(section, &path("rag_prompt"), "rag_prompt")?;
    validate_u64_field(section, &path("history_window"), "history_window", 0, 100)?;

    let vector_search = match (
        expect_optional_object(section, "vector_search", &path("vector_search"))?,
        expect_optional_object(section, "discovery_engine", &path("discovery_engine"))?,
    ) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::invalid(
                path("vector_search"),
                "use either 'vector_search' or 'discovery_engine', not both",
            ))
        }
        (Some(vs), None) => Some((vs, path("vector_search"))),
        (None, Some(de)) => Some((de, path("discovery_engine"))),
        (None, None) => None,
    };
    if let Some((vs, vs_path)) = vector_search {
        let vs_field = |key: &str| join_path(&vs_path, key);
        if let Some(backend) = vs.get("backend") {
            match backend.as_str() {
                Some("databricks") | Some("discovery_engine") => {}
                _ => {
                    return Err(ConfigError::invalid(
                        vs_field("backend"),
                        "expected one of 'databricks', 'discovery_engine'",
                    ))
                }
            }
        }
        for key in [
            "corpus_id",
            "index_name",
            "data_store_id",
            "endpoint_name",
            "project_id",
            "location",
        ] {
            validate_optional_string_field(vs, &vs_field(key), key)?;
        }
        if let Some(columns) = expect_optional_object(vs, "columns", &vs_field("columns"))? {
            let columns_path = vs_field("columns");
            for key in ["id", "text", "source"] {
                validate_non_empty_string_field(columns, &join_path(&columns_path, key), key)?;
            }
        }
    }

    if let Some(retrieval) =
        expect_optional_object(section, "retrieval_config", &path("retrieval_config"))?
    {
        let field = |key: &str| join_path(&path("retrieval_config"), key);
        validate_u64_field(retrieval, &field("top_k"), "top_k", 1, 1_000)?;
        validate_f64_field(retrieval, &field("score_threshold"), "score_threshold", 0.0, 1.0)?;
        if !matches!(retrieval.get("max_context_chars"), None | Some(Value::Null)) {
            validate_u64_field(
                retrieval,
                &field("max_context_chars"),
                "max_context_chars",
                1,
                1_000_000,
            )?;
        }
    }

    if let Some(llm) = expect_optional_object(section, "llm_config", &path("llm_config"))? {
        let field = |key: &str| join_path(&path("llm_config"), key);
        validate_non_empty_string_field(llm, &field("retrieval_model"), "retrieval_model")?;
        validate_non_empty_string_field(llm, &field("response_model"), "response_model")?;
        validate_f64_field(
            llm,
            &field("retrieval_temperature"),
            "retrieval_temperature",
            0.0,
            2.0,
        )?;
        validate_f64_field(
            llm,
            &field("response_temperature"),
            "response_temperature",
            0.0,
            2.0,
        )?;
        validate_u64_field(llm, &field("max_tokens"), "max_tokens", 1, 1_000_000)?;
    }

    Ok(())
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn expect_optional_object<'a>(
    section: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match section.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(path, "object")),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        let expected = if min > 0 {
            "positive integer"
        } else {
            "non-negative integer"
        };
        return Err(config_type_error(path, expected));
    };
    if number < min || number > max {
        return Err(ConfigError::invalid(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if !(min..=max).contains(&number) {
        return Err(ConfigError::invalid(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    match section.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(config_type_error(path, "string")),
    }
}

fn validate_non_empty_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ConfigError::invalid(path, "value cannot be empty"));
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::invalid(path, format!("expected {}", expected))
}
