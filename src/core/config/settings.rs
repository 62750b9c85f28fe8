use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Process-level settings read from `SOP_AGENT_*` environment variables.
///
/// These cover how the service is wired (addresses, credentials, timeouts);
/// prompts and retrieval parameters live in the agent config document
/// served by [`super::ConfigService`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub agent_name: String,
    pub log_level: String,
    pub data_dir: Option<PathBuf>,
    pub checkpoint_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub config_url: Option<String>,
    /// Optional key required on the HTTP surface (`x-api-key`).
    pub api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub databricks_host: Option<String>,
    pub databricks_token: Option<String>,
    pub default_vs_endpoint_name: String,
    pub default_vs_index_name: String,
    pub gcp_project_id: Option<String>,
    pub gcp_location: String,
    pub gcp_access_token: Option<String>,
    pub llm_timeout: Duration,
    pub retrieval_timeout: Duration,
    pub persistence_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(default))
        };

        Settings {
            host: get("SOP_AGENT_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("SOP_AGENT_PORT")
                .or_else(|| get("PORT"))
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or(8000),
            agent_name: get("SOP_AGENT_NAME").unwrap_or_else(|| "SOP Assistant".to_string()),
            log_level: get("SOP_AGENT_LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            data_dir: get("SOP_AGENT_DATA_DIR").map(PathBuf::from),
            checkpoint_path: get("SOP_AGENT_CHECKPOINT_PATH")
                .or_else(|| get("CHECKPOINT_PATH"))
                .map(PathBuf::from),
            config_path: get("SOP_AGENT_CONFIG_PATH").map(PathBuf::from),
            config_url: get("SOP_AGENT_CONFIG_URL"),
            api_key: get("SOP_AGENT_API_KEY"),
            llm_base_url: get("SOP_AGENT_LLM_BASE_URL"),
            llm_api_key: get("SOP_AGENT_LLM_API_KEY"),
            databricks_host: get("DATABRICKS_HOST"),
            databricks_token: get("DATABRICKS_TOKEN"),
            default_vs_endpoint_name: get("VECTOR_SEARCH_ENDPOINT_NAME")
                .unwrap_or_else(|| "sop-policy-vectors".to_string()),
            default_vs_index_name: get("VECTOR_SEARCH_INDEX_NAME")
                .unwrap_or_else(|| "agent_brick.default.sop_policy_index".to_string()),
            gcp_project_id: get("GCP_PROJECT_ID"),
            gcp_location: get("GCP_LOCATION").unwrap_or_else(|| "us".to_string()),
            gcp_access_token: get("GCP_ACCESS_TOKEN"),
            llm_timeout: secs("SOP_AGENT_LLM_TIMEOUT_SECS", 60),
            retrieval_timeout: secs("SOP_AGENT_RETRIEVAL_TIMEOUT_SECS", 30),
            persistence_timeout: secs("SOP_AGENT_PERSISTENCE_TIMEOUT_SECS", 10),
        }
    }

    /// Chat-completions base URL: explicit override, else the Databricks
    /// serving-endpoints root.
    pub fn resolved_llm_base_url(&self) -> Option<String> {
        self.llm_base_url.clone().or_else(|| {
            self.databricks_host
                .as_ref()
                .map(|host| format!("{}/serving-endpoints", host.trim_end_matches('/')))
        })
    }

    pub fn resolved_llm_api_key(&self) -> Option<String> {
        self.llm_api_key
            .clone()
            .or_else(|| self.databricks_token.clone())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_service_conventions() {
        let settings = Settings::default();
        assert_eq!(settings.bind_addr(), "0.0.0.0:8000");
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.gcp_location, "us");
        assert_eq!(settings.llm_timeout, Duration::from_secs(60));
        assert!(settings.resolved_llm_base_url().is_none());
    }

    #[test]
    fn llm_endpoint_falls_back_to_databricks_host() {
        let settings = settings_from(&[
            ("DATABRICKS_HOST", "https://adb-123.azuredatabricks.net/"),
            ("DATABRICKS_TOKEN", "dapi-token"),
        ]);
        assert_eq!(
            settings.resolved_llm_base_url().as_deref(),
            Some("https://adb-123.azuredatabricks.net/serving-endpoints")
        );
        assert_eq!(settings.resolved_llm_api_key().as_deref(), Some("dapi-token"));

        let overridden = settings_from(&[
            ("DATABRICKS_HOST", "https://adb-123.azuredatabricks.net"),
            ("SOP_AGENT_LLM_BASE_URL", "http://localhost:4000/v1"),
        ]);
        assert_eq!(
            overridden.resolved_llm_base_url().as_deref(),
            Some("http://localhost:4000/v1")
        );
    }

    #[test]
    fn blank_and_malformed_values_fall_back() {
        let settings = settings_from(&[
            ("SOP_AGENT_PORT", "not-a-port"),
            ("SOP_AGENT_API_KEY", "   "),
            ("SOP_AGENT_LLM_TIMEOUT_SECS", "5"),
        ]);
        assert_eq!(settings.port, 8000);
        assert!(settings.api_key.is_none());
        assert_eq!(settings.llm_timeout, Duration::from_secs(5));
    }
}
