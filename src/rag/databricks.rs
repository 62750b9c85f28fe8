use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use super::retriever::{
    classify_http_failure, rank_snippets, transport_failure, Retriever, SearchRequest, Snippet,
};
use crate::core::errors::RetrievalError;

/// Databricks Vector Search over the workspace REST API.
#[derive(Clone)]
pub struct DatabricksVectorSearch {
    host: String,
    token: Option<String>,
    default_endpoint: String,
    default_index: String,
    client: Client,
}

impl DatabricksVectorSearch {
    pub fn new(
        host: impl Into<String>,
        token: Option<String>,
        default_endpoint: impl Into<String>,
        default_index: impl Into<String>,
    ) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RetrievalError::Misconfigured(e.to_string()))?;
        Ok(Self {
            host: host.into().trim_end_matches('/').to_string(),
            token,
            default_endpoint: default_endpoint.into(),
            default_index: default_index.into(),
            client,
        })
    }
}

#[async_trait]
impl Retriever for DatabricksVectorSearch {
    fn name(&self) -> &str {
        "databricks"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Snippet>, RetrievalError> {
        let target = &request.target;
        let index = target
            .corpus_id
            .as_deref()
            .unwrap_or(&self.default_index);
        let endpoint = target
            .endpoint_name
            .as_deref()
            .unwrap_or(&self.default_endpoint);
        tracing::info!("Querying {} on {}", index, endpoint);

        let url = format!(
            "{}/api/2.0/vector-search/indexes/{}/query",
            self.host,
            urlencoding::encode(index)
        );
        let columns = &target.columns;
        let body = json!({
            "query_text": request.query,
            "columns": [columns.id, columns.text, columns.source],
            "num_results": request.top_k,
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let res = builder.send().await.map_err(transport_failure)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, index, text));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        let snippets = parse_query_response(&payload, request)?;
        Ok(rank_snippets(snippets, request.top_k, request.score_threshold))
    }
}

/// Reads the `manifest.columns` / `result.data_array` layout; the score is
/// the last column of every row.
fn parse_query_response(
    payload: &Value,
    request: &SearchRequest,
) -> Result<Vec<Snippet>, RetrievalError> {
    let Some(rows) = payload["result"]["data_array"].as_array() else {
        return Ok(Vec::new());
    };
    let manifest = payload["manifest"]["columns"].as_array().ok_or_else(|| {
        RetrievalError::InvalidResponse("missing manifest.columns".to_string())
    })?;
    let column_index: HashMap<&str, usize> = manifest
        .iter()
        .enumerate()
        .filter_map(|(i, col)| col["name"].as_str().map(|name| (name, i)))
        .collect();

    let columns = &request.target.columns;
    let cell = |row: &[Value], name: &str| -> String {
        column_index
            .get(name)
            .and_then(|&i| row.get(i))
            .map(value_to_string)
            .unwrap_or_default()
    };

    let mut snippets = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(row) = row.as_array().map(Vec::as_slice) else {
            continue;
        };
        let Some(score) = row.last().and_then(|v| v.as_f64()) else {
            continue;
        };

        let source = cell(row, columns.source.as_str());
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::String(source.clone()));

        snippets.push(Snippet {
            id: cell(row, columns.id.as_str()),
            text: cell(row, columns.text.as_str()),
            score: score as f32,
            source,
            metadata,
        });
    }
    Ok(snippets)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
