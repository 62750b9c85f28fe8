use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use super::retriever::{
    classify_http_failure, rank_snippets, transport_failure, Retriever, SearchRequest, Snippet,
};
use crate::core::errors::RetrievalError;

const GLOBAL_LOCATION: &str = "global";
const STRUCT_FIELDS: [&str; 8] = [
    "name", "title", "price", "model", "sku", "url", "brand", "category",
];

/// Google Discovery Engine chunk search over the REST API.
///
/// The API reports no relevance score; results get `1.0 - 0.05 * rank`.
#[derive(Clone)]
pub struct DiscoveryEngineSearch {
    access_token: Option<String>,
    default_project_id: Option<String>,
    default_location: String,
    base_url: Option<String>,
    client: Client,
}

impl DiscoveryEngineSearch {
    pub fn new(
        access_token: Option<String>,
        default_project_id: Option<String>,
        default_location: impl Into<String>,
    ) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RetrievalError::Misconfigured(e.to_string()))?;
        Ok(Self {
            access_token,
            default_project_id,
            default_location: default_location.into(),
            base_url: None,
            client,
        })
    }

    /// Overrides the API host (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    fn api_root(&self, location: &str) -> String {
        if let Some(base) = &self.base_url {
            return base.trim_end_matches('/').to_string();
        }
        if location == GLOBAL_LOCATION {
            "https://discoveryengine.googleapis.com".to_string()
        } else {
            format!("https://{}-discoveryengine.googleapis.com", location)
        }
    }
}

#[async_trait]
impl Retriever for DiscoveryEngineSearch {
    fn name(&self) -> &str {
        "discovery_engine"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Snippet>, RetrievalError> {
        let target = &request.target;
        let project_id = target
            .project_id
            .as_deref()
            .or(self.default_project_id.as_deref())
            .ok_or_else(|| {
                RetrievalError::Misconfigured("GCP project id is required".to_string())
            })?;
        let data_store_id = target.corpus_id.as_deref().ok_or_else(|| {
            RetrievalError::Misconfigured("Discovery Engine data store id is required".to_string())
        })?;
        let location = target
            .location
            .as_deref()
            .unwrap_or(&self.default_location);

        let url = format!(
            "{}/v1beta/projects/{}/locations/{}/collections/default_collection/dataStores/{}/servingConfigs/default_config:search",
            self.api_root(location),
            urlencoding::encode(project_id),
            urlencoding::encode(location),
            urlencoding::encode(data_store_id),
        );
        tracing::info!("Querying Discovery Engine datastore: {}", data_store_id);

        let body = json!({
            "query": request.query,
            "pageSize": request.top_k,
            "contentSearchSpec": {
                "snippetSpec": { "returnSnippet": false },
                "searchResultMode": "CHUNKS",
            },
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        let res = builder.send().await.map_err(transport_failure)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, data_store_id, text));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        let snippets = parse_search_response(&payload, data_store_id);
        tracing::info!("Discovery Engine returned {} results", snippets.len());
        Ok(rank_snippets(snippets, request.top_k, request.score_threshold))
    }
}

fn parse_search_response(payload: &Value, data_store_id: &str) -> Vec<Snippet> {
    let Some(results) = payload["results"].as_array() else {
        return Vec::new();
    };

    results
        .iter()
        .enumerate()
        .map(|(rank, result)| {
            let chunk = &result["chunk"];
            let document = &result["document"];

            let text = chunk["content"]
                .as_str()
                .or_else(|| document["derivedStructData"]["snippets"][0]["snippet"].as_str())
                .unwrap_or_default()
                .to_string();

            let mut metadata = Map::new();
            metadata.insert("data_store_id".to_string(), json!(data_store_id));
            if let Some(id) = document["id"].as_str() {
                metadata.insert("document_id".to_string(), json!(id));
            }
            if let Some(name) = document["name"].as_str() {
                metadata.insert("document_name".to_string(), json!(name));
            }
            if let Some(data) = document["derivedStructData"].as_object() {
                for field in STRUCT_FIELDS {
                    if let Some(value) = data.get(field) {
                        metadata.insert(field.to_string(), value.clone());
                    }
                }
            }
            if let Some(id) = chunk["id"].as_str() {
                metadata.insert("chunk_id".to_string(), json!(id));
            }
            let uri = chunk["documentMetadata"]["uri"]
                .as_str()
                .or_else(|| document["derivedStructData"]["link"].as_str());
            if let Some(uri) = uri {
                metadata.insert("source_uri".to_string(), json!(uri));
            }

            let id = chunk["id"]
                .as_str()
                .or_else(|| document["id"].as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("result_{}", rank));
            let source = uri
                .or_else(|| document["name"].as_str())
                .unwrap_or(data_store_id)
                .to_string();

            Snippet {
                id,
                text,
                score: 1.0 - 0.05 * rank as f32,
                source,
                metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RetrieverKind, VectorSearchConfig};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_PATH: &str = "/v1beta/projects/acme/locations/us/collections/default_collection/dataStores/sop-store/servingConfigs/default_config:search";

    fn request(top_k: u32, score_threshold: f32) -> SearchRequest {
        SearchRequest {
            query: "electronics return window".to_string(),
            top_k,
            score_threshold,
            target: VectorSearchConfig {
                backend: RetrieverKind::DiscoveryEngine,
                corpus_id: Some("sop-store".to_string()),
                project_id: Some("acme".to_string()),
                location: Some("us".to_string()),
                ..Default::default()
            },
        }
    }

    fn chunk_results(count: usize) -> Value {
        let results: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "id": format!("c{i}"),
                    "chunk": {
                        "id": format!("c{i}"),
                        "content": format!("Policy passage {i}"),
                        "documentMetadata": { "uri": format!("gs://sop/policy-{i}.pdf"), "title": "Policy" }
                    }
                })
            })
            .collect();
        json!({ "results": results })
    }

    fn retriever_for(server: &MockServer) -> DiscoveryEngineSearch {
        DiscoveryEngineSearch::new(Some("ya29.test".to_string()), None, "us")
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn scores_by_rank_and_applies_threshold() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .and(header("authorization", "Bearer ya29.test"))
            .and(body_partial_json(json!({
                "query": "electronics return window",
                "pageSize": 7,
                "contentSearchSpec": { "searchResultMode": "CHUNKS" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chunk_results(5)))
            .mount(&server)
            .await;

        let snippets = retriever_for(&server).search(&request(7, 0.84)).await.unwrap();

        // ranks 0..=3 score 1.0, 0.95, 0.9, 0.85; rank 4 scores 0.8
        assert_eq!(snippets.len(), 4);
        assert_eq!(snippets[0].id, "c0");
        assert_eq!(snippets[0].score, 1.0);
        assert_eq!(snippets[1].source, "gs://sop/policy-1.pdf");
        assert_eq!(snippets[2].text, "Policy passage 2");
        assert_eq!(snippets[0].metadata["data_store_id"], json!("sop-store"));
    }

    #[tokio::test]
    async fn falls_back_to_document_snippets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "document": {
                        "id": "doc-1",
                        "name": "projects/acme/documents/doc-1",
                        "derivedStructData": {
                            "snippets": [{ "snippet": "Receipts are required." }],
                            "title": "Receipts"
                        }
                    }
                }]
            })))
            .mount(&server)
            .await;

        let snippets = retriever_for(&server).search(&request(7, 0.0)).await.unwrap();
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].id, "doc-1");
        assert_eq!(snippets[0].text, "Receipts are required.");
        assert_eq!(snippets[0].source, "projects/acme/documents/doc-1");
        assert_eq!(snippets[0].metadata["title"], json!("Receipts"));
    }

    #[tokio::test]
    async fn empty_response_and_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        assert!(retriever_for(&server)
            .search(&request(7, 0.0))
            .await
            .unwrap()
            .is_empty());

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("DataStore not found"))
            .mount(&server)
            .await;
        let err = retriever_for(&server)
            .search(&request(7, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::NotFound { ref corpus, .. } if corpus == "sop-store"
        ));
    }

    #[tokio::test]
    async fn missing_project_is_misconfigured() {
        let retriever = DiscoveryEngineSearch::new(None, None, "us").unwrap();
        let mut req = request(7, 0.0);
        req.target.project_id = None;

        let err = retriever.search(&req).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Misconfigured(_)));
    }

    #[test]
    fn global_location_uses_unprefixed_host() {
        let retriever = DiscoveryEngineSearch::new(None, None, "us").unwrap();
        assert_eq!(
            retriever.api_root("global"),
            "https://discoveryengine.googleapis.com"
        );
        assert_eq!(
            retriever.api_root("eu"),
            "https://eu-discoveryengine.googleapis.com"
        );
    }
}
