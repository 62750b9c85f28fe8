//! Retriever trait and the ranking rules every backend shares.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::config::{AgentConfig, VectorSearchConfig};
use crate::core::errors::RetrievalError;

/// A retrieved passage of policy text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: String,
    pub text: String,
    /// Relevance score (higher = better).
    pub score: f32,
    /// Source document identifier (path, URI, ...).
    pub source: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: u32,
    pub score_threshold: f32,
    /// Backend, corpus and column settings of the calling tenant.
    pub target: VectorSearchConfig,
}

impl SearchRequest {
    pub fn from_config(query: impl Into<String>, config: &AgentConfig) -> Self {
        Self {
            query: query.into(),
            top_k: config.retrieval_config.top_k,
            score_threshold: config.retrieval_config.score_threshold,
            target: config.vector_search.clone(),
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    /// Returns at most `top_k` snippets scoring at least `score_threshold`,
    /// best first. No match is an empty vector, not an error.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Snippet>, RetrievalError>;
}

/// Drops snippets below `score_threshold`, sorts by descending score and
/// keeps the first `top_k`. The sort is stable so equal scores keep backend order.
pub fn rank_snippets(
    mut snippets: Vec<Snippet>,
    top_k: u32,
    score_threshold: f32,
) -> Vec<Snippet> {
    snippets.retain(|s| s.score >= score_threshold);
    snippets.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    snippets.truncate(top_k as usize);
    snippets
}

/// Maps a non-success backend status onto the retrieval error taxonomy.
pub(crate) fn classify_http_failure(
    status: reqwest::StatusCode,
    corpus: &str,
    body: String,
) -> RetrievalError {
    let code = status.as_u16();
    match code {
        401 | 403 => RetrievalError::Auth {
            status: code,
            message: body,
        },
        404 => RetrievalError::NotFound {
            corpus: corpus.to_string(),
            message: body,
        },
        408 | 429 => RetrievalError::Transient {
            status: Some(code),
            message: body,
        },
        _ if status.is_server_error() => RetrievalError::Transient {
            status: Some(code),
            message: body,
        },
        _ => RetrievalError::Rejected {
            status: code,
            message: body,
        },
    }
}

pub(crate) fn transport_failure(err: reqwest::Error) -> RetrievalError {
    RetrievalError::Transient {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(id: &str, score: f32) -> Snippet {
        Snippet {
            id: id.to_string(),
            text: format!("text {id}"),
            score,
            source: format!("{id}.md"),
            metadata: Map::new(),
        }
    }

    #[test]
    fn filters_sorts_and_truncates() {
        let ranked = rank_snippets(
            vec![
                snippet("a", 0.61),
                snippet("b", 0.95),
                snippet("c", 0.40),
                snippet("d", 0.80),
                snippet("e", 0.70),
            ],
            3,
            0.6,
        );

        let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "e"]);
    }

    #[test]
    fn threshold_of_one_without_perfect_match_is_empty() {
        let ranked = rank_snippets(vec![snippet("a", 0.99), snippet("b", 0.5)], 7, 1.0);
        assert!(ranked.is_empty());
    }

    #[test]
    fn request_takes_retrieval_parameters_from_config() {
        let mut config = AgentConfig::default();
        config.retrieval_config.top_k = 3;
        config.retrieval_config.score_threshold = 0.6;

        let request = SearchRequest::from_config("electronics return window", &config);
        assert_eq!(request.top_k, 3);
        assert_eq!(request.score_threshold, 0.6);
        assert_eq!(request.target, config.vector_search);
    }
}
