use std::fmt;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Malformed or unresolvable agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config at '{path}': {message}")]
    Invalid { path: String, message: String },
    #[error("tenant '{0}' not found and no default tenant is configured")]
    UnknownTenant(String),
    #[error("failed to fetch remote config: {0}")]
    Remote(String),
    #[error("config store lock poisoned")]
    Poisoned,
}

impl ConfigError {
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single call to the completion backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("llm authentication failed (status {status}): {message}")]
    Auth { status: u16, message: String },
    #[error("llm rate limited: {message}")]
    RateLimited { message: String },
    #[error("llm response blocked by content filter")]
    ContentFiltered { status: Option<u16> },
    #[error("llm transient failure: {message}")]
    Transient { status: Option<u16>, message: String },
    #[error("llm request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed llm response: {0}")]
    InvalidResponse(String),
    #[error("failed to set up llm client: {0}")]
    Setup(String),
}

impl ProviderError {
    /// HTTP status reported by the backend, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Auth { status, .. } | ProviderError::Rejected { status, .. } => {
                Some(*status)
            }
            ProviderError::RateLimited { .. } => Some(429),
            ProviderError::ContentFiltered { status } | ProviderError::Transient { status, .. } => {
                *status
            }
            ProviderError::InvalidResponse(_) | ProviderError::Setup(_) => None,
        }
    }

    pub fn timed_out(after: std::time::Duration) -> Self {
        ProviderError::Transient {
            status: None,
            message: format!("timed out after {:?}", after),
        }
    }
}

/// Failure of a call to the retrieval corpus.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("corpus '{corpus}' not found: {message}")]
    NotFound { corpus: String, message: String },
    #[error("retrieval authentication failed (status {status}): {message}")]
    Auth { status: u16, message: String },
    #[error("retrieval transient failure: {message}")]
    Transient { status: Option<u16>, message: String },
    #[error("retrieval request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed retrieval response: {0}")]
    InvalidResponse(String),
    #[error("retriever misconfigured: {0}")]
    Misconfigured(String),
}

impl RetrievalError {
    pub fn timed_out(after: std::time::Duration) -> Self {
        RetrievalError::Transient {
            status: None,
            message: format!("timed out after {:?}", after),
        }
    }
}

/// The checkpoint store could not serve the request.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    pub fn unavailable<E: fmt::Display>(err: E) -> Self {
        PersistenceError::Unavailable(err.to_string())
    }
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::unavailable(err)
    }
}

/// Pipeline stage that produced an LLM failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    QueryFormulation,
    AnswerSynthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::QueryFormulation => "query formulation",
            Stage::AnswerSynthesis => "answer synthesis",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{stage} failed: {source}")]
    Provider {
        stage: Stage,
        #[source]
        source: ProviderError,
    },
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("too many requests: {0}")]
    TooManyRequests(String),
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Poisoned => ApiError::internal(err),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        ApiError::ServiceUnavailable(err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::InvalidInput(_) => ApiError::BadRequest(message),
            PipelineError::Config(inner) => inner.into(),
            PipelineError::Provider { source, .. } => match source {
                ProviderError::RateLimited { .. } => ApiError::TooManyRequests(message),
                ProviderError::Transient { .. } => ApiError::ServiceUnavailable(message),
                _ => ApiError::BadGateway(message),
            },
            PipelineError::Retrieval(RetrievalError::Transient { .. }) => {
                ApiError::ServiceUnavailable(message)
            }
            PipelineError::Retrieval(_) => ApiError::BadGateway(message),
            PipelineError::Persistence(_) => ApiError::ServiceUnavailable(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
