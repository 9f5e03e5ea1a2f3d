//! Typed errors for the job pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Retryable and not-found HTTP
//! results are not errors: see [`crate::fetch::FetchOutcome`].

use thiserror::Error;

/// Errors that abort a pipeline operation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure outside the fetcher's retry loop
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// HTML did not have the expected shape
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    /// LLM reply did not match the extraction schema
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Durable store read or write failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// LLM service unavailable or failed
    #[error("LLM error: {0}")]
    Llm(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn storage(e: impl std::fmt::Display) -> Self {
        Self::Storage(e.to_string().into())
    }
}

/// Transport-level failures for a single HTTP attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed (connection, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request exceeded the per-call timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// A page or card was missing an expected node or attribute.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing node: {selector}")]
    MissingNode { selector: String },

    #[error("missing attribute: {attribute}")]
    MissingAttribute { attribute: String },

    #[error("malformed job id: {value:?}")]
    MalformedId { value: String },
}

/// The LLM reply could not be turned into extracted fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("reply is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("reply is not a JSON object")]
    NotAnObject,

    #[error("field `{field}`: {reason}")]
    Shape { field: String, reason: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for a single fetch attempt.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
