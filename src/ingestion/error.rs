//! Typed errors for the provider client layer
//!
//! Orchestration code decides between the fatal and skip failure policies by
//! matching on these, then wraps whatever propagates in `anyhow` context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("sensor list payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("provider returned fields {actual:?}, expected {expected:?}")]
    FieldMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("history body is not parseable CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("history body is missing the {0:?} column")]
    MissingColumn(&'static str),

    #[error("history row has a malformed {column} value {value:?}")]
    MalformedValue { column: &'static str, value: String },
}
