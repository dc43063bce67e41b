//! Construction errors for the HTTP store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpConfigError {
    /// Neither `DYNABATCH_ENDPOINT` nor `ENVIRONMENT=local-db` was set.
    #[error("no store endpoint configured (set DYNABATCH_ENDPOINT or ENVIRONMENT=local-db)")]
    MissingEndpoint,

    #[error("endpoint must be an http(s) URL: {0}")]
    InvalidEndpoint(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
