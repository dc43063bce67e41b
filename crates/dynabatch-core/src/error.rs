//! Error types for batch store access.
//!
//! Errors are scoped: [`StoreError`] and [`MarshalError`] describe why a
//! single chunk failed, [`ChunkError`] tags that failure with the chunk it
//! belongs to, and [`ErrorChain`] collects every chunk failure of one call.
//! [`BatchError`] is what a whole call returns.

use std::fmt;

use thiserror::Error;

/// Errors reported by a store backend for one chunk-scoped call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transport failure (connection refused, reset, TLS, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The store throttled the request.
    #[error("request throttled: {message}")]
    Throttled { message: String },

    /// The store rejected the request as malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Any other service-side rejection.
    #[error("store rejected request ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The call succeeded only partly; the remaining items were not processed.
    #[error("{count} item(s) left unprocessed")]
    Unprocessed { count: usize },

    /// The backend's own request timeout expired.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The response body could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Returns `true` if the failure is transient. Nothing in this crate
    /// retries; the flag is for callers deciding whether to resubmit.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Throttled { .. } | Self::Unprocessed { .. } | Self::Timeout { .. }
        )
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

/// Failure converting between a domain value and a store item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("deserialization failed: {0}")]
    Deserialize(String),

    #[error("invalid number attribute: {0:?}")]
    InvalidNumber(String),
}

/// Why one chunk did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkErrorKind {
    /// An item of the chunk could not be marshalled; the store was not called.
    #[error("marshal error: {0}")]
    Marshal(#[from] MarshalError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The per-chunk deadline expired before the worker finished.
    #[error("chunk timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("chunk worker panicked: {0}")]
    Panicked(String),

    /// The worker ended without reporting an outcome.
    #[error("chunk worker aborted")]
    Aborted,
}

/// A chunk-local failure, tagged with the chunk it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chunk {index} ({items} items): {kind}")]
pub struct ChunkError {
    /// Zero-based chunk index within the call.
    pub index: usize,
    /// Number of input items the chunk carried.
    pub items: usize,
    pub kind: ChunkErrorKind,
}

impl ChunkError {
    pub fn new(index: usize, items: usize, kind: ChunkErrorKind) -> Self {
        Self { index, items, kind }
    }
}

/// Every chunk failure of one call, in the order the aggregator observed
/// them. Empty means the call fully succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorChain {
    errors: Vec<ChunkError>,
}

impl ErrorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ChunkError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChunkError> {
        self.errors.iter()
    }

    /// Indices of the chunks that failed, in chain order.
    pub fn failed_chunks(&self) -> Vec<usize> {
        self.errors.iter().map(|e| e.index).collect()
    }

    /// Total input items carried by failed chunks.
    pub fn failed_items(&self) -> usize {
        self.errors.iter().map(|e| e.items).sum()
    }

    pub fn into_vec(self) -> Vec<ChunkError> {
        self.errors
    }
}

impl fmt::Display for ErrorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "no chunk errors");
        }
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorChain {}

impl FromIterator<ChunkError> for ErrorChain {
    fn from_iter<I: IntoIterator<Item = ChunkError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ErrorChain {
    type Item = &'a ChunkError;
    type IntoIter = std::slice::Iter<'a, ChunkError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Errors returned by a whole batch call.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Rejected before any chunk was dispatched; no work was performed.
    #[error("validation error: {0}")]
    Validation(String),

    /// One or more chunks failed. Chunks not listed completed and their
    /// effects are retained.
    #[error("batch partially failed: {0}")]
    Partial(ErrorChain),
}

impl BatchError {
    /// The chunk failures, if this is a partial failure.
    pub fn chain(&self) -> Option<&ErrorChain> {
        match self {
            Self::Partial(chain) => Some(chain),
            Self::Validation(_) => None,
        }
    }
}
