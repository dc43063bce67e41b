//! Batch execution configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// How cross-chunk results and errors are ordered in an outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeOrder {
    /// The order chunks happened to complete in (nondeterministic).
    #[default]
    Completion,
    /// Resequenced by chunk index before merging (deterministic).
    ChunkIndex,
}

/// Tuning for a [`crate::BatchClient`]. Chunk sizes are not configurable;
/// they are fixed by the store protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum simultaneously running chunk workers (`None` = one per chunk).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    /// Per-chunk deadline in milliseconds (`None` = run to completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_timeout_ms: Option<u64>,
    pub ordering: OutcomeOrder,
}

impl BatchConfig {
    pub fn chunk_timeout(&self) -> Option<Duration> {
        self.chunk_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.max_concurrency == Some(0) {
            return Err(BatchError::Validation("max_concurrency must be at least 1".into()));
        }
        if self.chunk_timeout_ms == Some(0) {
            return Err(BatchError::Validation("chunk_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}
