//! Result/error aggregation over chunk outcomes.
//!
//! Merging is a pure function of the outcomes it is given: the same
//! outcomes always produce the same records and the same error chain.
//! Outcome order is the caller's choice (completion order or resequenced by
//! chunk index); records keep their in-chunk order either way.

use crate::config::OutcomeOrder;
use crate::error::{BatchError, ErrorChain, MarshalError};
use crate::fanout::ChunkOutcome;
use crate::item::Item;
use crate::marshal;

/// Aggregate result of a batch read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Records from every successful chunk.
    pub records: Vec<Item>,
    /// Failed chunks; empty on full success.
    pub errors: ErrorChain,
    /// Number of chunks the request was split into.
    pub chunks: usize,
}

impl ReadOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Records on full success, otherwise the chain of chunk failures.
    pub fn into_result(self) -> Result<Vec<Item>, BatchError> {
        if self.errors.is_empty() {
            Ok(self.records)
        } else {
            Err(BatchError::Partial(self.errors))
        }
    }

    /// Unmarshal every returned record into a domain value.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<Vec<T>, MarshalError> {
        self.records.iter().map(marshal::from_item).collect()
    }
}

/// Aggregate result of a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Items in chunks that were written successfully.
    pub written: usize,
    /// Failed chunks; empty on full success.
    pub errors: ErrorChain,
    /// Number of chunks the request was split into.
    pub chunks: usize,
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), BatchError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(BatchError::Partial(self.errors))
        }
    }
}

/// Put outcomes in the order the merge should observe them.
pub fn arrange<R>(mut outcomes: Vec<ChunkOutcome<R>>, order: OutcomeOrder) -> Vec<ChunkOutcome<R>> {
    if order == OutcomeOrder::ChunkIndex {
        outcomes.sort_by_key(|o| o.index);
    }
    outcomes
}

/// Chain every failed outcome's error, in outcome order.
pub fn collect_errors<R>(outcomes: &[ChunkOutcome<R>]) -> ErrorChain {
    outcomes.iter().filter_map(ChunkOutcome::error).collect()
}

/// Merge read outcomes into one record set plus error chain.
pub fn merge_reads(outcomes: &[ChunkOutcome<Vec<Item>>]) -> ReadOutcome {
    let total: usize = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(Vec::len)
        .sum();

    let mut records = Vec::with_capacity(total);
    for outcome in outcomes {
        if let Ok(part) = &outcome.result {
            records.extend(part.iter().cloned());
        }
    }

    ReadOutcome {
        records,
        errors: collect_errors(outcomes),
        chunks: outcomes.len(),
    }
}

/// Merge write outcomes into a written-item count plus error chain.
pub fn merge_writes(outcomes: &[ChunkOutcome<()>]) -> WriteOutcome {
    WriteOutcome {
        written: outcomes.iter().filter(|o| o.is_ok()).map(|o| o.items).sum(),
        errors: collect_errors(outcomes),
        chunks: outcomes.len(),
    }
}
