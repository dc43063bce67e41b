//! Chunker: split a batch into store-sized contiguous chunks.

use std::fmt;

use crate::error::BatchError;

/// Maximum keys per batch read, fixed by the store protocol.
pub const READ_LIMIT: usize = 100;

/// Maximum items per batch write, fixed by the store protocol.
pub const WRITE_LIMIT: usize = 25;

/// The kind of batch operation a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    /// The protocol's per-call item limit for this operation.
    pub fn limit(self) -> usize {
        match self {
            Self::Read => READ_LIMIT,
            Self::Write => WRITE_LIMIT,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// A contiguous slice of a batch, owned so it can move into a worker task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T> {
    /// Zero-based position among the batch's chunks.
    pub index: usize,
    /// Position of the chunk's first item in the original batch.
    pub offset: usize,
    pub items: Vec<T>,
}

impl<T> Chunk<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Number of chunks `len` items produce at `limit` items per chunk.
pub fn chunk_count(len: usize, limit: usize) -> usize {
    if limit == 0 {
        return 0;
    }
    len.div_ceil(limit)
}

/// Split `items` into chunks of at most `limit` items, preserving order.
///
/// Every chunk except possibly the last holds exactly `limit` items. Empty
/// input yields no chunks.
pub fn split<T>(items: Vec<T>, limit: usize) -> Result<Vec<Chunk<T>>, BatchError> {
    if limit == 0 {
        return Err(BatchError::Validation("chunk limit must be positive".into()));
    }

    let mut chunks = Vec::with_capacity(chunk_count(items.len(), limit));
    let mut iter = items.into_iter();
    let mut offset = 0;
    loop {
        let part: Vec<T> = iter.by_ref().take(limit).collect();
        if part.is_empty() {
            break;
        }
        let len = part.len();
        chunks.push(Chunk {
            index: chunks.len(),
            offset,
            items: part,
        });
        offset += len;
    }
    Ok(chunks)
}

/// Split for a store operation, using the operation's protocol limit.
pub fn split_for<T>(op: Operation, items: Vec<T>) -> Result<Vec<Chunk<T>>, BatchError> {
    split(items, op.limit())
}
