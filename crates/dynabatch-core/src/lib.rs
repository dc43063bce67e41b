//! dynabatch-core — chunked concurrent batch access to a key-value store.
//!
//! # Overview
//!
//! A batch read or write of arbitrary length is split into chunks no larger
//! than the store's single-operation limit, every chunk is dispatched
//! concurrently, and the partial results and partial failures are folded
//! into one outcome. The core crate defines:
//!
//! - [`StoreClient`] — the async trait every store backend implements
//! - [`Item`] / [`AttributeValue`] — store wire types
//! - [`marshal`] — serde-based conversion between domain types and items
//! - [`chunk`] — the chunker and the protocol limits
//! - [`fanout`] — the concurrent chunk coordinator
//! - [`aggregate`] — result and error merging
//! - [`BatchClient`] — the facade tying everything together
//!
//! Chunks succeed or fail independently. A failed chunk is reported in the
//! outcome's [`ErrorChain`] and never retried; what other chunks wrote stays
//! written.

pub mod aggregate;
pub mod chunk;
pub mod client;
pub mod config;
pub mod error;
pub mod fanout;
pub mod item;
pub mod marshal;
pub mod store;
mod worker;

pub use aggregate::{ReadOutcome, WriteOutcome};
pub use chunk::{Chunk, Operation, READ_LIMIT, WRITE_LIMIT};
pub use client::BatchClient;
pub use config::{BatchConfig, OutcomeOrder};
pub use error::{BatchError, ChunkError, ChunkErrorKind, ErrorChain, MarshalError, StoreError};
pub use fanout::{ChunkOutcome, FanOut};
pub use item::{key, AttributeValue, Item};
pub use store::StoreClient;
