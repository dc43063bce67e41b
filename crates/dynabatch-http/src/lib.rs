//! dynabatch-http — store backend speaking the DynamoDB JSON protocol.
//!
//! Issues `BatchGetItem` / `BatchWriteItem` calls over HTTP with `reqwest`.
//! Intended for local endpoints (DynamoDB Local and compatible emulators);
//! requests carry a static credential scope, not a SigV4 signature.
//!
//! Keys or items the service leaves unprocessed fail the chunk with
//! [`dynabatch_core::StoreError::Unprocessed`]; nothing is retried here.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;

pub use client::HttpStore;
pub use config::HttpStoreConfig;
pub use error::HttpConfigError;
