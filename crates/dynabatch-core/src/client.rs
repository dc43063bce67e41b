//! `BatchClient` — chunked concurrent reads and writes against one table.
//!
//! # Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use dynabatch_core::{key, BatchClient, StoreClient};
//!
//! # async fn demo(store: Arc<dyn StoreClient>) -> Result<(), dynabatch_core::BatchError> {
//! let client = BatchClient::new(store, "users");
//! let keys = (0..250).map(|i| key(format!("USER#{i}"), "PROFILE")).collect();
//! let users = client.read_many(keys).await?.into_result()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{self, ReadOutcome, WriteOutcome};
use crate::chunk::{self, Operation};
use crate::config::BatchConfig;
use crate::error::{BatchError, MarshalError};
use crate::fanout::FanOut;
use crate::item::Item;
use crate::marshal;
use crate::store::StoreClient;
use crate::worker;

/// Batch data-access client bound to one store table.
#[derive(Clone)]
pub struct BatchClient {
    store: Arc<dyn StoreClient>,
    table: Arc<str>,
    config: BatchConfig,
    fanout: FanOut,
}

impl BatchClient {
    /// Create a client with the default configuration (unbounded
    /// concurrency, completion-order results).
    pub fn new(store: Arc<dyn StoreClient>, table: impl Into<String>) -> Self {
        let config = BatchConfig::default();
        Self {
            store,
            table: Arc::from(table.into()),
            fanout: FanOut::from_config(&config),
            config,
        }
    }

    /// Replace the configuration after validating it.
    pub fn with_config(mut self, config: BatchConfig) -> Result<Self, BatchError> {
        config.validate()?;
        self.fanout = FanOut::from_config(&config);
        self.config = config;
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Fetch every record for `keys`, 100 keys per store call.
    ///
    /// Only validation failures return `Err`; chunk failures are reported in
    /// [`ReadOutcome::errors`] alongside the records the other chunks
    /// returned.
    pub async fn read_many(&self, keys: Vec<Item>) -> Result<ReadOutcome, BatchError> {
        let requested = keys.len();
        let chunks = chunk::split_for(Operation::Read, keys)?;
        if chunks.is_empty() {
            return Ok(ReadOutcome::default());
        }
        info!(
            table = %self.table,
            store = self.store.name(),
            keys = requested,
            chunks = chunks.len(),
            "batch read"
        );

        let store = Arc::clone(&self.store);
        let table = Arc::clone(&self.table);
        let outcomes = self
            .fanout
            .run(chunks, move |chunk| {
                let store = Arc::clone(&store);
                let table = Arc::clone(&table);
                async move { worker::read_chunk(store.as_ref(), &table, chunk).await }
            })
            .await;

        let merged = aggregate::merge_reads(&aggregate::arrange(outcomes, self.config.ordering));
        if !merged.errors.is_empty() {
            warn!(
                table = %self.table,
                failed_chunks = merged.errors.len(),
                error = %merged.errors,
                "batch read partially failed"
            );
        }
        Ok(merged)
    }

    /// Write every item, 25 items per store call, converting each with
    /// `marshal`.
    ///
    /// A chunk containing an item that fails to marshal is not sent at all.
    /// Chunks that succeed stay written even if others fail.
    pub async fn write_many<T, F>(&self, items: Vec<T>, marshal: F) -> Result<WriteOutcome, BatchError>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Result<Item, MarshalError> + Send + Sync + 'static,
    {
        let requested = items.len();
        let chunks = chunk::split_for(Operation::Write, items)?;
        if chunks.is_empty() {
            return Ok(WriteOutcome::default());
        }
        info!(
            table = %self.table,
            store = self.store.name(),
            items = requested,
            chunks = chunks.len(),
            "batch write"
        );

        let store = Arc::clone(&self.store);
        let table = Arc::clone(&self.table);
        let marshal = Arc::new(marshal);
        let outcomes = self
            .fanout
            .run(chunks, move |chunk| {
                let store = Arc::clone(&store);
                let table = Arc::clone(&table);
                let marshal = Arc::clone(&marshal);
                async move { worker::write_chunk(store.as_ref(), &table, chunk, marshal.as_ref()).await }
            })
            .await;

        let merged = aggregate::merge_writes(&aggregate::arrange(outcomes, self.config.ordering));
        if !merged.errors.is_empty() {
            warn!(
                table = %self.table,
                failed_chunks = merged.errors.len(),
                written = merged.written,
                error = %merged.errors,
                "batch write partially failed"
            );
        }
        Ok(merged)
    }

    /// Write serde-serializable domain values using [`marshal::to_item`].
    pub async fn write_serialized<T>(&self, items: Vec<T>) -> Result<WriteOutcome, BatchError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.write_many(items, |item: &T| marshal::to_item(item)).await
    }

    /// Write items already in wire format.
    pub async fn write_items(&self, items: Vec<Item>) -> Result<WriteOutcome, BatchError> {
        self.write_many(items, |item: &Item| Ok(item.clone())).await
    }
}

impl std::fmt::Debug for BatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchClient")
            .field("store", &self.store.name())
            .field("table", &self.table)
            .field("config", &self.config)
            .finish()
    }
}
