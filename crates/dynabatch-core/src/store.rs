//! The `StoreClient` trait — the boundary to the backing key-value store.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::item::Item;

/// A store backend able to execute one bounded-size batch operation.
///
/// Each call covers exactly one chunk and fails or succeeds as a unit for
/// that chunk. Callers never pass more than [`crate::READ_LIMIT`] keys or
/// [`crate::WRITE_LIMIT`] items.
///
/// # Thread Safety
/// Implementations must tolerate concurrent independent calls; the fan-out
/// coordinator issues one call per chunk in parallel.
///
/// # Object Safety
/// The trait is object-safe and is stored as `Arc<dyn StoreClient>`.
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    /// Fetch the records for `keys` from `table`.
    ///
    /// Keys with no matching record are simply absent from the result.
    async fn read_many(&self, table: &str, keys: Vec<Item>) -> Result<Vec<Item>, StoreError>;

    /// Put every item into `table`, replacing records with the same key.
    async fn write_many(&self, table: &str, items: Vec<Item>) -> Result<(), StoreError>;

    /// Backend identifier used in logs (endpoint URL or name).
    fn name(&self) -> &str;
}
