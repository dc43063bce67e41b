//! Chunk workers: execute exactly one chunk against the store.

use tracing::debug;

use crate::chunk::Chunk;
use crate::error::{ChunkErrorKind, MarshalError};
use crate::item::Item;
use crate::store::StoreClient;

/// Read one chunk of keys. Keys are already in wire format.
pub(crate) async fn read_chunk(
    store: &dyn StoreClient,
    table: &str,
    chunk: Chunk<Item>,
) -> Result<Vec<Item>, ChunkErrorKind> {
    let index = chunk.index;
    let records = store.read_many(table, chunk.items).await?;
    debug!(table, chunk = index, records = records.len(), "chunk read complete");
    Ok(records)
}

/// Marshal and write one chunk.
///
/// The store is only called once every item of the chunk has marshalled;
/// a single bad item fails the whole chunk and nothing of it is written.
pub(crate) async fn write_chunk<T, F>(
    store: &dyn StoreClient,
    table: &str,
    chunk: Chunk<T>,
    marshal: &F,
) -> Result<(), ChunkErrorKind>
where
    F: Fn(&T) -> Result<Item, MarshalError> + ?Sized,
{
    let wire = chunk
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            marshal(item).map_err(|e| {
                debug!(table, chunk = chunk.index, item = chunk.offset + i, error = %e, "marshal failed");
                e
            })
        })
        .collect::<Result<Vec<Item>, MarshalError>>()?;

    store.write_many(table, wire).await?;
    debug!(table, chunk = chunk.index, items = chunk.items.len(), "chunk write complete");
    Ok(())
}
