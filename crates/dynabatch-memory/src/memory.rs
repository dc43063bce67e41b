//! In-memory store backend.
//!
//! Stores records per table in RAM, keyed by the configured key attributes.
//! All data is lost when the store is dropped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dynabatch_core::{Item, Operation, StoreClient, StoreError};

/// Decides whether a chunk-scoped call should fail, and how.
pub type Fault = Arc<dyn Fn(Operation, &[Item]) -> Option<StoreError> + Send + Sync>;

type Table = HashMap<Vec<String>, Item>;

/// In-memory key-value store.
pub struct InMemoryStore {
    key_attributes: Vec<String>,
    tables: Mutex<HashMap<String, Table>>,
    fault: Mutex<Option<Fault>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_key_attributes(["pk", "sk"])
    }
}

impl InMemoryStore {
    /// A store keyed by `pk` + `sk`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store keyed by the given attribute names, in order.
    pub fn with_key_attributes<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_attributes: attributes.into_iter().map(Into::into).collect(),
            tables: Mutex::new(HashMap::new()),
            fault: Mutex::new(None),
            latency: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every call by `latency` so calls overlap in time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Install a fault hook consulted before every call.
    pub fn set_fault<F>(&self, fault: F)
    where
        F: Fn(Operation, &[Item]) -> Option<StoreError> + Send + Sync + 'static,
    {
        *lock(&self.fault) = Some(Arc::new(fault));
    }

    pub fn clear_fault(&self) {
        *lock(&self.fault) = None;
    }

    /// Insert records directly, bypassing limits and faults.
    pub fn seed(&self, table: &str, items: impl IntoIterator<Item = Item>) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);
        let table = tables.entry(table.to_string()).or_default();
        for item in items {
            let key = self.key_of(&item)?;
            table.insert(key, item);
        }
        Ok(())
    }

    /// Look up one record by key item.
    pub fn get(&self, table: &str, key: &Item) -> Option<Item> {
        let key = self.key_of(key).ok()?;
        lock(&self.tables).get(table)?.get(&key).cloned()
    }

    pub fn contains(&self, table: &str, key: &Item) -> bool {
        self.get(table, key).is_some()
    }

    /// Number of records in `table`.
    pub fn len(&self, table: &str) -> usize {
        lock(&self.tables).get(table).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// Total store calls served (including failed ones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn key_of(&self, item: &Item) -> Result<Vec<String>, StoreError> {
        self.key_attributes
            .iter()
            .map(|name| {
                item.get(name)
                    .and_then(|v| v.as_key_fragment())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        StoreError::Validation(format!("missing or non-scalar key attribute '{name}'"))
                    })
            })
            .collect()
    }

    fn check(&self, op: Operation, items: &[Item]) -> Result<(), StoreError> {
        let limit = op.limit();
        if items.is_empty() {
            return Err(StoreError::Validation(format!("{op} request must not be empty")));
        }
        if items.len() > limit {
            return Err(StoreError::Validation(format!(
                "{op} request of {} items exceeds the limit of {limit}",
                items.len()
            )));
        }
        let fault = lock(&self.fault).clone();
        if let Some(err) = fault.and_then(|f| f(op, items)) {
            return Err(err);
        }
        Ok(())
    }

    async fn enter(&self) -> InFlight<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        guard
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// Poisoning is ignored: no code path leaves a map half-updated.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn read_many(&self, table: &str, keys: Vec<Item>) -> Result<Vec<Item>, StoreError> {
        let _guard = self.enter().await;
        self.check(Operation::Read, &keys)?;

        let wanted = keys
            .iter()
            .map(|k| self.key_of(k))
            .collect::<Result<Vec<_>, _>>()?;

        let tables = lock(&self.tables);
        let Some(records) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let found: Vec<Item> = wanted.iter().filter_map(|k| records.get(k).cloned()).collect();
        tracing::trace!(table, requested = keys.len(), found = found.len(), "memory read");
        Ok(found)
    }

    async fn write_many(&self, table: &str, items: Vec<Item>) -> Result<(), StoreError> {
        let _guard = self.enter().await;
        self.check(Operation::Write, &items)?;

        // Validate every key first so a bad item leaves the chunk unwritten.
        let keyed = items
            .into_iter()
            .map(|item| self.key_of(&item).map(|k| (k, item)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = lock(&self.tables);
        let records = tables.entry(table.to_string()).or_default();
        let count = keyed.len();
        records.extend(keyed);
        tracing::trace!(table, written = count, "memory write");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
