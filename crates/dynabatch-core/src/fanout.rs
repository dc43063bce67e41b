//! Fan-out coordinator: run one worker task per chunk and wait for all.
//!
//! Every chunk is spawned onto the Tokio runtime as its own task. Workers
//! share nothing; each returns its outcome tagged with its dispatch position
//! and the coordinator files it into a pre-sized slot for that position, so
//! no lock guards the results. The coordinator returns only once every worker
//! has finished.
//!
//! Dropping the future returned by [`FanOut::run`] aborts every worker still
//! in flight. A worker that ends without reporting (aborted task) is
//! recorded as [`ChunkErrorKind::Aborted`]; a worker that panics is recorded
//! as [`ChunkErrorKind::Panicked`]. Neither affects sibling chunks.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::chunk::Chunk;
use crate::config::BatchConfig;
use crate::error::{ChunkError, ChunkErrorKind};

/// What one chunk produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome<R> {
    pub index: usize,
    /// Number of input items the chunk carried.
    pub items: usize,
    pub result: Result<R, ChunkErrorKind>,
}

impl<R> ChunkOutcome<R> {
    pub fn succeeded(index: usize, items: usize, value: R) -> Self {
        Self { index, items, result: Ok(value) }
    }

    pub fn failed(index: usize, items: usize, kind: ChunkErrorKind) -> Self {
        Self { index, items, result: Err(kind) }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure as a chunk-tagged error, if the chunk failed.
    pub fn error(&self) -> Option<ChunkError> {
        self.result
            .as_ref()
            .err()
            .map(|kind| ChunkError::new(self.index, self.items, kind.clone()))
    }
}

/// Concurrent chunk dispatcher.
#[derive(Debug, Clone, Default)]
pub struct FanOut {
    max_concurrency: Option<usize>,
    chunk_timeout: Option<Duration>,
}

impl FanOut {
    /// Unbounded concurrency, no per-chunk deadline.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency.map(|n| n.max(1)),
            chunk_timeout: config.chunk_timeout(),
        }
    }

    /// Cap the number of simultaneously running workers.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    /// Fail any chunk whose worker runs longer than `timeout`.
    pub fn chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = Some(timeout);
        self
    }

    /// Run `work` on every chunk concurrently.
    ///
    /// Returns one outcome per chunk, in the order the workers completed.
    pub async fn run<T, R, F, Fut>(&self, chunks: Vec<Chunk<T>>, work: F) -> Vec<ChunkOutcome<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(Chunk<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ChunkErrorKind>> + Send + 'static,
    {
        let total = chunks.len();
        if total == 0 {
            return Vec::new();
        }

        let work = Arc::new(work);
        let semaphore = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let identities: Vec<(usize, usize)> = chunks.iter().map(|c| (c.index, c.len())).collect();

        // Slots are keyed by dispatch position; `chunk.index` is only reported.
        let mut tasks = JoinSet::new();
        for (position, chunk) in chunks.into_iter().enumerate() {
            let work = Arc::clone(&work);
            let semaphore = semaphore.clone();
            let timeout = self.chunk_timeout;
            tasks.spawn(async move {
                let index = chunk.index;
                let items = chunk.len();

                let _permit = match semaphore {
                    Some(sem) => match sem.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            return (position, ChunkOutcome::failed(index, items, ChunkErrorKind::Aborted))
                        }
                    },
                    None => None,
                };

                debug!(chunk = index, items, "chunk dispatched");
                let guarded = AssertUnwindSafe(async move { work(chunk).await }).catch_unwind();
                let joined = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, guarded).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            let ms = whole_millis(limit);
                            return (position, ChunkOutcome::failed(index, items, ChunkErrorKind::Timeout { ms }));
                        }
                    },
                    None => guarded.await,
                };

                let outcome = match joined {
                    Ok(result) => ChunkOutcome { index, items, result },
                    Err(panic) => ChunkOutcome::failed(
                        index,
                        items,
                        ChunkErrorKind::Panicked(panic_message(panic.as_ref())),
                    ),
                };
                (position, outcome)
            });
        }

        let mut slots: Vec<Option<ChunkOutcome<R>>> = (0..total).map(|_| None).collect();
        let mut completion: Vec<usize> = Vec::with_capacity(total);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, outcome)) => {
                    if let Some(kind) = outcome.result.as_ref().err() {
                        warn!(chunk = outcome.index, items = outcome.items, error = %kind, "chunk failed");
                    }
                    slots[position] = Some(outcome);
                    completion.push(position);
                }
                Err(e) => warn!(error = %e, "chunk worker did not report"),
            }
        }

        for (position, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                let (index, items) = identities[position];
                *slot = Some(ChunkOutcome::failed(index, items, ChunkErrorKind::Aborted));
                completion.push(position);
            }
        }

        completion
            .into_iter()
            .filter_map(|position| slots[position].take())
            .collect()
    }
}

/// Milliseconds in `d`, saturating at `u64::MAX`.
fn whole_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split;
    use crate::error::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn every_chunk_reports_once() {
        let chunks = split((0..10).collect::<Vec<u32>>(), 3).unwrap();
        let outcomes = FanOut::new()
            .run(chunks, |chunk| async move { Ok(chunk.items.iter().sum::<u32>()) })
            .await;

        assert_eq!(outcomes.len(), 4);
        let mut indices: Vec<usize> = outcomes.iter().map(|o| o.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        let total: u32 = outcomes.iter().map(|o| *o.result.as_ref().unwrap()).sum();
        assert_eq!(total, 45);
    }

    #[tokio::test]
    async fn empty_input_returns_immediately() {
        let outcomes: Vec<ChunkOutcome<()>> = FanOut::new()
            .run(Vec::<Chunk<u8>>::new(), |_| async { Ok(()) })
            .await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn failure_does_not_stop_siblings() {
        let chunks = split((0..9).collect::<Vec<u32>>(), 3).unwrap();
        let outcomes = FanOut::new()
            .run(chunks, |chunk| async move {
                if chunk.index == 1 {
                    Err(StoreError::Validation("bad chunk".into()).into())
                } else {
                    Ok(chunk.len())
                }
            })
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 2);
        let failed: Vec<_> = outcomes.iter().filter_map(ChunkOutcome::error).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 1);
        assert_eq!(failed[0].items, 3);
    }

    #[tokio::test]
    async fn panicking_worker_is_chunk_local() {
        let chunks = split(vec![1u8, 2, 3], 1).unwrap();
        let outcomes = FanOut::new()
            .run(chunks, |chunk| async move {
                if chunk.index == 2 {
                    panic!("worker blew up");
                }
                Ok(())
            })
            .await;

        assert_eq!(outcomes.len(), 3);
        let panicked = outcomes.iter().find(|o| o.index == 2).unwrap();
        assert_eq!(
            panicked.result,
            Err(ChunkErrorKind::Panicked("worker blew up".into()))
        );
    }

    #[tokio::test]
    async fn slow_chunk_times_out() {
        let chunks = split(vec![0u64, 1], 1).unwrap();
        let outcomes = FanOut::new()
            .chunk_timeout(Duration::from_millis(20))
            .run(chunks, |chunk| async move {
                if chunk.index == 0 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok(())
            })
            .await;

        let slow = outcomes.iter().find(|o| o.index == 0).unwrap();
        assert_eq!(slow.result, Err(ChunkErrorKind::Timeout { ms: 20 }));
        assert!(outcomes.iter().find(|o| o.index == 1).unwrap().is_ok());
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let chunks = split((0..40).collect::<Vec<u32>>(), 2).unwrap();

        let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let outcomes = FanOut::new()
            .max_concurrency(3)
            .run(chunks, move |_chunk| {
                let (in_flight, peak) = (Arc::clone(&f), Arc::clone(&p));
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert_eq!(outcomes.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn sparse_chunk_indices_all_report() {
        let chunks: Vec<Chunk<u32>> = split((0..9).collect::<Vec<u32>>(), 3).unwrap().into_iter().skip(1).collect();
        let outcomes = FanOut::new()
            .run(chunks, |chunk| async move { Ok(chunk.items) })
            .await;

        assert_eq!(outcomes.len(), 2);
        let mut seen: Vec<(usize, Vec<u32>)> = outcomes
            .into_iter()
            .map(|o| (o.index, o.result.unwrap()))
            .collect();
        seen.sort();
        assert_eq!(seen, vec![(1, vec![3, 4, 5]), (2, vec![6, 7, 8])]);
    }

    #[tokio::test]
    async fn duplicate_chunk_indices_are_not_overwritten() {
        let chunks = vec![
            Chunk { index: 0, offset: 0, items: vec![1u8] },
            Chunk { index: 0, offset: 0, items: vec![2u8] },
        ];
        let outcomes = FanOut::new()
            .run(chunks, |chunk| async move { Ok(chunk.items[0]) })
            .await;

        let mut values: Vec<u8> = outcomes.iter().map(|o| *o.result.as_ref().unwrap()).collect();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test]
    async fn zero_cap_from_config_still_completes() {
        let config = BatchConfig { max_concurrency: Some(0), ..Default::default() };
        let chunks = split(vec![1u8, 2], 1).unwrap();
        let fan_out = FanOut::from_config(&config);
        let run = fan_out.run(chunks, |_| async { Ok(()) });

        let outcomes = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("fan-out with a zero cap never returned");
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(ChunkOutcome::is_ok));
    }

    #[test]
    fn timeout_millis_saturate() {
        assert_eq!(whole_millis(Duration::from_millis(20)), 20);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn outcome_error_carries_chunk_identity() {
        let outcome: ChunkOutcome<()> = ChunkOutcome::failed(4, 25, ChunkErrorKind::Aborted);
        let err = outcome.error().unwrap();
        assert_eq!(err.index, 4);
        assert_eq!(err.to_string(), "chunk 4 (25 items): chunk worker aborted");
        assert!(ChunkOutcome::succeeded(0, 1, ()).error().is_none());
    }
}
