//! Incremental reverse-index generation
//!
//! The generator is strictly single-flight: a compare-and-set busy flag
//! guards the entire run, and any control operation attempted while a run
//! is in progress fails fast with `Busy` instead of blocking or queueing.
//! Bulk computation and insertion happen in an isolated worker task; the
//! only channels between generator and worker are the one-way range/config
//! handoff at start, a stream of progress reports, and the terminal
//! success/failure result. A failed run never advances the high-water mark:
//! the partial state of the store is treated as unknown.

mod worker;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::LookupCache;
use crate::codec::GuidCodec;
use crate::config::GeneratorConfig;
use crate::error::ResolverError;
use crate::store::ReverseIndexStore;

/// Worker status snapshot, updated once per flush.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    /// Last identifier handed to the store.
    pub cursor: u64,
    /// Identifier the run will extend the index to, inclusive.
    pub target: u64,
    pub remaining: u64,
}

/// Generator status as exposed to operators.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorStatus {
    pub busy: bool,
    /// Largest identifier known to have a reverse-index row.
    pub last_inserted: u64,
    /// Identifier the next run will extend the index to.
    pub generate: u64,
    pub progress: Option<ProgressReport>,
}

#[derive(Debug)]
struct Watermarks {
    last_inserted: u64,
    generate: u64,
}

pub struct RangeGenerator {
    store: Arc<ReverseIndexStore>,
    cache: Arc<LookupCache>,
    codec: GuidCodec,
    search_key_len: usize,
    config: GeneratorConfig,
    busy: AtomicBool,
    marks: Mutex<Watermarks>,
    progress: RwLock<Option<ProgressReport>>,
}

impl RangeGenerator {
    pub fn new(
        store: Arc<ReverseIndexStore>,
        cache: Arc<LookupCache>,
        codec: GuidCodec,
        search_key_len: usize,
        config: GeneratorConfig,
    ) -> Self {
        // Before initialization the index is assumed empty: the high-water
        // mark of an empty index is offset - 1.
        let empty_mark = config.sequence_offset.saturating_sub(1);
        Self {
            store,
            cache,
            codec,
            search_key_len,
            config,
            busy: AtomicBool::new(false),
            marks: Mutex::new(Watermarks {
                last_inserted: empty_mark,
                generate: empty_mark,
            }),
            progress: RwLock::new(None),
        }
    }

    /// Recomputes the high-water mark from the store's row counts.
    ///
    /// Each shard's count equals the number of generated sequence indices
    /// hashing into it, so the sum plus the offset minus one is the largest
    /// identifier with a row.
    pub async fn initialize(&self) -> Result<(), ResolverError> {
        if self.is_busy() {
            return Err(ResolverError::Busy);
        }
        let counts = self.store.row_counts().await?;
        let total: u64 = counts.values().sum();
        let last_inserted = (self.config.sequence_offset + total).saturating_sub(1);

        let mut marks = self.marks.lock().await;
        // A run may have started while the counts were being read; the
        // busy flag decides under the lock, so the watermark a running
        // worker was handed is never overwritten.
        if self.is_busy() {
            return Err(ResolverError::Busy);
        }
        marks.last_inserted = last_inserted;
        if marks.generate < last_inserted {
            marks.generate = last_inserted;
        }
        info!(
            last_inserted,
            rows = total,
            "generator initialized from store row counts"
        );
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn last_inserted(&self) -> u64 {
        self.marks.lock().await.last_inserted
    }

    /// Raises the generation target by a relative amount.
    pub async fn extend_by(&self, amount: u64) -> Result<u64, ResolverError> {
        let mut marks = self.marks.lock().await;
        // Checked under the marks lock: a concurrent `start` either sees
        // the raised target or this call fails fast with `Busy`.
        if self.is_busy() {
            return Err(ResolverError::Busy);
        }
        marks.generate = marks.generate.saturating_add(amount);
        debug!(generate = marks.generate, "generation target extended");
        Ok(marks.generate)
    }

    /// Raises the generation target to an absolute identifier. Targets at
    /// or below the current watermark are no-ops; the target never moves
    /// downward.
    pub async fn extend_to(&self, target: u64) -> Result<u64, ResolverError> {
        let mut marks = self.marks.lock().await;
        if self.is_busy() {
            return Err(ResolverError::Busy);
        }
        if target > marks.generate {
            marks.generate = target;
            debug!(generate = marks.generate, "generation target extended");
        }
        Ok(marks.generate)
    }

    /// Runs a generation pass over `(last_inserted, generate]`.
    ///
    /// Fails fast with `Busy` if a run is already in progress; returns
    /// immediately when there is nothing to generate. On success the
    /// high-water mark advances to the target and provisional negative
    /// cache entries are invalidated before control returns.
    pub async fn start(&self) -> Result<(), ResolverError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ResolverError::Busy);
        }
        let result = self.run().await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run(&self) -> Result<(), ResolverError> {
        let (last_inserted, target) = {
            let marks = self.marks.lock().await;
            (marks.last_inserted, marks.generate)
        };
        if target <= last_inserted {
            debug!(last_inserted, target, "nothing to generate");
            return Ok(());
        }

        info!(
            range_start = last_inserted,
            range_end = target,
            rows = target - last_inserted,
            "starting generation run"
        );

        let spec = worker::WorkerSpec {
            range_start: last_inserted,
            range_end: target,
            magic: self.codec_magic(),
            sequence_offset: self.config.sequence_offset,
            search_key_len: self.search_key_len,
            insert_batch_size: self.config.insert_batch_size,
        };
        let (tx, mut rx) = mpsc::channel(16);
        let handle = tokio::spawn(worker::run(spec, Arc::clone(&self.store), tx));

        while let Some(report) = rx.recv().await {
            *self.progress.write().await = Some(report);
        }

        let outcome = match handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(err) => Err(format!("worker terminated abnormally: {err}")),
        };

        match outcome {
            Ok(()) => {
                {
                    let mut marks = self.marks.lock().await;
                    marks.last_inserted = target;
                }
                // Any of the cached negatives may have become resolvable.
                let dropped = self.cache.invalidate_negatives().await;
                info!(
                    last_inserted = target,
                    invalidated = dropped,
                    "generation run completed"
                );
                Ok(())
            }
            Err(details) => {
                warn!(details = %details, "generation run failed; watermark not advanced");
                Err(ResolverError::generation_failed(details))
            }
        }
    }

    pub async fn status(&self) -> GeneratorStatus {
        let (last_inserted, generate) = {
            let marks = self.marks.lock().await;
            (marks.last_inserted, marks.generate)
        };
        GeneratorStatus {
            busy: self.is_busy(),
            last_inserted,
            generate,
            progress: self.progress.read().await.clone(),
        }
    }

    fn codec_magic(&self) -> [u8; 2] {
        self.codec.magic()
    }
}
