//! Isolated generation worker
//!
//! Receives a one-way handoff of the id range plus the codec and shard
//! routing configuration, computes fingerprints, partitions rows by shard
//! key and bulk-appends them. Emits a progress report per flush; the only
//! other channel back to the generator is the task's terminal result.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

use super::ProgressReport;
use crate::codec::{GuidCodec, ShardKey};
use crate::error::ResolverError;
use crate::store::{IndexRow, ReverseIndexStore};

/// Everything the worker needs to reproduce the forward transform and the
/// store's shard routing without touching the generator's state.
#[derive(Debug, Clone)]
pub(super) struct WorkerSpec {
    /// Exclusive lower bound of the identifier range.
    pub range_start: u64,
    /// Inclusive upper bound of the identifier range.
    pub range_end: u64,
    pub magic: [u8; 2],
    pub sequence_offset: u64,
    pub search_key_len: usize,
    pub insert_batch_size: usize,
}

pub(super) async fn run(
    spec: WorkerSpec,
    store: Arc<ReverseIndexStore>,
    progress: mpsc::Sender<ProgressReport>,
) -> Result<(), ResolverError> {
    let started_at = chrono::Utc::now();
    let started = Instant::now();
    let codec = GuidCodec::new(spec.magic);

    let report = |cursor: u64| ProgressReport {
        started_at,
        elapsed_secs: started.elapsed().as_secs(),
        cursor,
        target: spec.range_end,
        remaining: spec.range_end - cursor,
    };
    // Receiver may stop draining; generation continues regardless.
    let _ = progress.send(report(spec.range_start)).await;

    let mut buckets: [Vec<IndexRow>; ShardKey::COUNT] = std::array::from_fn(|_| Vec::new());
    let mut buffered = 0usize;

    for id in (spec.range_start + 1)..=spec.range_end {
        let fingerprint = codec.fingerprint(id);
        let shard = ShardKey::from_hex_char(fingerprint.as_bytes()[0] as char)
            .ok_or_else(|| ResolverError::generation_failed("digest produced a non-hex shard key"))?;
        buckets[shard.index()].push(IndexRow {
            search_key: fingerprint[1..1 + spec.search_key_len].to_string(),
            sequence: id - spec.sequence_offset,
        });
        buffered += 1;

        if buffered >= spec.insert_batch_size {
            flush(&store, &mut buckets).await?;
            buffered = 0;
            let _ = progress.send(report(id)).await;
        }
    }

    if buffered > 0 {
        flush(&store, &mut buckets).await?;
    }
    let _ = progress.send(report(spec.range_end)).await;

    debug!(
        range_start = spec.range_start,
        range_end = spec.range_end,
        elapsed_secs = started.elapsed().as_secs(),
        "generation worker finished"
    );
    Ok(())
}

async fn flush(
    store: &ReverseIndexStore,
    buckets: &mut [Vec<IndexRow>; ShardKey::COUNT],
) -> Result<(), ResolverError> {
    for (index, rows) in buckets.iter_mut().enumerate() {
        if rows.is_empty() {
            continue;
        }
        store.append(ShardKey::from_index(index), rows).await?;
        rows.clear();
    }
    Ok(())
}
