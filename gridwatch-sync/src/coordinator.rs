use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::info;

use gridwatch_core::{AccessLevel, DataType, SnapshotRef};
use gridwatch_storage::{SnapshotStore, WatermarkStore};

use crate::errors::{Result, SyncError};
use crate::processor;
use crate::upstream::UpstreamSource;

/// Outcome of one completed sync, shared by every caller of the same key.
#[derive(Debug, Clone)]
pub struct SyncReceipt {
    pub reference: SnapshotRef,
    /// Snapshot creation stamp; doubles as the version clients cache against.
    pub version: DateTime<Utc>,
    pub record_count: usize,
    /// True when the records came from the synthetic fallback source.
    pub fallback: bool,
}

type SyncOutcome = Result<SyncReceipt>;
type SharedSync = Shared<BoxFuture<'static, SyncOutcome>>;

/// Fetch-if-needed with single-flight de-duplication.
///
/// At most one non-failed computation exists per `sync-{dataType}` key:
/// concurrent callers share the same in-flight future and observe the same
/// outcome. A failed computation is evicted so later calls can retry; a
/// successful one stays resolved until `refresh` drops it.
///
/// The pipeline runs on a detached task, so a caller abandoning its await
/// (timeout, disconnect) leaves the shared work running and its result
/// cached for the next caller.
pub struct SyncCoordinator {
    source: Arc<dyn UpstreamSource>,
    snapshots: SnapshotStore,
    watermarks: WatermarkStore,
    inflight: DashMap<String, SharedSync>,
}

impl SyncCoordinator {
    pub fn new(
        source: Arc<dyn UpstreamSource>,
        snapshots: SnapshotStore,
        watermarks: WatermarkStore,
    ) -> Self {
        Self {
            source,
            snapshots,
            watermarks,
            inflight: DashMap::new(),
        }
    }

    fn cache_key(data_type: DataType) -> String {
        format!("sync-{}", data_type)
    }

    pub async fn sync_if_needed(&self, data_type: DataType) -> Result<SyncReceipt> {
        let key = Self::cache_key(data_type);
        // Check-then-insert must be atomic with respect to other callers:
        // the dashmap entry holds the shard lock across both steps.
        let fut = {
            match self.inflight.entry(key.clone()) {
                Entry::Occupied(occupied) => occupied.get().clone(),
                Entry::Vacant(vacant) => {
                    let fut = self.spawn_sync(data_type);
                    vacant.insert(fut.clone());
                    fut
                }
            }
        };

        let outcome = fut.clone().await;
        if outcome.is_err() {
            // Evict only this failed computation; a retry another caller has
            // already started must not be torn down by a stale waiter.
            self.inflight.remove_if(&key, |_, entry| fut.ptr_eq(entry));
        }
        outcome
    }

    /// Force a new sync: drop the completed entry for this key and re-run.
    /// An entry still in flight is left alone, so concurrent refreshers keep
    /// sharing one fetch.
    pub async fn refresh(&self, data_type: DataType) -> Result<SyncReceipt> {
        let key = Self::cache_key(data_type);
        self.inflight
            .remove_if(&key, |_, entry| entry.peek().is_some());
        self.sync_if_needed(data_type).await
    }

    fn spawn_sync(&self, data_type: DataType) -> SharedSync {
        let source = self.source.clone();
        let snapshots = self.snapshots.clone();
        let watermarks = self.watermarks.clone();
        let handle =
            tokio::spawn(async move { run_sync(source, snapshots, watermarks, data_type).await });
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(SyncError::Internal(format!("sync task: {}", e))),
            }
        }
        .boxed()
        .shared()
    }
}

/// The fetch -> process -> persist -> advance-watermark pipeline.
/// The watermark moves only after the snapshot write succeeded, so a crash in
/// between degrades to an extra (valid, superseded) snapshot on the next run.
async fn run_sync(
    source: Arc<dyn UpstreamSource>,
    snapshots: SnapshotStore,
    watermarks: WatermarkStore,
    data_type: DataType,
) -> SyncOutcome {
    let since = watermarks
        .get(data_type)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?;
    let set = source.fetch(data_type, since).await?;
    let records = processor::process(data_type, &set)?;
    let stored = snapshots
        .write(records, data_type, AccessLevel::Public)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?;
    watermarks
        .advance(data_type, stored.last_updated)
        .await
        .map_err(|e| SyncError::Storage(e.to_string()))?;

    info!(
        target: "sync",
        data_type = %data_type,
        records = stored.record_count,
        reference = %stored.reference,
        fallback = set.fallback,
        "sync completed"
    );
    Ok(SyncReceipt {
        reference: stored.reference,
        version: stored.last_updated,
        record_count: stored.record_count,
        fallback: set.fallback,
    })
}
