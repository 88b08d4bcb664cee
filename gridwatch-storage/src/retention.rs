use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use gridwatch_core::DataType;

use crate::errors::Result;
use crate::snapshot_store::{SnapshotEntry, SnapshotStore};

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Storage capacity the usage percentage is computed against.
    pub capacity_bytes: u64,
    /// Pruning starts once usage crosses this percentage.
    pub usage_threshold_percent: u8,
    pub check_interval_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 100 * 1024 * 1024, // 100 MiB
            usage_threshold_percent: 70,
            check_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub total: u64,
    pub used: u64,
    pub percentage_used: u8,
}

/// What one scheduled cycle did: checked and stayed idle, or checked and pruned.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    BelowThreshold(StorageUsage),
    Pruned {
        before: StorageUsage,
        after: StorageUsage,
        deleted: usize,
    },
}

/// Storage-usage-triggered snapshot pruning.
///
/// Eligible snapshots are deleted oldest write first, across data types, with
/// one carve-out: the most recent snapshot of each data type is never deleted.
/// Pruning only touches already-superseded objects, so it never blocks syncs.
#[derive(Debug)]
pub struct RetentionMonitor {
    snapshots: SnapshotStore,
    cfg: RetentionConfig,
}

impl RetentionMonitor {
    pub fn new(snapshots: SnapshotStore, cfg: RetentionConfig) -> Self {
        Self { snapshots, cfg }
    }

    pub async fn check_usage(&self) -> Result<StorageUsage> {
        let entries = self.snapshots.list().await?;
        let used: u64 = entries.iter().map(|e| e.size).sum();
        Ok(self.usage_from_bytes(used))
    }

    fn usage_from_bytes(&self, used: u64) -> StorageUsage {
        let total = self.cfg.capacity_bytes;
        let percentage_used = if total == 0 {
            100
        } else {
            ((used as f64 / total as f64) * 100.0).round() as u8
        };
        StorageUsage {
            total,
            used,
            percentage_used,
        }
    }

    /// Delete the oldest eligible snapshots until usage drops to the threshold.
    /// Returns the number of snapshots deleted. Individual deletion failures
    /// are logged and skipped; the cycle keeps going.
    pub async fn enforce_retention(&self) -> Result<usize> {
        let entries = self.snapshots.list().await?;
        let mut used: u64 = entries.iter().map(|e| e.size).sum();
        let floor = self.cfg.capacity_bytes * u64::from(self.cfg.usage_threshold_percent) / 100;

        let mut candidates = eligible_for_deletion(entries);
        candidates.sort_by_key(|e| e.written_at_micros);

        let mut deleted = 0usize;
        for entry in candidates {
            if used <= floor {
                break;
            }
            match self.snapshots.delete(&entry.reference).await {
                Ok(()) => {
                    used = used.saturating_sub(entry.size);
                    deleted += 1;
                    info!(
                        target: "retention",
                        object = %entry.reference,
                        size = entry.size,
                        "deleted snapshot"
                    );
                }
                Err(e) => {
                    warn!(
                        target: "retention",
                        object = %entry.reference,
                        error = %e,
                        "failed to delete snapshot"
                    );
                }
            }
        }
        Ok(deleted)
    }

    /// One Idle -> Checking -> (Idle | Pruning -> Idle) cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let before = self.check_usage().await?;
        if before.percentage_used <= self.cfg.usage_threshold_percent {
            debug!(
                target: "retention",
                percentage_used = before.percentage_used,
                "usage below threshold, nothing to prune"
            );
            return Ok(CycleOutcome::BelowThreshold(before));
        }

        let deleted = self.enforce_retention().await?;
        let after = self.check_usage().await?;
        info!(
            target: "retention",
            deleted,
            before = before.percentage_used,
            after = after.percentage_used,
            "retention cycle completed"
        );
        Ok(CycleOutcome::Pruned {
            before,
            after,
            deleted,
        })
    }

    /// Start the periodic background check.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(self.cfg.check_interval_seconds));
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_cycle().await {
                    warn!(target: "retention", error = %e, "retention cycle failed");
                }
            }
        })
    }
}

/// Everything except each data type's single most recent snapshot.
fn eligible_for_deletion(entries: Vec<SnapshotEntry>) -> Vec<SnapshotEntry> {
    let mut newest: HashMap<DataType, i64> = HashMap::new();
    for entry in &entries {
        let slot = newest.entry(entry.data_type).or_insert(entry.written_at_micros);
        if entry.written_at_micros > *slot {
            *slot = entry.written_at_micros;
        }
    }
    entries
        .into_iter()
        .filter(|e| newest.get(&e.data_type) != Some(&e.written_at_micros))
        .collect()
}
