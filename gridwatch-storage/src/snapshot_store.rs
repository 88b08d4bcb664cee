use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use gridwatch_core::{AccessLevel, DataType, ProcessedRecord, SnapshotDocument, SnapshotRef};

use crate::backend::BlobStore;
use crate::errors::{Result, StorageError};

pub(crate) const SNAPSHOT_PREFIX: &str = "snapshots/";

/// Receipt for a freshly written snapshot.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub reference: SnapshotRef,
    pub last_updated: DateTime<Utc>,
    pub record_count: usize,
}

/// One snapshot object as seen by retention: its location, the data type and
/// write timestamp recovered from the object name, and its size.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub reference: SnapshotRef,
    pub data_type: DataType,
    pub written_at_micros: i64,
    pub size: u64,
}

/// Immutable, versioned snapshot persistence over blob storage.
///
/// Every write creates a new object named
/// `snapshots/{dataType}-{micros}-{seq}.json`; the microsecond timestamp plus
/// a process-wide counter guarantees names never collide, so nothing is ever
/// overwritten in place.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    blob: BlobStore,
    seq: Arc<AtomicU64>,
}

impl SnapshotStore {
    pub fn new(blob: BlobStore) -> Self {
        Self {
            blob,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn write(
        &self,
        records: Vec<ProcessedRecord>,
        data_type: DataType,
        access: AccessLevel,
    ) -> Result<StoredSnapshot> {
        let now = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}{}-{}-{:04}.json",
            SNAPSHOT_PREFIX,
            data_type,
            now.timestamp_micros(),
            seq
        );

        let doc = SnapshotDocument {
            data: records,
            last_updated: now,
            data_type,
            access,
        };
        let record_count = doc.data.len();
        let bytes = serde_json::to_vec(&doc)?;
        self.blob.put_object(&name, bytes).await?;

        info!(
            target: "snapshots",
            data_type = %data_type,
            object = %name,
            records = record_count,
            "snapshot written"
        );
        Ok(StoredSnapshot {
            reference: SnapshotRef::new(name),
            last_updated: now,
            record_count,
        })
    }

    pub async fn read(&self, reference: &SnapshotRef) -> Result<SnapshotDocument> {
        let bytes = self
            .blob
            .get_object(reference.as_str())
            .await
            .map_err(|e| match e {
                StorageError::NotFound(path) => StorageError::SnapshotNotFound(path),
                other => other,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Delete a snapshot by reference. Succeeds even if already absent.
    pub async fn delete(&self, reference: &SnapshotRef) -> Result<()> {
        self.blob.delete_object(reference.as_str()).await
    }

    /// Enumerate persisted snapshots with the metadata retention needs.
    /// Objects whose names don't follow the snapshot convention are ignored.
    pub async fn list(&self) -> Result<Vec<SnapshotEntry>> {
        let objects = self.blob.list_objects(SNAPSHOT_PREFIX).await?;
        let mut out = Vec::with_capacity(objects.len());
        for obj in objects {
            if let Some((data_type, written_at_micros)) = parse_object_name(&obj.path) {
                out.push(SnapshotEntry {
                    reference: SnapshotRef::new(obj.path),
                    data_type,
                    written_at_micros,
                    size: obj.size,
                });
            }
        }
        Ok(out)
    }
}

/// Recover `(data_type, write micros)` from `snapshots/{dataType}-{micros}-{seq}.json`.
/// Split from the right: the data type tag itself may contain dashes.
fn parse_object_name(path: &str) -> Option<(DataType, i64)> {
    let stem = path.strip_prefix(SNAPSHOT_PREFIX)?.strip_suffix(".json")?;
    let mut parts = stem.rsplitn(3, '-');
    let _seq = parts.next()?;
    let micros: i64 = parts.next()?.parse().ok()?;
    let data_type: DataType = parts.next()?.parse().ok()?;
    Some((data_type, micros))
}
