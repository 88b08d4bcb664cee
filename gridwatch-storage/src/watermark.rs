use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gridwatch_core::DataType;

use crate::backend::BlobStore;
use crate::errors::{Result, StorageError};

const WATERMARK_PREFIX: &str = "watermarks/";

/// Persisted layout: `{"lastSyncDate": "<RFC 3339>"}` at a fixed per-type path.
#[derive(Debug, Serialize, Deserialize)]
struct WatermarkRecord {
    #[serde(rename = "lastSyncDate")]
    last_sync_date: DateTime<Utc>,
}

/// Per-data-type last-successful-sync timestamps, persisted independently of
/// snapshots so they survive process restarts.
///
/// The watermark advances only after a successful end-to-end sync. A crash
/// between snapshot write and advance leaves the watermark stale; the next
/// sync simply re-fetches that window (at-least-once delta semantics).
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    blob: BlobStore,
}

impl WatermarkStore {
    pub fn new(blob: BlobStore) -> Self {
        Self { blob }
    }

    fn path(data_type: DataType) -> String {
        format!("{}{}.json", WATERMARK_PREFIX, data_type)
    }

    /// The last successful sync boundary; `None` means never synced.
    pub async fn get(&self, data_type: DataType) -> Result<Option<DateTime<Utc>>> {
        match self.blob.get_object(&Self::path(data_type)).await {
            Ok(bytes) => {
                let record: WatermarkRecord = serde_json::from_slice(&bytes)?;
                Ok(Some(record.last_sync_date))
            }
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    pub async fn advance(&self, data_type: DataType, at: DateTime<Utc>) -> Result<()> {
        let bytes = serde_json::to_vec(&WatermarkRecord { last_sync_date: at })?;
        self.blob.put_object(&Self::path(data_type), bytes).await?;
        debug!(target: "watermark", data_type = %data_type, at = %at, "watermark advanced");
        Ok(())
    }
}
