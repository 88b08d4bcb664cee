use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::ProcessedRecord;
use crate::snapshot::SnapshotRef;

/// One fixed-size page of a snapshot, as served by `GET /pins`.
///
/// `version` and `url` identify the snapshot the slice was cut from; chunks
/// carrying different pairs must never be merged into one sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse {
    pub version: DateTime<Utc>,
    pub url: SnapshotRef,
    pub data: Vec<ProcessedRecord>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}
