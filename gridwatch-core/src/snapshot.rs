use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::data_type::DataType;
use crate::record::ProcessedRecord;

/// Binary access level attached to a persisted snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Public,
    Private,
}

/// Opaque locator for a persisted snapshot object.
///
/// References are produced by the snapshot store on write and resolve only
/// through it. They serialize as plain strings on the wire (`url` fields).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotRef(String);

impl SnapshotRef {
    pub fn new(path: impl Into<String>) -> Self {
        SnapshotRef(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SnapshotRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SnapshotRef {
    fn from(s: String) -> Self {
        SnapshotRef(s)
    }
}

/// The persisted snapshot envelope: the full processed record set for one
/// data type, stamped with its creation time and access level.
///
/// Snapshots are immutable once written. `last_updated` doubles as the
/// snapshot version clients key their chunk caches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    pub data: Vec<ProcessedRecord>,
    pub last_updated: DateTime<Utc>,
    pub data_type: DataType,
    #[serde(default)]
    pub access: AccessLevel,
}
