mod errors;
pub use errors::{Result, StorageError};

mod backend;
pub use backend::{BackendConfig, BlobStore, CloudBackend, LocalBackend, ObjectMeta};

mod snapshot_store;
pub use snapshot_store::{SnapshotEntry, SnapshotStore, StoredSnapshot};

mod watermark;
pub use watermark::WatermarkStore;

mod retention;
pub use retention::{CycleOutcome, RetentionConfig, RetentionMonitor, StorageUsage};
