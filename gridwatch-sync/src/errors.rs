use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync-pipeline failures. Clonable so a single failed computation can be
/// re-raised to every caller sharing the in-flight entry.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Network failure or non-2xx from the upstream source. `status` is None
    /// when the request never produced a response.
    #[error("upstream fetch failed (status {status:?}): {detail}")]
    UpstreamFetch {
        status: Option<u16>,
        detail: String,
    },

    #[error("missing upstream configuration: {0}")]
    MissingConfiguration(String),

    #[error("record processing failed: {0}")]
    Processor(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("sync task failed: {0}")]
    Internal(String),
}
