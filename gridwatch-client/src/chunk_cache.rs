use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use gridwatch_core::{PageResponse, SnapshotRef};

#[derive(Default)]
struct Inner {
    /// Latest known snapshot identity. Every cached chunk matches this pair.
    latest: Option<(DateTime<Utc>, SnapshotRef)>,
    chunks: HashMap<(usize, usize), PageResponse>,
}

/// Client-side page cache, keyed by `(offset, limit)` and coherent with one
/// process-wide `{version, url}` pair.
///
/// A chunk carrying a newer version than the tracked pair invalidates every
/// chunk cached under the old one; a chunk carrying an older pair is stale
/// and dropped on the floor. Chunks of different versions therefore never
/// coexist in the cache.
#[derive(Default)]
pub struct ChunkCache {
    inner: Mutex<Inner>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a chunk; returns false when the chunk is stale and was dropped.
    pub async fn put_chunk(&self, chunk: &PageResponse) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.latest.clone() {
            Some((version, url)) if version == chunk.version && url == chunk.url => {}
            Some((version, _)) if chunk.version > version => {
                debug!(
                    target: "chunk_cache",
                    old = %version,
                    new = %chunk.version,
                    "version changed, invalidating cached chunks"
                );
                inner.chunks.clear();
                inner.latest = Some((chunk.version, chunk.url.clone()));
            }
            Some(_) => return false,
            None => inner.latest = Some((chunk.version, chunk.url.clone())),
        }
        inner
            .chunks
            .insert((chunk.offset, chunk.limit), chunk.clone());
        true
    }

    /// A cached chunk, if one exists for this window under the latest version.
    pub async fn get_chunk(&self, offset: usize, limit: usize) -> Option<PageResponse> {
        let inner = self.inner.lock().await;
        inner.chunks.get(&(offset, limit)).cloned()
    }

    pub async fn latest(&self) -> Option<(DateTime<Utc>, SnapshotRef)> {
        self.inner.lock().await.latest.clone()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.chunks.clear();
        inner.latest = None;
    }
}
