use std::time::Duration;

use tracing::debug;

use gridwatch_core::{PageResponse, ProcessedRecord};

use crate::assembly::{ChunkAssembly, IngestOutcome};
use crate::chunk_cache::ChunkCache;
use crate::errors::{ClientError, Result};

// Snapshot rotations tolerated within one fetch_all before giving up.
const MAX_RESTARTS: usize = 3;

#[derive(Debug, Clone)]
pub struct PinsClientBuilder {
    base_url: String,
    page_size: usize,
    request_timeout_ms: u64,
}

impl PinsClientBuilder {
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn build(self) -> Result<PinsClient> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(self.request_timeout_ms))
            .build()?;
        Ok(PinsClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            page_size: self.page_size,
            cache: ChunkCache::new(),
        })
    }
}

/// Consuming client for the gateway's pins feed.
///
/// Pages are cached locally under the snapshot's `{version, url}` pair; a
/// version change observed on any response invalidates the whole local cache
/// before anything is reused.
pub struct PinsClient {
    http: reqwest::Client,
    base_url: String,
    page_size: usize,
    cache: ChunkCache,
}

impl PinsClient {
    pub fn builder(base_url: impl Into<String>) -> PinsClientBuilder {
        PinsClientBuilder {
            base_url: base_url.into(),
            page_size: 1000,
            request_timeout_ms: 30_000,
        }
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// Fetch one page, serving from the local cache when possible.
    /// `fresh` bypasses the cache and forces a new sync on the gateway.
    pub async fn fetch_chunk(
        &self,
        offset: usize,
        limit: usize,
        fresh: bool,
    ) -> Result<PageResponse> {
        if !fresh {
            if let Some(hit) = self.cache.get_chunk(offset, limit).await {
                debug!(target: "pins_client", offset, limit, "chunk served from cache");
                return Ok(hit);
            }
        }

        let url = format!("{}/pins", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("fresh", fresh.to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let page: PageResponse = response.json().await?;
        self.cache.put_chunk(&page).await;
        Ok(page)
    }

    /// Fetch the full record sequence, paging sequentially and accumulating
    /// chunks. A snapshot version change mid-pagination restarts from offset
    /// zero rather than merging chunks of different versions.
    pub async fn fetch_all(&self, fresh: bool) -> Result<Vec<ProcessedRecord>> {
        let mut assembly = ChunkAssembly::new();
        let mut force_fresh = fresh;
        let mut restarts = 0usize;

        loop {
            let page = self
                .fetch_chunk(assembly.next_offset(), self.page_size, force_fresh)
                .await?;
            force_fresh = false;

            match assembly.ingest(&page) {
                IngestOutcome::Appended => {}
                IngestOutcome::Restarted => {
                    restarts += 1;
                    if restarts > MAX_RESTARTS {
                        return Err(ClientError::VersionChurn);
                    }
                    debug!(
                        target: "pins_client",
                        restarts,
                        "snapshot version changed, restarting pagination"
                    );
                    continue;
                }
                IngestOutcome::Rejected => {
                    // a cached chunk no longer lines up; drop local state and retry
                    self.cache.clear().await;
                    restarts += 1;
                    if restarts > MAX_RESTARTS {
                        return Err(ClientError::VersionChurn);
                    }
                    continue;
                }
            }

            if !assembly.has_more() {
                return Ok(assembly.into_records());
            }
            if page.data.is_empty() {
                return Err(ClientError::InconsistentSequence(format!(
                    "empty page at offset {} with {} of {} records accumulated",
                    page.offset,
                    assembly.records().len(),
                    assembly.total()
                )));
            }
        }
    }
}
