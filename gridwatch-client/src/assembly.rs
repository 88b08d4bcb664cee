use chrono::{DateTime, Utc};

use gridwatch_core::{PageResponse, ProcessedRecord, SnapshotRef};

/// What ingesting one chunk did to the accumulated sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The chunk extended the sequence.
    Appended,
    /// The chunk carried a newer version; the sequence was reset to it.
    Restarted,
    /// The chunk was stale or out of order and was ignored.
    Rejected,
}

/// Sequential chunk accumulator for one data type.
///
/// Supports the paging pattern offset `0, limit, 2*limit, ...` and enforces
/// the coherence rule: chunks of different `{version, url}` pairs are never
/// merged into one sequence. A newer pair restarts accumulation from scratch.
#[derive(Debug, Default)]
pub struct ChunkAssembly {
    identity: Option<(DateTime<Utc>, SnapshotRef)>,
    records: Vec<ProcessedRecord>,
    total: usize,
}

impl ChunkAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, chunk: &PageResponse) -> IngestOutcome {
        match &self.identity {
            Some((version, url)) if *version == chunk.version && *url == chunk.url => {
                if chunk.offset != self.records.len() {
                    return IngestOutcome::Rejected;
                }
                self.records.extend(chunk.data.iter().cloned());
                self.total = chunk.total;
                IngestOutcome::Appended
            }
            Some((version, _)) if chunk.version > *version => {
                self.adopt(chunk);
                IngestOutcome::Restarted
            }
            Some(_) => IngestOutcome::Rejected,
            None => {
                self.adopt(chunk);
                IngestOutcome::Appended
            }
        }
    }

    /// Reset to the chunk's snapshot. Its records are kept only when it is
    /// the sequence head; otherwise accumulation resumes at offset zero.
    fn adopt(&mut self, chunk: &PageResponse) {
        self.identity = Some((chunk.version, chunk.url.clone()));
        self.records.clear();
        self.total = chunk.total;
        if chunk.offset == 0 {
            self.records.extend(chunk.data.iter().cloned());
        }
    }

    pub fn has_more(&self) -> bool {
        self.records.len() < self.total
    }

    /// Offset the next sequential fetch should use.
    pub fn next_offset(&self) -> usize {
        self.records.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn records(&self) -> &[ProcessedRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ProcessedRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwatch_core::{
        FeatureAttributes, FeatureId, Geometry, LuminaireAttributes, LuminaireStatus,
    };

    fn luminaire(i: i64) -> ProcessedRecord {
        let attributes = FeatureAttributes::Luminaire(LuminaireAttributes {
            object_id: FeatureId::Number(i),
            global_id: Some(format!("lum-{}", i)),
            name: format!("Luminaire {}", i),
            status: LuminaireStatus::Active,
            kind: "streetlight".to_string(),
            wattage: None,
            installation_date: None,
            last_updated: None,
            extra: serde_json::Map::new(),
        });
        ProcessedRecord {
            id: ProcessedRecord::stable_id(&attributes),
            attributes,
            geometry: Geometry {
                kind: "Point".to_string(),
                coordinates: [0.0, 0.0],
            },
        }
    }

    fn page(
        version: &str,
        url: &str,
        range: std::ops::Range<i64>,
        total: usize,
        limit: usize,
    ) -> PageResponse {
        PageResponse {
            version: version.parse().unwrap(),
            url: SnapshotRef::new(url),
            data: range.clone().map(luminaire).collect(),
            total,
            offset: range.start as usize,
            limit,
        }
    }

    const V1: &str = "2026-08-01T00:00:00Z";
    const V2: &str = "2026-08-02T00:00:00Z";

    /// Tests sequential accumulation across a tiled snapshot
    /// Purpose: chunks at offsets 0, limit, 2*limit reassemble the full,
    ///          order-preserved sequence
    /// Expected: 2500 records in order; has_more flips to false at the end
    #[test]
    fn test_sequential_accumulation() {
        let mut assembly = ChunkAssembly::new();

        let chunks = [
            page(V1, "snapshots/a.json", 0..1000, 2500, 1000),
            page(V1, "snapshots/a.json", 1000..2000, 2500, 1000),
            page(V1, "snapshots/a.json", 2000..2500, 2500, 1000),
        ];
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(assembly.next_offset(), i * 1000);
            assert!(assembly.has_more() || i == 0);
            assert_eq!(assembly.ingest(chunk), IngestOutcome::Appended);
        }

        assert!(!assembly.has_more());
        let records = assembly.into_records();
        assert_eq!(records.len(), 2500);
        let expected: Vec<_> = (0..2500).map(luminaire).collect();
        assert_eq!(records, expected);
    }

    /// Tests the stale-chunk rejection rule
    /// Purpose: a chunk under an older version must never be merged with a
    ///          fresher sequence
    /// Expected: the V1 chunk is rejected once the assembly tracks V2
    #[test]
    fn test_stale_chunk_rejected() {
        let mut assembly = ChunkAssembly::new();
        assert_eq!(
            assembly.ingest(&page(V2, "snapshots/b.json", 0..1000, 2000, 1000)),
            IngestOutcome::Appended
        );
        assert_eq!(
            assembly.ingest(&page(V1, "snapshots/a.json", 1000..2000, 2000, 1000)),
            IngestOutcome::Rejected
        );
        assert_eq!(assembly.records().len(), 1000);
    }

    /// Tests restart on a mid-pagination version change
    /// Purpose: a newer version resets accumulation instead of mixing versions
    /// Expected: Restarted, sequence drops back to offset zero, and the next
    ///           head chunk of the new version is kept
    #[test]
    fn test_version_change_restarts() {
        let mut assembly = ChunkAssembly::new();
        assembly.ingest(&page(V1, "snapshots/a.json", 0..1000, 2500, 1000));

        // the server moved on; a non-head chunk of V2 arrives
        assert_eq!(
            assembly.ingest(&page(V2, "snapshots/b.json", 1000..2000, 1500, 1000)),
            IngestOutcome::Restarted
        );
        assert_eq!(assembly.next_offset(), 0);
        assert!(assembly.has_more());

        // resume from the head of V2
        assert_eq!(
            assembly.ingest(&page(V2, "snapshots/b.json", 0..1000, 1500, 1000)),
            IngestOutcome::Appended
        );
        assert_eq!(
            assembly.ingest(&page(V2, "snapshots/b.json", 1000..1500, 1500, 1000)),
            IngestOutcome::Appended
        );
        assert!(!assembly.has_more());
        assert_eq!(assembly.records().len(), 1500);
    }

    /// Tests out-of-order same-version chunks
    /// Purpose: only the sequential access pattern is supported
    /// Expected: a gap-producing chunk is rejected without corrupting state
    #[test]
    fn test_out_of_order_rejected() {
        let mut assembly = ChunkAssembly::new();
        assembly.ingest(&page(V1, "snapshots/a.json", 0..1000, 2500, 1000));
        assert_eq!(
            assembly.ingest(&page(V1, "snapshots/a.json", 2000..2500, 2500, 1000)),
            IngestOutcome::Rejected
        );
        assert_eq!(assembly.next_offset(), 1000);
    }

    /// Tests the empty snapshot
    /// Purpose: a zero-record snapshot terminates pagination immediately
    /// Expected: Appended once, has_more false
    #[test]
    fn test_empty_snapshot() {
        let mut assembly = ChunkAssembly::new();
        assert_eq!(
            assembly.ingest(&page(V1, "snapshots/a.json", 0..0, 0, 1000)),
            IngestOutcome::Appended
        );
        assert!(!assembly.has_more());
        assert!(assembly.into_records().is_empty());
    }
}
