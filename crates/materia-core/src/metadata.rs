//! # Source Metadata
//!
//! Per-source bookkeeping: who contributed rules, when, and how many of them
//! survived validation and deduplication.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Descriptor of the paper or catalog entry a batch came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMetadata {
    pub source_id: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub url: Option<String>,
}

impl SourceMetadata {
    /// Key under which this source is recorded.
    ///
    /// Explicit `source_id`, else `url`, else `title`, else `"unknown"`.
    #[must_use]
    pub fn key(&self) -> String {
        [&self.source_id, &self.url, &self.title]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string()
    }
}

/// Persisted record of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub extraction_timestamp: OffsetDateTime,
    pub rules_accepted: usize,
    pub rules_rejected: usize,
    pub rules_duplicate: usize,
    pub batches: u32,
}

/// Source key → record.
pub type MetadataMap = BTreeMap<String, SourceRecord>;

/// Counts contributed by one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates: usize,
}

/// Create or update the record for `source`.
///
/// Counts accumulate and the timestamp is refreshed on every batch.
pub fn record_batch(
    metadata: &mut MetadataMap,
    source: &SourceMetadata,
    counts: BatchCounts,
    now: OffsetDateTime,
) {
    metadata
        .entry(source.key())
        .and_modify(|record| {
            record.extraction_timestamp = now;
            record.rules_accepted += counts.accepted;
            record.rules_rejected += counts.rejected;
            record.rules_duplicate += counts.duplicates;
            record.batches += 1;
            if record.title.is_none() {
                record.title.clone_from(&source.title);
            }
            if record.url.is_none() {
                record.url.clone_from(&source.url);
            }
            if record.authors.is_empty() {
                record.authors.clone_from(&source.authors);
            }
        })
        .or_insert_with(|| SourceRecord {
            title: source.title.clone(),
            authors: source.authors.clone(),
            url: source.url.clone(),
            extraction_timestamp: now,
            rules_accepted: counts.accepted,
            rules_rejected: counts.rejected,
            rules_duplicate: counts.duplicates,
            batches: 1,
        });
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn key_precedence() {
        let mut source = SourceMetadata {
            title: Some("Perovskite stability".into()),
            ..SourceMetadata::default()
        };
        assert_eq!(source.key(), "Perovskite stability");

        source.url = Some("https://doi.org/10.1000/x".into());
        assert_eq!(source.key(), "https://doi.org/10.1000/x");

        source.source_id = Some("paper_a".into());
        assert_eq!(source.key(), "paper_a");

        assert_eq!(SourceMetadata::default().key(), "unknown");
    }

    #[test]
    fn counts_accumulate_across_batches() {
        let mut metadata = MetadataMap::new();
        let source = SourceMetadata {
            source_id: Some("paper_a".into()),
            ..SourceMetadata::default()
        };
        let t0 = OffsetDateTime::UNIX_EPOCH;
        let t1 = t0 + Duration::hours(1);

        record_batch(
            &mut metadata,
            &source,
            BatchCounts { accepted: 2, rejected: 1, duplicates: 0 },
            t0,
        );
        record_batch(
            &mut metadata,
            &source,
            BatchCounts { accepted: 1, rejected: 0, duplicates: 3 },
            t1,
        );

        let record = &metadata["paper_a"];
        assert_eq!(record.rules_accepted, 3);
        assert_eq!(record.rules_rejected, 1);
        assert_eq!(record.rules_duplicate, 3);
        assert_eq!(record.batches, 2);
        assert_eq!(record.extraction_timestamp, t1);
    }

    #[test]
    fn timestamp_serializes_as_rfc3339() {
        let mut metadata = MetadataMap::new();
        record_batch(
            &mut metadata,
            &SourceMetadata::default(),
            BatchCounts::default(),
            OffsetDateTime::UNIX_EPOCH,
        );
        let json = serde_json::to_string(&metadata).expect("serialize");
        assert!(json.contains("\"extraction_timestamp\":\"1970-01-01T00:00:00Z\""));
    }
}
