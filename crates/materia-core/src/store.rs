//! # Rule Store
//!
//! The façade coordinating every write and read of the knowledge base.
//!
//! A save is one read-compute-write cycle under the backend's lock:
//!
//! 1. Read the full snapshot
//! 2. Per candidate: Normalizer → Validator → Deduplicator
//! 3. CrossValidator over the whole rule set
//! 4. Rebuild the index
//! 5. Update source metadata
//! 6. Write the full snapshot
//!
//! No other component reasons about persistence.

use crate::cross_validation::{CrossValidator, ValidationRecords};
use crate::fingerprint::{Deduplicator, Fingerprint, MergeOutcome};
use crate::index::RuleIndex;
use crate::metadata::{BatchCounts, MetadataMap, SourceMetadata, record_batch};
use crate::normalizer::{Normalizer, RuleCandidate};
use crate::primitives::{MAX_BATCH_SIZE, MIN_CONFIDENCE};
use crate::report::{QualityReport, RuleStats};
use crate::storage::{BackendKind, RuleBackend, Snapshot, StorageBackend};
use crate::types::{Category, Domain, RuleId, RuleType};
use crate::validator::{Validator, Verdict};
use crate::{MateriaError, Rule};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use time::OffsetDateTime;

// =============================================================================
// BATCH SUMMARY
// =============================================================================

/// A candidate that did not pass validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub rule_text: String,
    pub reason: String,
}

/// Outcome of one `save` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSummary {
    /// New rows written.
    pub inserted: usize,
    /// Candidates folded into an existing rule.
    pub duplicates: usize,
    pub rejected: Vec<Rejection>,
    /// Accepted candidates with uncertainty above the flagging threshold.
    pub flagged: usize,
}

// =============================================================================
// FILTER
// =============================================================================

/// Conjunctive filter for `RuleStore::load`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleFilter {
    pub category: Option<Category>,
    pub property: Option<String>,
    pub domain: Option<Domain>,
    pub rule_type: Option<RuleType>,
    pub min_confidence: f64,
}

impl RuleFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn rule_type(mut self, rule_type: RuleType) -> Self {
        self.rule_type = Some(rule_type);
        self
    }

    #[must_use]
    pub fn min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Whether `rule` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, rule: &Rule) -> bool {
        self.category.is_none_or(|c| rule.category == c)
            && self.property.as_ref().is_none_or(|p| &rule.property == p)
            && self.domain.is_none_or(|d| rule.has_domain(d))
            && self.rule_type.is_none_or(|t| rule.rule_type == t)
            && rule.confidence() >= self.min_confidence
    }
}

// =============================================================================
// RULE STORE
// =============================================================================

/// The rule knowledge base.
#[derive(Debug, Default)]
pub struct RuleStore {
    backend: StorageBackend,
}

impl RuleStore {
    /// Create a store over an already opened backend.
    #[must_use]
    pub fn new(backend: StorageBackend) -> Self {
        Self { backend }
    }

    /// Create a volatile store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store of `kind` at `path`.
    pub fn open(kind: BackendKind, path: &Path, backup: bool) -> Result<Self, MateriaError> {
        Ok(Self::new(StorageBackend::open(kind, path, backup)?))
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Ingest a batch of candidates.
    ///
    /// Rejections are reported in the summary, never raised. An empty batch
    /// writes nothing. Source metadata, when given, supplies the
    /// `source_paper_id` of candidates that lack one and is recorded in the
    /// metadata document.
    pub fn save(
        &mut self,
        candidates: Vec<RuleCandidate>,
        source: Option<&SourceMetadata>,
    ) -> Result<SaveSummary, MateriaError> {
        if candidates.is_empty() {
            return Ok(SaveSummary::default());
        }
        if candidates.len() > MAX_BATCH_SIZE {
            return Err(MateriaError::InvalidInput(format!(
                "batch of {} candidates exceeds maximum {}",
                candidates.len(),
                MAX_BATCH_SIZE
            )));
        }

        let _lock = self.backend.lock()?;
        let mut snapshot = self.backend.read_snapshot()?;
        let mut ids = IdAllocator::assign_missing(&mut snapshot.rules)?;
        let source_key = source.map(SourceMetadata::key);

        let mut positions: BTreeMap<Fingerprint, usize> = BTreeMap::new();
        for (position, rule) in snapshot.rules.iter().enumerate() {
            positions.entry(rule.fingerprint()).or_insert(position);
        }

        let mut summary = SaveSummary::default();
        for mut candidate in candidates {
            // Ids and boosts are store-owned
            candidate.rule_id = None;
            candidate.cross_validation_boost = None;
            if candidate.source_paper_id.is_none() {
                candidate.source_paper_id.clone_from(&source_key);
            }
            let mut rule = Normalizer::normalize(candidate);

            match Validator::check(&rule) {
                Verdict::Rejected(reason) => {
                    tracing::debug!(%reason, "candidate rejected");
                    summary.rejected.push(Rejection {
                        rule_text: rule.rule_text,
                        reason,
                    });
                    continue;
                }
                Verdict::Flagged => summary.flagged += 1,
                Verdict::Accepted => {}
            }

            let fingerprint = rule.fingerprint();
            if let Some(&position) = positions.get(&fingerprint) {
                if Deduplicator::merge(&mut snapshot.rules[position], &rule)
                    == MergeOutcome::Corroborated
                {
                    tracing::debug!(rule_id = ?snapshot.rules[position].rule_id, "rule corroborated");
                }
                summary.duplicates += 1;
                continue;
            }

            rule.rule_id = Some(ids.allocate()?);

            positions.insert(fingerprint, snapshot.rules.len());
            snapshot.rules.push(rule);
            summary.inserted += 1;
        }

        snapshot.validation = CrossValidator::run(&mut snapshot.rules);
        snapshot.index = RuleIndex::build(&snapshot.rules);
        if let Some(source) = source {
            record_batch(
                &mut snapshot.metadata,
                source,
                BatchCounts {
                    accepted: summary.inserted,
                    rejected: summary.rejected.len(),
                    duplicates: summary.duplicates,
                },
                OffsetDateTime::now_utc(),
            );
        }

        self.backend.write_snapshot(&snapshot)?;

        tracing::info!(
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            rejected = summary.rejected.len(),
            flagged = summary.flagged,
            total = snapshot.rules.len(),
            "batch saved"
        );
        Ok(summary)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// All rules matching `filter`, in collection order.
    pub fn load(&self, filter: &RuleFilter) -> Result<Vec<Rule>, MateriaError> {
        Ok(self
            .read()?
            .rules
            .into_iter()
            .filter(|rule| filter.matches(rule))
            .collect())
    }

    /// Rules whose indexed keywords include `keyword`, or whose text contains
    /// it, in collection order.
    pub fn search(&self, keyword: &str) -> Result<Vec<Rule>, MateriaError> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.read()?;
        let hits: BTreeSet<&RuleId> = snapshot.index.keyword_hits(&needle).iter().collect();

        Ok(snapshot
            .rules
            .iter()
            .filter(|rule| {
                rule.id().is_some_and(|id| hits.contains(id))
                    || rule.rule_text.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    pub fn stats(&self) -> Result<RuleStats, MateriaError> {
        Ok(RuleStats::compute(&self.read()?))
    }

    pub fn quality_report(&self) -> Result<QualityReport, MateriaError> {
        let snapshot = self.read()?;
        let stats = RuleStats::compute(&snapshot);
        Ok(QualityReport::from_stats(&stats, &snapshot.rules))
    }

    /// Rules that constrain a property present on the material.
    ///
    /// Only rules at or above the confidence floor; with a domain, only rules
    /// tagged with it or with `general`.
    pub fn rules_for_material(
        &self,
        properties: &BTreeMap<String, f64>,
        domain: Option<Domain>,
    ) -> Result<Vec<Rule>, MateriaError> {
        Ok(self
            .read()?
            .rules
            .into_iter()
            .filter(|rule| rule.confidence() >= MIN_CONFIDENCE)
            .filter(|rule| properties.contains_key(&rule.property))
            .filter(|rule| {
                domain.is_none_or(|d| rule.has_domain(d) || rule.has_domain(Domain::General))
            })
            .collect())
    }

    /// The persisted index.
    pub fn index(&self) -> Result<RuleIndex, MateriaError> {
        Ok(self.read()?.index)
    }

    /// The persisted cross-validation records.
    pub fn validation_records(&self) -> Result<ValidationRecords, MateriaError> {
        Ok(self.read()?.validation)
    }

    /// The persisted per-source metadata.
    pub fn metadata(&self) -> Result<MetadataMap, MateriaError> {
        Ok(self.read()?.metadata)
    }

    /// Full snapshot, for export and inspection.
    pub fn snapshot(&self) -> Result<Snapshot, MateriaError> {
        self.read()
    }

    /// Read the snapshot, identifying rules persisted without a usable id.
    ///
    /// Assignment is deterministic, so the next save persists the same ids.
    fn read(&self) -> Result<Snapshot, MateriaError> {
        let mut snapshot = self.backend.read_snapshot()?;
        if IdAllocator::assign_missing(&mut snapshot.rules)?.assigned > 0 {
            snapshot.index = RuleIndex::build(&snapshot.rules);
        }
        Ok(snapshot)
    }
}

// =============================================================================
// ID ALLOCATION
// =============================================================================

/// Hands out `rule_NNNNNN` ids past the highest sequence in use.
struct IdAllocator {
    /// `None` once the sequence space is exhausted.
    next: Option<u64>,
    assigned: usize,
}

impl IdAllocator {
    /// Give every id-less rule, and every repeat of an id, a fresh id.
    ///
    /// Returns the allocator positioned after every id now in use.
    fn assign_missing(rules: &mut [Rule]) -> Result<Self, MateriaError> {
        let highest = rules.iter().filter_map(Rule::id).filter_map(RuleId::sequence).max();
        let mut ids = Self {
            next: highest.map_or(Some(1), |max| max.checked_add(1)),
            assigned: 0,
        };

        let mut seen: BTreeSet<RuleId> = BTreeSet::new();
        for rule in rules.iter_mut() {
            let unique = rule.rule_id.as_ref().is_some_and(|id| seen.insert(id.clone()));
            if !unique {
                let id = ids.allocate()?;
                tracing::debug!(rule_id = %id, "assigned id to stored rule");
                seen.insert(id.clone());
                rule.rule_id = Some(id);
            }
        }
        Ok(ids)
    }

    fn allocate(&mut self) -> Result<RuleId, MateriaError> {
        let sequence = self
            .next
            .ok_or_else(|| MateriaError::Storage("rule id sequence exhausted".to_string()))?;
        self.next = sequence.checked_add(1);
        self.assigned += 1;
        Ok(RuleId::from_sequence(sequence))
    }
}

// =============================================================================
// TESTS
// =============================================================================
