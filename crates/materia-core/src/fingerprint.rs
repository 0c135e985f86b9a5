//! # Fingerprint & Deduplication
//!
//! Content fingerprints and the corroboration merge.
//!
//! A fingerprint is the BLAKE3 hex digest of the lower-cased, trimmed rule
//! text. It is textual, not semantic: two differently worded statements of the
//! same fact produce different fingerprints and are stored separately.

use crate::Rule;
use crate::primitives::CORROBORATION_INCREMENT;
use crate::types::ValidationStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded content digest of a rule text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a rule text.
    #[must_use]
    pub fn of_text(text: &str) -> Self {
        let canonical = text.trim().to_lowercase();
        Self(blake3::hash(canonical.as_bytes()).to_hex().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened when a duplicate candidate met its stored twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The candidate's source was new; the stored rule was reinforced.
    Corroborated,
    /// The source was already listed; nothing changed.
    Unchanged,
}

/// Merges duplicate candidates into the rule they duplicate.
pub struct Deduplicator;

impl Deduplicator {
    /// Fold `candidate` into `existing`.
    ///
    /// A new source is appended, the frequency re-synchronized, the confidence
    /// raised by the corroboration increment (capped at 1.0), and an
    /// `extracted` rule upgraded to `validated` once two sources support it.
    pub fn merge(existing: &mut Rule, candidate: &Rule) -> MergeOutcome {
        if !existing.add_supporting_source(candidate.source_key()) {
            return MergeOutcome::Unchanged;
        }

        existing.set_confidence(existing.confidence() + CORROBORATION_INCREMENT);

        if existing.validation_status == ValidationStatus::Extracted
            && existing.supported_by_papers.len() >= 2
        {
            existing.validation_status = ValidationStatus::Validated;
        }

        MergeOutcome::Corroborated
    }
}

// =============================================================================
// TESTS
// =============================================================================
