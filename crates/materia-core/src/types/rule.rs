//! The canonical `Rule` record.
//!
//! Produced only by the normalizer; mutated afterwards only by the store
//! (corroboration and cross-validation), which goes through `set_confidence`
//! so that `confidence`, `statistical_confidence` and `uncertainty` stay in
//! step.

use super::{Category, Domain, EvidenceStrength, Operator, RuleId, RuleType, ValidationStatus};
use super::round3;
use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};

/// A quantitative claim about a material property.
///
/// Every optional field is serialized (as `null` when absent) so the same
/// shape round-trips through both JSON documents and postcard values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: Option<RuleId>,
    pub rule_text: String,
    pub rule_type: RuleType,
    pub property: String,
    pub threshold_value: Option<f64>,
    pub threshold_unit: String,
    pub operator: Option<Operator>,
    pub range_start: Option<f64>,
    pub range_end: Option<f64>,
    pub application: String,
    pub domain: Vec<Domain>,
    pub category: Category,
    pub evidence_strength: EvidenceStrength,
    pub(crate) confidence: f64,
    pub(crate) statistical_confidence: f64,
    pub(crate) uncertainty: f64,
    pub validation_status: ValidationStatus,
    pub edge_cases: Vec<String>,
    pub fails_for: Vec<String>,
    pub validated_materials: Vec<String>,
    pub evidence_count: Option<u64>,
    pub source_paper_id: Option<String>,
    pub source_section: Option<String>,
    pub publication_year: Option<i32>,
    pub supported_by_papers: Vec<String>,
    pub rule_frequency: u32,
    pub cross_validation_boost: f64,
}

impl Rule {
    /// Identifier assigned by the store, if stored.
    #[must_use]
    pub fn id(&self) -> Option<&RuleId> {
        self.rule_id.as_ref()
    }

    /// Confidence in [0, 1].
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Uncertainty in [0, 1]; within 0.1 of `1 - confidence`.
    #[must_use]
    pub fn uncertainty(&self) -> f64 {
        self.uncertainty
    }

    /// Replace the confidence and recompute the uncertainty.
    ///
    /// The value is clamped to [0, 1] and kept at 3 decimal places.
    pub fn set_confidence(&mut self, value: f64) {
        let clamped = round3(value.clamp(0.0, 1.0));
        self.confidence = clamped;
        self.statistical_confidence = clamped;
        self.uncertainty = round3(1.0 - clamped);
    }

    /// Content fingerprint used for deduplication.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_text(&self.rule_text)
    }

    /// Whether the rule is tagged with `domain`.
    #[must_use]
    pub fn has_domain(&self, domain: Domain) -> bool {
        self.domain.contains(&domain)
    }

    /// Source identifier this rule was extracted from (`"unknown"` if none).
    #[must_use]
    pub fn source_key(&self) -> &str {
        self.source_paper_id.as_deref().unwrap_or("unknown")
    }

    /// Record an additional supporting source.
    ///
    /// Returns `false` when the source was already listed.
    pub fn add_supporting_source(&mut self, source: &str) -> bool {
        if self.supported_by_papers.iter().any(|s| s == source) {
            return false;
        }
        self.supported_by_papers.push(source.to_string());
        self.rule_frequency = self.supported_by_papers.len() as u32;
        true
    }
}

// =============================================================================
// TESTS
// =============================================================================
