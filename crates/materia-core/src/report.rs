//! # Statistics & Quality Report
//!
//! Aggregate views over the stored rule set.
//!
//! `RuleStats` is the raw histogram; `QualityReport` derives percentages and a
//! composite quality score from it:
//!
//! ```text
//! quality = 0.4 · high_confidence_ratio
//!         + 0.3 · cross_validated_ratio
//!         + 0.2 · min(1, domain_specific_tags / max(1, 0.5 · total))
//!         + 0.1 · (1 − high_uncertainty_ratio)
//! ```

use crate::primitives::{HIGH_CONFIDENCE, HIGH_UNCERTAINTY, MIN_CONFIDENCE};
use crate::storage::Snapshot;
use crate::types::{Domain, round3};
use crate::Rule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Confidence histogram: high ≥ 0.8, medium 0.6–0.8, low < 0.6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ConfidenceDistribution {
    fn record(&mut self, confidence: f64) {
        if confidence >= HIGH_CONFIDENCE {
            self.high += 1;
        } else if confidence >= MIN_CONFIDENCE {
            self.medium += 1;
        } else {
            self.low += 1;
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleStats {
    pub total_rules: usize,
    pub confidence_distribution: ConfidenceDistribution,
    /// Tag → number of rules carrying it (a rule counts once per tag).
    pub domains: BTreeMap<String, usize>,
    pub rule_types: BTreeMap<String, usize>,
    pub cross_validated_rules: usize,
    pub total_sources: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
}

impl RuleStats {
    /// Compute statistics from a snapshot.
    #[must_use]
    pub fn compute(snapshot: &Snapshot) -> Self {
        let mut confidence_distribution = ConfidenceDistribution::default();
        let mut domains: BTreeMap<String, usize> = BTreeMap::new();
        let mut rule_types: BTreeMap<String, usize> = BTreeMap::new();
        let mut cross_validated_rules = 0;

        for rule in &snapshot.rules {
            confidence_distribution.record(rule.confidence());
            for domain in &rule.domain {
                *domains.entry(domain.as_str().to_string()).or_default() += 1;
            }
            *rule_types.entry(rule.rule_type.as_str().to_string()).or_default() += 1;
            if snapshot
                .validation
                .get(&rule.fingerprint())
                .is_some_and(|record| record.cross_validated)
            {
                cross_validated_rules += 1;
            }
        }

        Self {
            total_rules: snapshot.rules.len(),
            confidence_distribution,
            domains,
            rule_types,
            cross_validated_rules,
            total_sources: snapshot.metadata.len(),
            last_update: snapshot
                .metadata
                .values()
                .map(|record| record.extraction_timestamp)
                .max(),
        }
    }
}

/// Quality metrics of the rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_rules: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
    pub high_confidence_percentage: f64,
    pub domains_covered: Vec<String>,
    pub domain_specific_rules: usize,
    pub generic_rules: usize,
    pub cross_validated_rules: usize,
    pub cross_validated_percentage: f64,
    pub rule_types: BTreeMap<String, usize>,
    pub flagged_low_confidence: usize,
    pub high_uncertainty_rules: usize,
    pub quality_score: f64,
}

impl QualityReport {
    /// Derive the report from statistics and the rules they were computed on.
    #[must_use]
    pub fn from_stats(stats: &RuleStats, rules: &[Rule]) -> Self {
        let total = stats.total_rules;
        let general = Domain::General.as_str();

        let domain_specific: usize = stats
            .domains
            .iter()
            .filter(|(tag, _)| tag.as_str() != general)
            .map(|(_, count)| count)
            .sum();
        let generic = stats.domains.get(general).copied().unwrap_or(0);
        let flagged_low_confidence = rules
            .iter()
            .filter(|r| r.confidence() < MIN_CONFIDENCE)
            .count();
        let high_uncertainty = rules
            .iter()
            .filter(|r| r.uncertainty() > HIGH_UNCERTAINTY)
            .count();

        let percentage = |count: usize| {
            if total == 0 {
                0.0
            } else {
                (count as f64 / total as f64 * 1000.0).round() / 10.0
            }
        };

        let quality_score = if rules.is_empty() {
            0.0
        } else {
            let n = rules.len() as f64;
            let confidence_score = stats.confidence_distribution.high as f64 / n;
            let validation_score = stats.cross_validated_rules as f64 / n;
            let domain_score = (domain_specific as f64 / (n * 0.5).max(1.0)).min(1.0);
            let uncertainty_score = 1.0 - high_uncertainty as f64 / n;
            round3(
                confidence_score * 0.4
                    + validation_score * 0.3
                    + domain_score * 0.2
                    + uncertainty_score * 0.1,
            )
        };

        Self {
            total_rules: total,
            high_confidence: stats.confidence_distribution.high,
            medium_confidence: stats.confidence_distribution.medium,
            low_confidence: stats.confidence_distribution.low,
            high_confidence_percentage: percentage(stats.confidence_distribution.high),
            domains_covered: stats.domains.keys().cloned().collect(),
            domain_specific_rules: domain_specific,
            generic_rules: generic,
            cross_validated_rules: stats.cross_validated_rules,
            cross_validated_percentage: percentage(stats.cross_validated_rules),
            rule_types: stats.rule_types.clone(),
            flagged_low_confidence,
            high_uncertainty_rules: high_uncertainty,
            quality_score,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
