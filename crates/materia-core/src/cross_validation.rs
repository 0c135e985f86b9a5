//! # Cross-Validation Module
//!
//! Reinforces rules whose statement recurs in the stored set.
//!
//! The pass groups every rule by fingerprint. Members of a group with more
//! than one rule receive a boost of `min(0.1, sources × 0.02)`, where
//! `sources` counts distinct `source_paper_id`s in the group.
//!
//! The boost is applied relative to the un-boosted confidence and recorded on
//! the rule, so repeated passes do not compound and a rule that leaves its
//! group gets the boost withdrawn. Withdrawal also re-derives the validation
//! status from the rule's own sources and evidence.

use crate::Rule;
use crate::fingerprint::Fingerprint;
use crate::normalizer::Normalizer;
use crate::primitives::{BOOST_PER_SOURCE, MAX_BOOST};
use crate::types::{ValidationStatus, round3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-fingerprint cross-validation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub cross_validated: bool,
    pub source_count: usize,
    pub rule_count: usize,
    pub confidence_boost: f64,
}

/// Fingerprint → record, as persisted in the validation document.
pub type ValidationRecords = BTreeMap<Fingerprint, ValidationRecord>;

/// Whole-set cross-validation pass.
pub struct CrossValidator;

impl CrossValidator {
    /// Run the pass over the full rule set, mutating confidences in place.
    pub fn run(rules: &mut [Rule]) -> ValidationRecords {
        let mut groups: BTreeMap<Fingerprint, Vec<usize>> = BTreeMap::new();
        for (position, rule) in rules.iter().enumerate() {
            groups.entry(rule.fingerprint()).or_default().push(position);
        }

        let mut records = ValidationRecords::new();
        for (fingerprint, members) in groups {
            let record = if members.len() > 1 {
                let sources: BTreeSet<&str> =
                    members.iter().map(|&i| rules[i].source_key()).collect();
                let boost = round3((sources.len() as f64 * BOOST_PER_SOURCE).min(MAX_BOOST));
                let source_count = sources.len();

                for &i in &members {
                    Self::apply_boost(&mut rules[i], boost);
                    rules[i].validation_status = ValidationStatus::Validated;
                }

                ValidationRecord {
                    cross_validated: true,
                    source_count,
                    rule_count: members.len(),
                    confidence_boost: boost,
                }
            } else {
                for &i in &members {
                    let dissolved = rules[i].cross_validation_boost > 0.0;
                    Self::apply_boost(&mut rules[i], 0.0);
                    if dissolved {
                        rules[i].validation_status = Normalizer::status_for(&rules[i]);
                    }
                }
                ValidationRecord {
                    cross_validated: false,
                    source_count: 1,
                    rule_count: 1,
                    confidence_boost: 0.0,
                }
            };
            records.insert(fingerprint, record);
        }

        let validated = records.values().filter(|r| r.cross_validated).count();
        if validated > 0 {
            tracing::debug!(groups = validated, "cross-validated rule groups");
        }

        records
    }

    /// Replace the currently applied boost with `boost`.
    fn apply_boost(rule: &mut Rule, boost: f64) {
        if (rule.cross_validation_boost - boost).abs() < 1e-9 {
            return;
        }
        let base = round3(rule.confidence() - rule.cross_validation_boost);
        rule.set_confidence(base + boost);
        // capped at 1.0, so the effective boost may be smaller
        rule.cross_validation_boost = round3(rule.confidence() - base);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::RuleCandidate;

    fn rule(text: &str, confidence: f64, source: &str) -> Rule {
        Normalizer::normalize(
            RuleCandidate::new(text)
                .with_property("band_gap")
                .with_confidence(confidence)
                .with_source(source),
        )
    }

    #[test]
    fn singleton_is_not_boosted() {
        let mut rules = vec![rule("Band gap above 1.1 eV", 0.8, "a")];
        let records = CrossValidator::run(&mut rules);

        let record = records.values().next().expect("one record");
        assert!(!record.cross_validated);
        assert_eq!(record.confidence_boost, 0.0);
        assert_eq!(rules[0].confidence(), 0.8);
    }

    #[test]
    fn duplicate_group_boosted_per_source() {
        let mut rules = vec![
            rule("Band gap above 1.1 eV", 0.8, "a"),
            rule("band gap above 1.1 eV", 0.7, "b"),
            rule("Formation energy below 0 eV/atom", 0.9, "a"),
        ];
        let records = CrossValidator::run(&mut rules);

        let record = &records[&Fingerprint::of_text("band gap above 1.1 eV")];
        assert!(record.cross_validated);
        assert_eq!(record.source_count, 2);
        assert_eq!(record.rule_count, 2);
        assert_eq!(record.confidence_boost, 0.04);

        assert_eq!(rules[0].confidence(), 0.84);
        assert_eq!(rules[1].confidence(), 0.74);
        assert_eq!(rules[0].validation_status, ValidationStatus::Validated);
        assert_eq!(rules[2].confidence(), 0.9);
    }

    #[test]
    fn repeated_passes_do_not_compound() {
        let mut rules = vec![
            rule("Band gap above 1.1 eV", 0.8, "a"),
            rule("Band gap above 1.1 eV", 0.8, "b"),
        ];
        let first = CrossValidator::run(&mut rules);
        let snapshot = rules.clone();
        let second = CrossValidator::run(&mut rules);

        assert_eq!(first, second);
        assert_eq!(rules, snapshot);
    }

    #[test]
    fn boost_bounded_by_max() {
        let mut rules: Vec<Rule> = (0..8)
            .map(|i| rule("Band gap above 1.1 eV", 0.7, &format!("paper_{i}")))
            .collect();
        let records = CrossValidator::run(&mut rules);

        assert_eq!(records.values().next().expect("record").confidence_boost, 0.1);
        assert!(rules.iter().all(|r| r.confidence() == 0.8));
    }

    #[test]
    fn boost_withdrawn_when_group_dissolves() {
        let mut rules = vec![
            rule("Band gap above 1.1 eV", 0.8, "a"),
            rule("Band gap above 1.1 eV", 0.8, "b"),
        ];
        CrossValidator::run(&mut rules);
        assert_eq!(rules[0].confidence(), 0.84);

        let mut remaining = vec![rules[0].clone()];
        CrossValidator::run(&mut remaining);
        assert_eq!(remaining[0].confidence(), 0.8);
        assert_eq!(remaining[0].cross_validation_boost, 0.0);
        assert_eq!(remaining[0].validation_status, ValidationStatus::Extracted);
    }

    #[test]
    fn dissolved_group_keeps_evidence_backed_status() {
        let mut rules = vec![
            rule("Band gap above 1.1 eV", 0.8, "a"),
            rule("Band gap above 1.1 eV", 0.8, "b"),
        ];
        CrossValidator::run(&mut rules);

        let mut corroborated = rules[0].clone();
        corroborated.add_supporting_source("c");
        let mut remaining = vec![corroborated];
        CrossValidator::run(&mut remaining);
        assert_eq!(remaining[0].validation_status, ValidationStatus::Validated);
    }

    #[test]
    fn boost_capped_at_full_confidence() {
        let mut rules = vec![
            rule("Band gap above 1.1 eV", 0.99, "a"),
            rule("Band gap above 1.1 eV", 0.99, "b"),
        ];
        CrossValidator::run(&mut rules);
        assert_eq!(rules[0].confidence(), 1.0);
        assert_eq!(rules[0].cross_validation_boost, 0.01);

        CrossValidator::run(&mut rules);
        assert_eq!(rules[0].confidence(), 1.0);
    }
}
