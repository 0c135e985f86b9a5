//! # Scoring Engine
//!
//! Evaluates a material's properties against the stored rules.
//!
//! ## Pipeline
//!
//! 1. Candidate rules: the queried domain's rules, then `general` rules,
//!    de-duplicated by id, confidence ≥ 0.6
//! 2. Each candidate's predicate is evaluated against the material; a rule
//!    whose property the material lacks is skipped
//! 3. Component scores are confidence-weighted match ratios over subsets
//!    (neutral 0.5 when a subset is empty)
//! 4. The overall score combines the components with per-domain weights
//!
//! Only `range`, `>`, `<` and `=` are evaluated. Every other predicate,
//! including `>=` and `<=`, counts as violated with an "unsupported" reason.

use crate::primitives::{
    DOMAIN_WEIGHT, EQUALITY_SLACK, MAX_LISTED_RULES, MIN_CONFIDENCE, NEUTRAL_SCORE,
    REASONING_EXCERPT_CHARS,
};
use crate::store::{RuleFilter, RuleStore};
use crate::types::{Domain, Operator, RuleId, RuleType, round3};
use crate::{MateriaError, Rule};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// WEIGHTS
// =============================================================================

/// Per-domain weights of the three weighted components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainWeights {
    pub stability: f64,
    pub band_gap: f64,
    pub formation_energy: f64,
}

impl DomainWeights {
    const DEFAULT_STABILITY: f64 = 0.3;
    const DEFAULT_BAND_GAP: f64 = 0.2;
    const DEFAULT_FORMATION_ENERGY: f64 = 0.2;

    fn entry(stability: Option<f64>, band_gap: Option<f64>, formation: Option<f64>) -> Self {
        Self {
            stability: stability.unwrap_or(Self::DEFAULT_STABILITY),
            band_gap: band_gap.unwrap_or(Self::DEFAULT_BAND_GAP),
            formation_energy: formation.unwrap_or(Self::DEFAULT_FORMATION_ENERGY),
        }
    }

    /// Weights for a domain name; unrecognized domains use `general`.
    #[must_use]
    pub fn for_domain(domain: &str) -> Self {
        match Domain::parse(domain) {
            Some(Domain::Photovoltaics) => Self::entry(Some(0.3), Some(0.4), Some(0.2)),
            Some(Domain::Thermoelectric) => Self::entry(Some(0.25), Some(0.3), Some(0.2)),
            Some(Domain::Battery) => Self::entry(Some(0.35), None, Some(0.3)),
            Some(Domain::Optoelectronics) => Self::entry(Some(0.3), Some(0.5), Some(0.2)),
            Some(Domain::Structural) => Self::entry(Some(0.3), None, Some(0.2)),
            _ => Self::entry(Some(0.4), Some(0.1), Some(0.3)),
        }
    }
}

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Outcome of evaluating one rule against a material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Matched(String),
    Violated(String),
    /// The material lacks the rule's property.
    Skipped(String),
}

/// Evaluation reason attached to a listed rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_id: Option<RuleId>,
    pub matched: bool,
    /// Contribution to the match: the rule's confidence when matched, else 0.
    pub score: f64,
    pub reason: String,
}

/// Result of scoring one material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub domain: String,
    pub overall_score: f64,
    pub domain_score: f64,
    pub stability_score: f64,
    pub property_score: f64,
    pub synthesis_score: f64,
    /// First matched rules, in candidate order.
    pub matched_rules: Vec<Rule>,
    /// First violated rules, in candidate order.
    pub violated_rules: Vec<Rule>,
    /// Reasons for the listed rules (matched first, then violated).
    pub evaluations: Vec<RuleEvaluation>,
    pub reasoning: String,
    pub total_rules_evaluated: usize,
    pub rules_matched: usize,
    pub rules_violated: usize,
    pub rules_skipped: usize,
}

// =============================================================================
// PREDICATE EVALUATION
// =============================================================================

/// Evaluate a rule's predicate against a material.
#[must_use]
pub fn evaluate_rule(rule: &Rule, properties: &BTreeMap<String, f64>) -> Evaluation {
    let name = &rule.property;
    let Some(&value) = properties.get(name) else {
        return Evaluation::Skipped(format!("property {} not available", name));
    };

    match (rule.operator, rule.threshold_value, rule.range_start, rule.range_end) {
        (Some(Operator::Range), _, Some(start), Some(end)) => {
            if (start..=end).contains(&value) {
                Evaluation::Matched(format!("{name} = {value} is in range [{start}, {end}]"))
            } else {
                Evaluation::Violated(format!("{name} = {value} is outside range [{start}, {end}]"))
            }
        }
        (Some(Operator::Gt), Some(threshold), _, _) => {
            if value > threshold {
                Evaluation::Matched(format!("{name} = {value} > {threshold}"))
            } else {
                Evaluation::Violated(format!("{name} = {value} <= {threshold} (violated)"))
            }
        }
        (Some(Operator::Lt), Some(threshold), _, _) => {
            if value < threshold {
                Evaluation::Matched(format!("{name} = {value} < {threshold}"))
            } else {
                Evaluation::Violated(format!("{name} = {value} >= {threshold} (violated)"))
            }
        }
        (Some(Operator::Eq), Some(threshold), _, _) => {
            if (value - threshold).abs() <= rule.uncertainty() + EQUALITY_SLACK {
                Evaluation::Matched(format!("{name} = {value} ≈ {threshold}"))
            } else {
                Evaluation::Violated(format!("{name} = {value} ≠ {threshold}"))
            }
        }
        (operator, ..) => Evaluation::Violated(format!(
            "unsupported operator or missing threshold: {}",
            operator.map_or("none", |op| op.as_str())
        )),
    }
}

// =============================================================================
// SCORING
// =============================================================================

/// Confidence-weighted share of matched rules in a subset.
fn weighted_ratio<'r>(subset: impl Iterator<Item = (&'r Rule, bool)>) -> Option<f64> {
    let mut total = 0.0;
    let mut matched = 0.0;
    for (rule, is_match) in subset {
        total += rule.confidence();
        if is_match {
            matched += rule.confidence();
        }
    }
    (total > 0.0).then(|| matched / total)
}

/// Heuristic stability from formation energy and energy above hull.
fn stability_heuristic(properties: &BTreeMap<String, f64>) -> f64 {
    let mut score = NEUTRAL_SCORE;
    if let Some(&fe) = properties.get("formation_energy") {
        if fe < -1.0 {
            score += 0.2;
        } else if fe < 0.0 {
            score += 0.1;
        }
    }
    if let Some(&ehull) = properties.get("energy_above_hull") {
        if ehull < 0.05 {
            score += 0.2;
        } else if ehull < 0.1 {
            score += 0.1;
        }
    }
    score.min(1.0)
}

fn excerpt(text: &str) -> String {
    text.chars().take(REASONING_EXCERPT_CHARS).collect()
}

fn band(overall: f64) -> &'static str {
    if overall >= 0.8 {
        "High score: Material shows strong alignment with domain-specific rules."
    } else if overall >= 0.6 {
        "Moderate score: Material meets most criteria but has some limitations."
    } else if overall >= 0.4 {
        "Low score: Material violates several important rules."
    } else {
        "Very low score: Material shows poor alignment with established rules."
    }
}

/// Score a material against an explicit candidate list.
///
/// Pure and deterministic: the same rules, properties and domain always give
/// the same result.
#[must_use]
pub fn score_rules(
    candidates: &[Rule],
    properties: &BTreeMap<String, f64>,
    domain: &str,
) -> ScoreResult {
    let queried = Domain::parse(domain);

    // (rule, matched, reason) for every evaluated rule, in candidate order
    let mut evaluated: Vec<(&Rule, bool, String)> = Vec::new();
    let mut skipped = 0;
    for rule in candidates {
        match evaluate_rule(rule, properties) {
            Evaluation::Matched(reason) => evaluated.push((rule, true, reason)),
            Evaluation::Violated(reason) => evaluated.push((rule, false, reason)),
            Evaluation::Skipped(reason) => {
                tracing::debug!(rule_id = ?rule.rule_id, %reason, "rule skipped");
                skipped += 1;
            }
        }
    }

    let pairs = || evaluated.iter().map(|(rule, is_match, _)| (*rule, *is_match));

    let domain_score = queried
        .and_then(|d| weighted_ratio(pairs().filter(|(r, _)| r.has_domain(d))))
        .unwrap_or(NEUTRAL_SCORE);
    let stability_score = weighted_ratio(pairs().filter(|(r, _)| r.rule_type == RuleType::Stability))
        .unwrap_or_else(|| stability_heuristic(properties));
    let property_score = weighted_ratio(pairs().filter(|(r, _)| {
        matches!(r.rule_type, RuleType::BandGap | RuleType::Mechanical)
    }))
    .unwrap_or(NEUTRAL_SCORE);
    let synthesis_score = weighted_ratio(pairs().filter(|(r, _)| r.rule_type == RuleType::Synthesis))
        .unwrap_or(NEUTRAL_SCORE);

    let weights = DomainWeights::for_domain(domain);
    let overall = (stability_score * weights.stability
        + property_score * weights.band_gap
        + synthesis_score * weights.formation_energy
        + domain_score * DOMAIN_WEIGHT)
        .clamp(0.0, 1.0);

    let matched: Vec<&(&Rule, bool, String)> = evaluated.iter().filter(|e| e.1).collect();
    let violated: Vec<&(&Rule, bool, String)> = evaluated.iter().filter(|e| !e.1).collect();

    let mut reasoning = vec![format!("Overall score: {:.2} (domain: {})", overall, domain)];
    if let Some((rule, ..)) = matched.first() {
        reasoning.push(format!(
            "Matched {} rules, including: {}",
            matched.len(),
            excerpt(&rule.rule_text)
        ));
    }
    if let Some((rule, ..)) = violated.first() {
        reasoning.push(format!(
            "Violated {} rules, including: {}",
            violated.len(),
            excerpt(&rule.rule_text)
        ));
    }
    reasoning.push(band(overall).to_string());

    let listed_matched = &matched[..matched.len().min(MAX_LISTED_RULES)];
    let listed_violated = &violated[..violated.len().min(MAX_LISTED_RULES)];
    let evaluations = listed_matched
        .iter()
        .chain(listed_violated)
        .map(|(rule, is_match, reason)| RuleEvaluation {
            rule_id: rule.rule_id.clone(),
            matched: *is_match,
            score: if *is_match { rule.confidence() } else { 0.0 },
            reason: reason.clone(),
        })
        .collect();

    ScoreResult {
        domain: domain.to_string(),
        overall_score: round3(overall),
        domain_score: round3(domain_score),
        stability_score: round3(stability_score),
        property_score: round3(property_score),
        synthesis_score: round3(synthesis_score),
        matched_rules: listed_matched.iter().map(|(r, ..)| (*r).clone()).collect(),
        violated_rules: listed_violated.iter().map(|(r, ..)| (*r).clone()).collect(),
        evaluations,
        reasoning: reasoning.join(" | "),
        total_rules_evaluated: candidates.len(),
        rules_matched: matched.len(),
        rules_violated: violated.len(),
        rules_skipped: skipped,
    }
}

/// Scores materials through a rule store.
pub struct ScoringEngine<'a> {
    store: &'a RuleStore,
}

impl<'a> ScoringEngine<'a> {
    #[must_use]
    pub fn new(store: &'a RuleStore) -> Self {
        Self { store }
    }

    /// The queried domain's rules followed by `general` rules, de-duplicated
    /// by id, at or above the confidence floor.
    pub fn candidate_rules(&self, domain: &str) -> Result<Vec<Rule>, MateriaError> {
        let mut rules = Vec::new();
        if let Some(d) = Domain::parse(domain).filter(|d| *d != Domain::General) {
            rules = self
                .store
                .load(&RuleFilter::new().domain(d).min_confidence(MIN_CONFIDENCE))?;
        }
        rules.extend(
            self.store
                .load(&RuleFilter::new().domain(Domain::General).min_confidence(MIN_CONFIDENCE))?,
        );

        let mut seen: BTreeSet<RuleId> = BTreeSet::new();
        rules.retain(|rule| match rule.id() {
            Some(id) => seen.insert(id.clone()),
            None => false,
        });
        Ok(rules)
    }

    /// Score a material for a target domain.
    pub fn score_material(
        &self,
        properties: &BTreeMap<String, f64>,
        domain: &str,
    ) -> Result<ScoreResult, MateriaError> {
        let candidates = self.candidate_rules(domain)?;
        let result = score_rules(&candidates, properties, domain);
        tracing::debug!(
            domain,
            overall = result.overall_score,
            matched = result.rules_matched,
            violated = result.rules_violated,
            skipped = result.rules_skipped,
            "material scored"
        );
        Ok(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{Normalizer, RuleCandidate};

    fn stored(seq: u64, candidate: RuleCandidate) -> Rule {
        let mut rule = Normalizer::normalize(candidate);
        rule.rule_id = Some(RuleId::from_sequence(seq));
        rule
    }

    fn material(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn pv_band_gap() -> Rule {
        stored(
            1,
            RuleCandidate::new("Band gap between 1.1 and 1.7 eV for solar absorbers")
                .with_property("band_gap")
                .with_rule_type("band_gap")
                .with_range(1.1, 1.7)
                .with_domain("photovoltaics")
                .with_confidence(0.85),
        )
    }

    #[test]
    fn range_is_inclusive() {
        let rule = pv_band_gap();
        assert!(matches!(
            evaluate_rule(&rule, &material(&[("band_gap", 1.1)])),
            Evaluation::Matched(_)
        ));
        assert!(matches!(
            evaluate_rule(&rule, &material(&[("band_gap", 1.7)])),
            Evaluation::Matched(_)
        ));
        assert!(matches!(
            evaluate_rule(&rule, &material(&[("band_gap", 1.71)])),
            Evaluation::Violated(_)
        ));
    }

    #[test]
    fn strict_comparisons() {
        let gt = stored(
            1,
            RuleCandidate::new("Bulk modulus above 100 GPa")
                .with_property("bulk_modulus")
                .with_threshold(">", 100.0)
                .with_confidence(0.8),
        );
        assert!(matches!(
            evaluate_rule(&gt, &material(&[("bulk_modulus", 100.0)])),
            Evaluation::Violated(_)
        ));
        assert!(matches!(
            evaluate_rule(&gt, &material(&[("bulk_modulus", 100.5)])),
            Evaluation::Matched(_)
        ));
    }

    #[test]
    fn equality_uses_uncertainty_slack() {
        // uncertainty 0.2, so tolerance 0.3
        let eq = stored(
            1,
            RuleCandidate::new("Band gap of 1.4 eV")
                .with_property("band_gap")
                .with_threshold("=", 1.4)
                .with_confidence(0.8),
        );
        assert!(matches!(
            evaluate_rule(&eq, &material(&[("band_gap", 1.65)])),
            Evaluation::Matched(_)
        ));
        assert!(matches!(
            evaluate_rule(&eq, &material(&[("band_gap", 1.75)])),
            Evaluation::Violated(_)
        ));
    }

    #[test]
    fn inclusive_operators_unsupported() {
        let ge = stored(
            1,
            RuleCandidate::new("Band gap at least 1.0 eV")
                .with_property("band_gap")
                .with_threshold(">=", 1.0)
                .with_confidence(0.8),
        );
        assert!(matches!(
            evaluate_rule(&ge, &material(&[("band_gap", 2.0)])),
            Evaluation::Violated(ref reason) if reason.contains("unsupported")
        ));
    }

    #[test]
    fn missing_property_skipped() {
        let rule = pv_band_gap();
        assert!(matches!(
            evaluate_rule(&rule, &material(&[("formation_energy", -1.0)])),
            Evaluation::Skipped(_)
        ));

        let result = score_rules(&[rule], &material(&[("formation_energy", -1.0)]), "photovoltaics");
        assert_eq!(result.rules_skipped, 1);
        assert!(result.matched_rules.is_empty() && result.violated_rules.is_empty());
        assert_eq!(result.domain_score, 0.5);
    }

    #[test]
    fn stability_heuristic_bands() {
        assert_eq!(stability_heuristic(&material(&[])), 0.5);
        assert_eq!(
            round3(stability_heuristic(&material(&[
                ("formation_energy", -1.5),
                ("energy_above_hull", 0.0)
            ]))),
            0.9
        );
        assert_eq!(
            round3(stability_heuristic(&material(&[
                ("formation_energy", -0.5),
                ("energy_above_hull", 0.07)
            ]))),
            0.7
        );
    }

    #[test]
    fn unknown_domain_uses_general_weights() {
        assert_eq!(DomainWeights::for_domain("catalyst"), DomainWeights::for_domain("general"));
        assert_eq!(DomainWeights::for_domain("semiconductors"), DomainWeights::for_domain("general"));
        assert_eq!(DomainWeights::for_domain("battery").band_gap, 0.2);
    }

    #[test]
    fn photovoltaic_example() {
        let result = score_rules(
            &[pv_band_gap()],
            &material(&[("band_gap", 1.4), ("formation_energy", -1.2), ("energy_above_hull", 0.02)]),
            "photovoltaics",
        );

        assert_eq!(result.rules_matched, 1);
        assert_eq!(result.domain_score, 1.0);
        assert_eq!(result.property_score, 1.0);
        assert_eq!(result.stability_score, 0.9);
        assert_eq!(result.synthesis_score, 0.5);
        // 0.9·0.3 + 1.0·0.4 + 0.5·0.2 + 1.0·0.3 = 1.07, clamped
        assert_eq!(result.overall_score, 1.0);
        assert!(result.reasoning.starts_with("Overall score: 1.00 (domain: photovoltaics)"));
        assert!(result.reasoning.contains("Matched 1 rules, including: Band gap between"));
        assert!(result.reasoning.ends_with("High score: Material shows strong alignment with domain-specific rules."));
        assert_eq!(result.evaluations.len(), 1);
        assert_eq!(result.evaluations[0].score, 0.85);
    }

    #[test]
    fn lists_capped_at_ten() {
        let rules: Vec<Rule> = (1..=15)
            .map(|i| {
                stored(
                    i,
                    RuleCandidate::new(format!("Band gap above {i} eV"))
                        .with_property("band_gap")
                        .with_threshold(">", i as f64)
                        .with_confidence(0.8),
                )
            })
            .collect();
        let result = score_rules(&rules, &material(&[("band_gap", 0.5)]), "general");

        assert_eq!(result.rules_violated, 15);
        assert_eq!(result.violated_rules.len(), 10);
        assert_eq!(result.violated_rules[0].id(), Some(&RuleId::from_sequence(1)));
        assert_eq!(result.total_rules_evaluated, 15);
    }

    #[test]
    fn engine_merges_domain_and_general_rules() {
        let mut store = RuleStore::in_memory();
        store
            .save(
                vec![
                    RuleCandidate::new("Band gap between 1.1 and 1.7 eV")
                        .with_property("band_gap")
                        .with_range(1.1, 1.7)
                        .with_domains(&["photovoltaics", "general"])
                        .with_confidence(0.85),
                    RuleCandidate::new("Formation energy below 0 eV/atom")
                        .with_property("formation_energy")
                        .with_threshold("<", 0.0)
                        .with_confidence(0.9),
                    RuleCandidate::new("Bulk modulus above 100 GPa")
                        .with_property("bulk_modulus")
                        .with_threshold(">", 100.0)
                        .with_domain("structural")
                        .with_confidence(0.9),
                ],
                None,
            )
            .expect("save");

        let engine = ScoringEngine::new(&store);
        let candidates = engine.candidate_rules("photovoltaics").expect("candidates");
        let ids: Vec<_> = candidates.iter().filter_map(|r| r.id().cloned()).collect();
        assert_eq!(ids, vec![RuleId::from_sequence(1), RuleId::from_sequence(2)]);

        let properties = material(&[("band_gap", 1.4), ("formation_energy", -0.5)]);
        let first = engine.score_material(&properties, "photovoltaics").expect("score");
        let second = engine.score_material(&properties, "photovoltaics").expect("score");
        assert_eq!(first, second);
        assert_eq!(first.rules_matched, 2);
    }
}
