//! # Normalizer Module
//!
//! Coerces tolerant incoming records into the canonical `Rule` shape.
//!
//! - Pure: never consults persisted state
//! - Never forges a `rule_id` (an existing one is kept)
//! - Idempotent on records that are already canonical
//! - Applied to persisted records on load, so legacy documents upgrade in place

use crate::primitives::{
    MAX_BOOST, PHYSICS_KEYWORDS, UNCERTAINTY_TOLERANCE, VALIDATED_EVIDENCE_COUNT,
};
use crate::types::{
    Category, Domain, EvidenceStrength, Operator, Rule, RuleId, RuleType, ValidationStatus,
    round3,
};
use crate::MateriaError;
use serde::{Deserialize, Serialize};

// =============================================================================
// TOLERANT INPUT TYPES
// =============================================================================

/// A numeric field that may arrive as a number or as a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberLike {
    Number(f64),
    Text(String),
}

impl NumberLike {
    /// The finite numeric value, if any.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        let v = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

impl From<f64> for NumberLike {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A field that may arrive as a bare string or as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<serde_json::Value>),
    Other(serde_json::Value),
}

impl FieldValue {
    /// Flatten into non-empty strings. Numbers are kept in their textual form.
    #[must_use]
    pub fn into_strings(self) -> Vec<String> {
        let items = match self {
            Self::Text(s) => vec![s],
            Self::List(values) => values.into_iter().filter_map(scalar_to_string).collect(),
            Self::Other(value) => scalar_to_string(value).into_iter().collect(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl From<&[String]> for FieldValue {
    fn from(items: &[String]) -> Self {
        Self::List(items.iter().cloned().map(serde_json::Value::String).collect())
    }
}

fn scalar_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// An incoming rule record with every field optional.
///
/// This is what extraction services and legacy documents hand us; the
/// normalizer turns it into a strict `Rule`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleCandidate {
    pub rule_id: Option<String>,
    pub rule_text: Option<String>,
    pub rule_type: Option<String>,
    pub property: Option<String>,
    pub threshold_value: Option<NumberLike>,
    pub threshold_unit: Option<String>,
    pub operator: Option<String>,
    pub range_start: Option<NumberLike>,
    pub range_end: Option<NumberLike>,
    pub application: Option<String>,
    pub domain: Option<FieldValue>,
    pub category: Option<String>,
    pub evidence_strength: Option<String>,
    pub confidence: Option<NumberLike>,
    pub statistical_confidence: Option<NumberLike>,
    pub uncertainty: Option<NumberLike>,
    pub validation_status: Option<String>,
    pub edge_cases: Option<FieldValue>,
    pub fails_for: Option<FieldValue>,
    pub validated_materials: Option<FieldValue>,
    pub evidence_count: Option<NumberLike>,
    pub source_paper_id: Option<String>,
    pub source_section: Option<String>,
    pub publication_year: Option<NumberLike>,
    pub supported_by_papers: Option<FieldValue>,
    pub cross_validation_boost: Option<NumberLike>,
}

impl RuleCandidate {
    /// Start a candidate from its statement text.
    #[must_use]
    pub fn new(rule_text: impl Into<String>) -> Self {
        Self {
            rule_text: Some(rule_text.into()),
            ..Self::default()
        }
    }

    /// Interpret an arbitrary JSON value as a candidate.
    pub fn from_json(value: serde_json::Value) -> Result<Self, MateriaError> {
        serde_json::from_value(value).map_err(|e| MateriaError::Deserialization(e.to_string()))
    }

    #[must_use]
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    #[must_use]
    pub fn with_rule_type(mut self, rule_type: impl Into<String>) -> Self {
        self.rule_type = Some(rule_type.into());
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.into());
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, operator: &str, value: f64) -> Self {
        self.operator = Some(operator.to_string());
        self.threshold_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_range(mut self, start: f64, end: f64) -> Self {
        self.operator = Some("range".to_string());
        self.range_start = Some(start.into());
        self.range_end = Some(end.into());
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.threshold_unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(FieldValue::Text(domain.into()));
        self
    }

    #[must_use]
    pub fn with_domains(mut self, domains: &[&str]) -> Self {
        self.domain = Some(FieldValue::List(
            domains
                .iter()
                .map(|d| serde_json::Value::String((*d).to_string()))
                .collect(),
        ));
        self
    }

    #[must_use]
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source_paper_id: impl Into<String>) -> Self {
        self.source_paper_id = Some(source_paper_id.into());
        self
    }

    #[must_use]
    pub fn with_evidence_count(mut self, count: u64) -> Self {
        self.evidence_count = Some(NumberLike::Number(count as f64));
        self
    }
}

impl From<&Rule> for RuleCandidate {
    fn from(rule: &Rule) -> Self {
        Self {
            rule_id: rule.rule_id.as_ref().map(|id| id.as_str().to_string()),
            rule_text: Some(rule.rule_text.clone()),
            rule_type: Some(rule.rule_type.as_str().to_string()),
            property: Some(rule.property.clone()),
            threshold_value: rule.threshold_value.map(NumberLike::from),
            threshold_unit: Some(rule.threshold_unit.clone()),
            operator: rule.operator.map(|op| op.as_str().to_string()),
            range_start: rule.range_start.map(NumberLike::from),
            range_end: rule.range_end.map(NumberLike::from),
            application: Some(rule.application.clone()),
            domain: Some(FieldValue::List(
                rule.domain
                    .iter()
                    .map(|d| serde_json::Value::String(d.as_str().to_string()))
                    .collect(),
            )),
            category: Some(rule.category.as_str().to_string()),
            evidence_strength: Some(
                match rule.evidence_strength {
                    EvidenceStrength::Strong => "strong",
                    EvidenceStrength::Medium => "medium",
                    EvidenceStrength::Weak => "weak",
                }
                .to_string(),
            ),
            confidence: Some(rule.confidence.into()),
            statistical_confidence: Some(rule.statistical_confidence.into()),
            uncertainty: Some(rule.uncertainty.into()),
            validation_status: Some(
                match rule.validation_status {
                    ValidationStatus::PhysicsBased => "physics_based",
                    ValidationStatus::Validated => "validated",
                    ValidationStatus::Extracted => "extracted",
                }
                .to_string(),
            ),
            edge_cases: Some(FieldValue::from(rule.edge_cases.as_slice())),
            fails_for: Some(FieldValue::from(rule.fails_for.as_slice())),
            validated_materials: Some(FieldValue::from(rule.validated_materials.as_slice())),
            evidence_count: rule.evidence_count.map(|n| NumberLike::Number(n as f64)),
            source_paper_id: rule.source_paper_id.clone(),
            source_section: rule.source_section.clone(),
            publication_year: rule
                .publication_year
                .map(|y| NumberLike::Number(f64::from(y))),
            supported_by_papers: Some(FieldValue::from(rule.supported_by_papers.as_slice())),
            cross_validation_boost: Some(rule.cross_validation_boost.into()),
        }
    }
}

// =============================================================================
// NORMALIZER
// =============================================================================

/// Produces canonical rules from tolerant candidates.
pub struct Normalizer;

impl Normalizer {
    /// Normalize a candidate into a canonical `Rule`.
    ///
    /// Never fails: every missing or malformed field has a default. Whether
    /// the result is acceptable is the validator's decision.
    #[must_use]
    pub fn normalize(candidate: RuleCandidate) -> Rule {
        let rule_text = candidate.rule_text.unwrap_or_default();
        let property = candidate.property.map(|p| p.trim().to_string()).unwrap_or_default();

        // statistical_confidence wins when both are present
        let confidence = candidate
            .statistical_confidence
            .as_ref()
            .and_then(NumberLike::value)
            .or_else(|| candidate.confidence.as_ref().and_then(NumberLike::value))
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        let rule_type = candidate
            .rule_type
            .as_deref()
            .and_then(RuleType::parse)
            .or_else(|| {
                candidate
                    .category
                    .as_deref()
                    .and_then(Category::parse)
                    .map(|c| c.implied_rule_type())
            })
            .unwrap_or(RuleType::Stability);

        let domain = Self::normalize_domains(candidate.domain);

        let evidence_strength = candidate
            .evidence_strength
            .as_deref()
            .and_then(EvidenceStrength::parse)
            .unwrap_or_else(|| EvidenceStrength::from_confidence(confidence));

        let uncertainty = candidate
            .uncertainty
            .as_ref()
            .and_then(NumberLike::value)
            .filter(|u| {
                (0.0..=1.0).contains(u) && (u + confidence - 1.0).abs() <= UNCERTAINTY_TOLERANCE
            })
            .unwrap_or_else(|| round3(1.0 - confidence));

        let (operator, threshold_value, range_start, range_end) = Self::repair_predicate(
            candidate.operator.as_deref(),
            candidate.threshold_value.as_ref().and_then(NumberLike::value),
            candidate.range_start.as_ref().and_then(NumberLike::value),
            candidate.range_end.as_ref().and_then(NumberLike::value),
        );

        let source_paper_id = candidate
            .source_paper_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut supported_by_papers = Vec::new();
        for source in candidate
            .supported_by_papers
            .map(FieldValue::into_strings)
            .unwrap_or_default()
        {
            if !supported_by_papers.contains(&source) {
                supported_by_papers.push(source);
            }
        }
        if supported_by_papers.is_empty() {
            supported_by_papers.push(source_paper_id.clone().unwrap_or_else(|| "unknown".into()));
        }

        let evidence_count = candidate
            .evidence_count
            .as_ref()
            .and_then(NumberLike::value)
            .filter(|n| *n >= 0.0)
            .map(|n| n as u64);

        let validation_status = candidate
            .validation_status
            .as_deref()
            .and_then(ValidationStatus::parse)
            .unwrap_or_else(|| {
                Self::derive_status(
                    rule_type,
                    &rule_text,
                    &property,
                    evidence_count,
                    supported_by_papers.len(),
                )
            });

        let cross_validation_boost = candidate
            .cross_validation_boost
            .as_ref()
            .and_then(NumberLike::value)
            .unwrap_or(0.0)
            .clamp(0.0, MAX_BOOST.min(confidence));

        Rule {
            rule_id: candidate
                .rule_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .map(RuleId::new),
            rule_text,
            rule_type,
            property,
            threshold_value,
            threshold_unit: candidate.threshold_unit.unwrap_or_default(),
            operator,
            range_start,
            range_end,
            application: candidate.application.unwrap_or_default(),
            domain,
            category: rule_type.category(),
            evidence_strength,
            confidence,
            statistical_confidence: confidence,
            uncertainty,
            validation_status,
            edge_cases: candidate.edge_cases.map(FieldValue::into_strings).unwrap_or_default(),
            fails_for: candidate.fails_for.map(FieldValue::into_strings).unwrap_or_default(),
            validated_materials: candidate
                .validated_materials
                .map(FieldValue::into_strings)
                .unwrap_or_default(),
            evidence_count,
            source_paper_id,
            source_section: candidate.source_section.filter(|s| !s.is_empty()),
            publication_year: candidate
                .publication_year
                .as_ref()
                .and_then(NumberLike::value)
                .map(|y| y as i32),
            rule_frequency: supported_by_papers.len() as u32,
            supported_by_papers,
            cross_validation_boost,
        }
    }

    /// Coerce a domain field into a non-empty, duplicate-free tag sequence.
    fn normalize_domains(raw: Option<FieldValue>) -> Vec<Domain> {
        let mut domains = Vec::new();
        for tag in raw.map(FieldValue::into_strings).unwrap_or_default() {
            if let Some(domain) = Domain::parse(&tag)
                && !domains.contains(&domain)
            {
                domains.push(domain);
            }
        }
        if domains.is_empty() {
            domains.push(Domain::General);
        }
        domains
    }

    /// Reconcile operator, threshold and range bounds.
    ///
    /// Bounds without a recognized operator imply `range`; a range rule with
    /// both bounds carries no threshold; a non-range rule carries no bounds.
    fn repair_predicate(
        operator: Option<&str>,
        threshold: Option<f64>,
        start: Option<f64>,
        end: Option<f64>,
    ) -> (Option<Operator>, Option<f64>, Option<f64>, Option<f64>) {
        let operator = operator
            .and_then(Operator::parse)
            .or_else(|| (start.is_some() && end.is_some()).then_some(Operator::Range));

        match operator {
            Some(Operator::Range) => match (start, end) {
                (Some(a), Some(b)) => (operator, None, Some(a.min(b)), Some(a.max(b))),
                _ => (operator, threshold, start, end),
            },
            _ => (operator, threshold, None, None),
        }
    }

    /// The status a rule's own evidence supports.
    pub(crate) fn status_for(rule: &Rule) -> ValidationStatus {
        Self::derive_status(
            rule.rule_type,
            &rule.rule_text,
            &rule.property,
            rule.evidence_count,
            rule.supported_by_papers.len(),
        )
    }

    fn derive_status(
        rule_type: RuleType,
        text: &str,
        property: &str,
        evidence_count: Option<u64>,
        source_count: usize,
    ) -> ValidationStatus {
        let text = text.to_lowercase();
        let property = property.to_lowercase();
        let physics = rule_type == RuleType::ChemicalConstraint
            || PHYSICS_KEYWORDS
                .iter()
                .any(|k| text.contains(k) || property.contains(k));

        if physics {
            ValidationStatus::PhysicsBased
        } else if evidence_count.is_some_and(|n| n > VALIDATED_EVIDENCE_COUNT) || source_count >= 2
        {
            ValidationStatus::Validated
        } else {
            ValidationStatus::Extracted
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
