//! # Core Type Definitions
//!
//! This module contains all core types for the Materia rule store:
//! - Rule identifiers (`RuleId`)
//! - Closed vocabularies (`RuleType`, `Operator`, `Domain`, `Category`,
//!   `EvidenceStrength`, `ValidationStatus`)
//! - The canonical `Rule` record
//! - Error types (`MateriaError`)
//!
//! ## Determinism Guarantees
//!
//! All keyed types implement `Ord` so they can live in `BTreeMap`/`BTreeSet`.
//! Every vocabulary has exactly one canonical spelling on the wire.

mod rule;

pub use rule::Rule;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// RULE IDENTIFIER
// =============================================================================

/// Stable identifier of a stored rule: `rule_` + 6-digit zero-padded sequence.
///
/// Assigned by the store at first successful insertion and never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    const PREFIX: &'static str = "rule_";

    /// Build the identifier for a sequence number.
    #[must_use]
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{}{:06}", Self::PREFIX, sequence))
    }

    /// Wrap an identifier read from a persisted record.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The sequence number, if the identifier has the canonical shape.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix(Self::PREFIX)?.parse().ok()
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RULE TYPE
// =============================================================================

/// The kind of constraint a rule expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    ChemicalConstraint,
    Stability,
    BandGap,
    Mechanical,
    Synthesis,
    PhaseStability,
}

impl RuleType {
    /// Parse the canonical snake_case spelling.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chemical_constraint" => Some(Self::ChemicalConstraint),
            "stability" => Some(Self::Stability),
            "band_gap" => Some(Self::BandGap),
            "mechanical" => Some(Self::Mechanical),
            "synthesis" => Some(Self::Synthesis),
            "phase_stability" => Some(Self::PhaseStability),
            _ => None,
        }
    }

    /// Canonical spelling, used as index and statistics key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChemicalConstraint => "chemical_constraint",
            Self::Stability => "stability",
            Self::BandGap => "band_gap",
            Self::Mechanical => "mechanical",
            Self::Synthesis => "synthesis",
            Self::PhaseStability => "phase_stability",
        }
    }

    /// Legacy category this rule type maps onto.
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::ChemicalConstraint | Self::Stability | Self::PhaseStability => {
                Category::Stability
            }
            Self::BandGap | Self::Mechanical => Category::PropertyApplication,
            Self::Synthesis => Category::Synthesis,
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CATEGORY (legacy classification)
// =============================================================================

/// Legacy classification kept for records written before `rule_type` existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Stability,
    PropertyApplication,
    Synthesis,
    MaterialProperty,
}

impl Category {
    /// Parse the canonical snake_case spelling.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stability" => Some(Self::Stability),
            "property_application" => Some(Self::PropertyApplication),
            "synthesis" => Some(Self::Synthesis),
            "material_property" => Some(Self::MaterialProperty),
            _ => None,
        }
    }

    /// Canonical spelling, used as index key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stability => "stability",
            Self::PropertyApplication => "property_application",
            Self::Synthesis => "synthesis",
            Self::MaterialProperty => "material_property",
        }
    }

    /// Rule type assumed for a legacy record that only carries a category.
    #[must_use]
    pub fn implied_rule_type(&self) -> RuleType {
        match self {
            Self::Stability | Self::MaterialProperty => RuleType::Stability,
            Self::PropertyApplication => RuleType::BandGap,
            Self::Synthesis => RuleType::Synthesis,
        }
    }
}

// =============================================================================
// OPERATOR
// =============================================================================

/// Comparison operator of a rule's predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "range", alias = "in_range")]
    Range,
}

impl Operator {
    /// Parse an operator symbol. `in_range` is the legacy spelling of `range`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "=" | "==" => Some(Self::Eq),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" | "≥" => Some(Self::Ge),
            "<=" | "≤" => Some(Self::Le),
            "range" | "in_range" => Some(Self::Range),
            _ => None,
        }
    }

    /// Canonical symbol.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Range => "range",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// DOMAIN
// =============================================================================

/// Application area a rule is relevant to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    General,
    Photovoltaics,
    Thermoelectric,
    Battery,
    Magnet,
    Catalyst,
    Optoelectronics,
    Structural,
}

impl Domain {
    /// The full vocabulary, in canonical order.
    pub const ALL: [Domain; 8] = [
        Self::General,
        Self::Photovoltaics,
        Self::Thermoelectric,
        Self::Battery,
        Self::Magnet,
        Self::Catalyst,
        Self::Optoelectronics,
        Self::Structural,
    ];

    /// Parse a domain tag (case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| d.as_str() == lowered)
    }

    /// Canonical spelling, used as index and statistics key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Photovoltaics => "photovoltaics",
            Self::Thermoelectric => "thermoelectric",
            Self::Battery => "battery",
            Self::Magnet => "magnet",
            Self::Catalyst => "catalyst",
            Self::Optoelectronics => "optoelectronics",
            Self::Structural => "structural",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// EVIDENCE STRENGTH
// =============================================================================

/// Coarse qualitative confidence band, distinct from the numeric confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStrength {
    Strong,
    #[serde(alias = "moderate")]
    Medium,
    Weak,
}

impl EvidenceStrength {
    /// Parse a strength label; `moderate` is the legacy spelling of `medium`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strong" => Some(Self::Strong),
            "medium" | "moderate" => Some(Self::Medium),
            "weak" => Some(Self::Weak),
            _ => None,
        }
    }

    /// Band a numeric confidence.
    #[must_use]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.85 {
            Self::Strong
        } else if confidence >= 0.65 {
            Self::Medium
        } else {
            Self::Weak
        }
    }
}

// =============================================================================
// VALIDATION STATUS
// =============================================================================

/// Provenance classification of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    PhysicsBased,
    Validated,
    Extracted,
}

impl ValidationStatus {
    /// Parse a status label.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "physics_based" => Some(Self::PhysicsBased),
            "validated" => Some(Self::Validated),
            "extracted" => Some(Self::Extracted),
            _ => None,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Materia system.
///
/// - Rejected candidates and unsupported predicates are NOT errors; they are
///   reported in batch summaries and score results.
/// - Only an inability to read or write the persisted state surfaces here.
#[derive(Debug, Error)]
pub enum MateriaError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The embedded database reported an error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Another writer holds the store lock.
    #[error("Rule store is locked by another writer: {0}")]
    Locked(PathBuf),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller-supplied input could not be interpreted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Round to three decimal places, the precision confidences are kept at.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_id_zero_padded() {
        let id = RuleId::from_sequence(42);
        assert_eq!(id.as_str(), "rule_000042");
        assert_eq!(id.sequence(), Some(42));
    }

    #[test]
    fn rule_id_foreign_shape_has_no_sequence() {
        assert_eq!(RuleId::new("legacy-7").sequence(), None);
    }

    #[test]
    fn rule_type_category_mapping() {
        assert_eq!(RuleType::ChemicalConstraint.category(), Category::Stability);
        assert_eq!(RuleType::PhaseStability.category(), Category::Stability);
        assert_eq!(RuleType::BandGap.category(), Category::PropertyApplication);
        assert_eq!(RuleType::Mechanical.category(), Category::PropertyApplication);
        assert_eq!(RuleType::Synthesis.category(), Category::Synthesis);
    }

    #[test]
    fn legacy_in_range_operator() {
        assert_eq!(Operator::parse("in_range"), Some(Operator::Range));
        let parsed: Operator = serde_json::from_str("\"in_range\"").expect("parse");
        assert_eq!(parsed, Operator::Range);
        assert_eq!(
            serde_json::to_string(&Operator::Range).expect("serialize"),
            "\"range\""
        );
    }

    #[test]
    fn domain_parse_is_case_insensitive() {
        assert_eq!(Domain::parse("Photovoltaics"), Some(Domain::Photovoltaics));
        assert_eq!(Domain::parse("semiconductors"), None);
    }

    #[test]
    fn evidence_strength_bands() {
        assert_eq!(EvidenceStrength::from_confidence(0.85), EvidenceStrength::Strong);
        assert_eq!(EvidenceStrength::from_confidence(0.65), EvidenceStrength::Medium);
        assert_eq!(EvidenceStrength::from_confidence(0.64), EvidenceStrength::Weak);
        assert_eq!(EvidenceStrength::parse("moderate"), Some(EvidenceStrength::Medium));
    }

    #[test]
    fn round3_behaviour() {
        assert_eq!(round3(0.750_4), 0.75);
        assert_eq!(round3(0.770_000_000_1), 0.77);
    }
}
