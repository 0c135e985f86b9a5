//! # Validator Module
//!
//! Quality gate between normalization and storage.
//!
//! - Reject rules below the confidence floor
//! - Reject rules with nothing to say (no property and no text)
//! - Reject rules whose text carries no number
//! - Accept-but-flag rules with high uncertainty
//!
//! Rejection is a verdict, not an error: callers count it and move on.

use crate::Rule;
use crate::primitives::{HIGH_UNCERTAINTY, MIN_CONFIDENCE};

/// Outcome of validating one normalized rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Accepted, but the uncertainty is above the flagging threshold.
    Flagged,
    Rejected(String),
}

impl Verdict {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Stateless rule validator.
pub struct Validator;

impl Validator {
    /// Judge a normalized rule.
    #[must_use]
    pub fn check(rule: &Rule) -> Verdict {
        if rule.confidence() < MIN_CONFIDENCE {
            return Verdict::Rejected(format!(
                "confidence {:.2} below minimum {:.2}",
                rule.confidence(),
                MIN_CONFIDENCE
            ));
        }

        if rule.property.trim().is_empty() && rule.rule_text.trim().is_empty() {
            return Verdict::Rejected("missing property and rule text".to_string());
        }

        if !rule.rule_text.chars().any(|c| c.is_ascii_digit()) {
            return Verdict::Rejected("rule text contains no numeric value".to_string());
        }

        if rule.uncertainty() > HIGH_UNCERTAINTY {
            tracing::warn!(
                text = %excerpt(&rule.rule_text),
                uncertainty = rule.uncertainty(),
                "accepting rule with high uncertainty"
            );
            return Verdict::Flagged;
        }

        Verdict::Accepted
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(60).collect()
}

// =============================================================================
// TESTS
// =============================================================================
