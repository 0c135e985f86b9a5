//! # Index Module
//!
//! Secondary lookup structures over the full rule set.
//!
//! The index is derived and disposable: it is rebuilt from scratch after every
//! batch and can always be regenerated from the rules alone.

use crate::primitives::{MAX_KEYWORDS_PER_RULE, MIN_KEYWORD_LENGTH, STOP_WORDS};
use crate::types::RuleId;
use crate::Rule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key → ordered, duplicate-free rule ids.
pub type Postings = BTreeMap<String, Vec<RuleId>>;

/// The six secondary mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleIndex {
    pub by_property: Postings,
    pub by_domain: Postings,
    pub by_application: Postings,
    pub by_rule_type: Postings,
    pub by_category: Postings,
    pub by_keyword: Postings,
}

impl RuleIndex {
    /// Rebuild every mapping from the rule set. Rules without an id are skipped.
    #[must_use]
    pub fn build(rules: &[Rule]) -> Self {
        let mut index = Self::default();

        for rule in rules {
            let Some(id) = rule.id() else {
                continue;
            };

            if !rule.property.is_empty() {
                post(&mut index.by_property, &rule.property, id);
            }
            for domain in &rule.domain {
                post(&mut index.by_domain, domain.as_str(), id);
            }
            if !rule.application.is_empty() {
                post(&mut index.by_application, &rule.application, id);
            }
            post(&mut index.by_rule_type, rule.rule_type.as_str(), id);
            post(&mut index.by_category, rule.category.as_str(), id);
            for keyword in keywords(&rule.rule_text) {
                post(&mut index.by_keyword, &keyword, id);
            }
        }

        index
    }

    /// Rule ids whose text contains `keyword` as an indexed word.
    #[must_use]
    pub fn keyword_hits(&self, keyword: &str) -> &[RuleId] {
        self.by_keyword
            .get(&keyword.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn post(postings: &mut Postings, key: &str, id: &RuleId) {
    let ids = postings.entry(key.to_string()).or_default();
    if !ids.contains(id) {
        ids.push(id.clone());
    }
}

/// Indexable keywords of a rule text, in text order.
///
/// Lower-cased whitespace tokens, minus stop words and short words,
/// de-duplicated, at most `MAX_KEYWORDS_PER_RULE`.
#[must_use]
pub fn keywords(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in text.to_lowercase().split_whitespace() {
        if out.len() == MAX_KEYWORDS_PER_RULE {
            break;
        }
        if word.chars().count() <= MIN_KEYWORD_LENGTH || STOP_WORDS.contains(&word) {
            continue;
        }
        if !out.iter().any(|w| w == word) {
            out.push(word.to_string());
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
