//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Core types (`RuleStats`,
//! `QualityReport`, `ScoreResult`, `Rule`) are returned as they are.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use materia_core::{
    Category, Domain, MateriaError, Rejection, Rule, RuleCandidate, RuleFilter, RuleType,
    SaveSummary, SourceMetadata,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// A failed request: status code plus message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<MateriaError> for ApiError {
    fn from(e: MateriaError) -> Self {
        let status = match &e {
            MateriaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MateriaError::Locked(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %e, "request failed");
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                success: false,
                error: self.message,
            }),
        )
            .into_response()
    }
}

// =============================================================================
// RULE LISTING
// =============================================================================

/// Query string of `GET /rules`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesQuery {
    pub category: Option<String>,
    pub property: Option<String>,
    pub domain: Option<String>,
    pub rule_type: Option<String>,
    pub min_confidence: Option<f64>,
}

impl RulesQuery {
    /// Convert to a core filter, rejecting unknown enum names.
    pub fn to_filter(&self) -> Result<RuleFilter, ApiError> {
        let mut filter = RuleFilter::new();
        if let Some(raw) = &self.category {
            filter = filter.category(
                Category::parse(raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown category: {}", raw)))?,
            );
        }
        if let Some(raw) = &self.domain {
            filter = filter.domain(
                Domain::parse(raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown domain: {}", raw)))?,
            );
        }
        if let Some(raw) = &self.rule_type {
            filter = filter.rule_type(
                RuleType::parse(raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown rule type: {}", raw)))?,
            );
        }
        if let Some(property) = &self.property {
            filter = filter.property(property.clone());
        }
        if let Some(min) = self.min_confidence {
            filter = filter.min_confidence(min);
        }
        Ok(filter)
    }
}

/// Query string of `GET /rules/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// A list of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesResponse {
    pub count: usize,
    pub rules: Vec<Rule>,
}

impl From<Vec<Rule>> for RulesResponse {
    fn from(rules: Vec<Rule>) -> Self {
        Self {
            count: rules.len(),
            rules,
        }
    }
}

// =============================================================================
// INGEST REQUEST/RESPONSE
// =============================================================================

/// A batch of candidate records with optional source metadata.
///
/// Also the wrapped form of a CLI ingest file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub source: Option<SourceMetadata>,
    pub rules: Vec<serde_json::Value>,
}

impl IngestRequest {
    /// Decode the raw records; non-object records are counted and dropped.
    pub fn candidates(&self) -> (Vec<RuleCandidate>, usize) {
        let mut malformed = 0;
        let candidates = self
            .rules
            .iter()
            .filter_map(|value| match RuleCandidate::from_json(value.clone()) {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed candidate");
                    malformed += 1;
                    None
                }
            })
            .collect();
        (candidates, malformed)
    }
}

/// Outcome of an ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub inserted: usize,
    pub duplicates: usize,
    pub flagged: usize,
    pub malformed: usize,
    pub rejected: Vec<Rejection>,
}

impl IngestResponse {
    pub fn from_summary(summary: SaveSummary, malformed: usize) -> Self {
        Self {
            success: true,
            inserted: summary.inserted,
            duplicates: summary.duplicates,
            flagged: summary.flagged,
            malformed,
            rejected: summary.rejected,
        }
    }
}

// =============================================================================
// SCORE REQUEST
// =============================================================================

/// Material to score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub properties: BTreeMap<String, f64>,
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    Domain::General.as_str().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
