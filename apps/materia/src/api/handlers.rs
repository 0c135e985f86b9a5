//! # API Endpoint Handlers

use super::{
    AppState,
    types::{
        ApiError, HealthResponse, IngestRequest, IngestResponse, RulesQuery, RulesResponse,
        ScoreRequest, SearchQuery,
    },
};
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use materia_core::{QualityReport, RuleStats, ScoreResult, ScoringEngine};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Store statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<RuleStats>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.stats()?))
}

/// Quality report.
pub async fn report_handler(
    State(state): State<AppState>,
) -> Result<Json<QualityReport>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.quality_report()?))
}

// =============================================================================
// RULES
// =============================================================================

/// Filtered rule listing.
pub async fn rules_handler(
    State(state): State<AppState>,
    Query(query): Query<RulesQuery>,
) -> Result<Json<RulesResponse>, ApiError> {
    let filter = query.to_filter()?;
    let store = state.store.read().await;
    Ok(Json(store.load(&filter)?.into()))
}

/// Keyword search.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<RulesResponse>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.search(&query.q)?.into()))
}

/// Ingest a batch of candidate rules.
pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let (candidates, malformed) = request.candidates();

    let mut store = state.store.write().await;
    let summary = store.save(candidates, request.source.as_ref())?;
    Ok(Json(IngestResponse::from_summary(summary, malformed)))
}

// =============================================================================
// SCORING
// =============================================================================

/// Score a material.
pub async fn score_handler(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResult>, ApiError> {
    if request.properties.values().any(|v| !v.is_finite()) {
        return Err(ApiError::bad_request("property values must be finite"));
    }
    let store = state.store.read().await;
    let result = ScoringEngine::new(&store).score_material(&request.properties, &request.domain)?;
    Ok(Json(result))
}
