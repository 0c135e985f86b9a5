//! # Materia HTTP API
//!
//! REST API over a shared `RuleStore`, served with axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /stats` - Store statistics
//! - `GET /report` - Quality report
//! - `GET /rules` - Filtered listing (`category`, `property`, `domain`,
//!   `rule_type`, `min_confidence`)
//! - `GET /rules/search?q=` - Keyword search
//! - `POST /rules` - Ingest a batch of candidates
//! - `POST /score` - Score a material
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `MATERIA_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `MATERIA_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod types;

pub use auth::{API_KEY_ENV, get_api_key_from_env};
pub use handlers::{
    health_handler, ingest_handler, report_handler, rules_handler, score_handler, search_handler,
    stats_handler,
};
pub use types::{
    ApiError, ErrorResponse, HealthResponse, IngestRequest, IngestResponse, RulesQuery,
    RulesResponse, ScoreRequest, SearchQuery,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use materia_core::{MateriaError, RuleStore, primitives::MAX_REQUEST_BODY_BYTES};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Environment variable holding the allowed CORS origins.
pub const CORS_ORIGINS_ENV: &str = "MATERIA_CORS_ORIGINS";

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
///
/// Reads share the lock; ingestion takes it exclusively, so the store's
/// read-compute-write cycle never interleaves within one process.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<RuleStore>>,
}

impl AppState {
    #[must_use]
    pub fn new(store: RuleStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// CORS layer from `MATERIA_CORS_ORIGINS`.
///
/// `*` allows every origin, a comma-separated list allows those origins, and
/// an unset or unusable value falls back to localhost only.
fn build_cors_layer() -> CorsLayer {
    match std::env::var(CORS_ORIGINS_ENV).ok().as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins ({}=*)", CORS_ORIGINS_ENV);
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match s.parse::<HeaderValue>() {
                    Ok(hv) => Some(hv),
                    Err(e) => {
                        tracing::warn!("CORS: invalid origin '{}': {}", s, e);
                        None
                    }
                })
                .collect();

            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origins in {}, using localhost", CORS_ORIGINS_ENV);
                restricted_cors(localhost_origins())
            } else {
                tracing::info!(origins = allowed.len(), "CORS: custom origins");
                restricted_cors(allowed)
            }
        }
        None => restricted_cors(localhost_origins()),
    }
}

fn localhost_origins() -> Vec<HeaderValue> {
    [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .map(HeaderValue::from_static)
    .collect()
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit,
/// authentication (when `MATERIA_API_KEY` is set).
pub fn create_router(state: AppState) -> Router {
    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED; set {} to require a bearer token",
            API_KEY_ENV
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/stats", get(handlers::stats_handler))
        .route("/report", get(handlers::report_handler))
        .route("/rules", get(handlers::rules_handler).post(handlers::ingest_handler))
        .route("/rules/search", get(handlers::search_handler))
        .route("/score", post(handlers::score_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the API until Ctrl+C.
pub async fn run_server(addr: &str, store: RuleStore) -> Result<(), MateriaError> {
    let router = create_router(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MateriaError::Io(format!("bind {}: {}", addr, e)))?;

    tracing::info!("Materia HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MateriaError::Io(format!("server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
