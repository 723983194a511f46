// Exposure Ledger - Read-only HTTP facade
//
// Serves the files written by `exposure-ledger unify` / `aggregate`.
// Loaded once at startup; never runs the pipeline.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use exposure_ledger::output::{read_aggregation, read_unified};
use exposure_ledger::{
    normalize_name, search_securities, AggregationOutput, EngineConfig, Entity, SecurityNormalizer,
    UnifiedDataset,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0} not available; run the CLI to produce it")]
    NotLoaded(&'static str),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Missing query parameter: {0}")]
    MissingParameter(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MissingParameter(_) => StatusCode::BAD_REQUEST,
        };

        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// State + responses
// ============================================================================

/// Shared application state (immutable after startup)
#[derive(Clone)]
struct AppState {
    config: Arc<EngineConfig>,
    unified: Option<Arc<UnifiedDataset>>,
    aggregation: Option<Arc<AggregationOutput>>,
}

impl AppState {
    fn unified(&self) -> Result<&UnifiedDataset, ApiError> {
        self.unified.as_deref().ok_or(ApiError::NotLoaded("unified entities"))
    }

    fn aggregation(&self) -> Result<&AggregationOutput, ApiError> {
        self.aggregation.as_deref().ok_or(ApiError::NotLoaded("aggregation output"))
    }
}

/// API Response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data })
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    entities_loaded: bool,
    aggregation_loaded: bool,
}

#[derive(Debug, Serialize)]
struct SecurityHit {
    asset: String,
    total_investment: f64,
    funding_sources: usize,
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<usize>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::ok(HealthResponse {
        status: "OK",
        version: exposure_ledger::VERSION,
        entities_loaded: state.unified.is_some(),
        aggregation_loaded: state.aggregation.is_some(),
    })
}

/// GET /api/entities
async fn get_entities(State(state): State<AppState>) -> ApiResult<Vec<Entity>> {
    Ok(ApiResponse::ok(state.unified()?.entities.clone()))
}

/// GET /api/entities/stats
async fn get_entity_stats(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    let metadata = &state.unified()?.metadata;
    Ok(ApiResponse::ok(json!({
        "generated_at": metadata.generated_at,
        "total_entities": metadata.total_entities,
        "sources": metadata.sources,
        "statistics": metadata.statistics,
    })))
}

/// GET /api/entities/:name - any known spelling, URL-encoded
async fn get_entity(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Entity> {
    let decoded = urlencoding::decode(&name)
        .unwrap_or_else(|_| name.clone().into())
        .into_owned();
    let key = normalize_name(&decoded);

    state
        .unified()?
        .entities
        .iter()
        .find(|e| e.normalized_key == key)
        .cloned()
        .map(ApiResponse::ok)
        .ok_or(ApiError::EntityNotFound(decoded))
}

/// GET /api/securities
async fn get_securities(State(state): State<AppState>) -> ApiResult<Vec<exposure_ledger::Security>> {
    Ok(ApiResponse::ok(state.aggregation()?.summary.securities.clone()))
}

/// GET /api/securities/search?q=&limit=
async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> ApiResult<Vec<SecurityHit>> {
    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or(ApiError::MissingParameter("q"))?;

    let limit = state.config.server.clamp_limit(params.limit);
    let normalizer = SecurityNormalizer::new(state.config.aggregation.group_share_classes);

    let hits = search_securities(&state.aggregation()?.summary.securities, &query, &normalizer, limit)
        .into_iter()
        .map(|s| SecurityHit {
            asset: s.asset.clone(),
            total_investment: s.total_investment,
            funding_sources: s.funding_sources.len(),
        })
        .collect();

    Ok(ApiResponse::ok(hits))
}

/// GET /api/discrepancies
async fn get_discrepancies(State(state): State<AppState>) -> ApiResult<exposure_ledger::DiscrepancyReport> {
    Ok(ApiResponse::ok(state.aggregation()?.discrepancies.clone()))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/entities", get(get_entities))
        .route("/entities/stats", get(get_entity_stats))
        .route("/entities/:name", get(get_entity))
        .route("/securities", get(get_securities))
        .route("/securities/search", get(search))
        .route("/discrepancies", get(get_discrepancies))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[derive(Parser)]
#[command(name = "exposure-server", version, about = "Read-only API over exposure-ledger output")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the CLI output (overrides [output].dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,
}

/// A missing or unreadable output leaves that half of the API offline
fn load_optional<T>(what: &str, loaded: anyhow::Result<T>) -> Option<Arc<T>> {
    match loaded {
        Ok(value) => {
            info!(output = what, "loaded");
            Some(Arc::new(value))
        }
        Err(e) => {
            warn!(output = what, error = %e, "not loaded");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("exposure_server=info,exposure_ledger=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = EngineConfig::load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.output {
        config.output.dir = dir;
    }

    let state = AppState {
        unified: load_optional("unified entities", read_unified(&config.output)),
        aggregation: load_optional("aggregation", read_aggregation(&config.output)),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!(addr = %args.addr, "exposure server listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
