use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use khabar_core::hybrid::{hybrid_retrieve, PrecomputedRanking};
use khabar_core::persist::ArtifactPaths;
use khabar_core::{DocId, EngineConfig, RankedDoc, RankingEngine};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

fn clamp_k(k: usize) -> usize { k.clamp(1, 100) }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    /// False while no snapshot could be loaded; results are then always empty.
    pub ready: bool,
    pub results: Vec<RankedDoc>,
}

#[derive(Deserialize)]
pub struct HybridRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Externally computed (doc_id, similarity) pairs.
    #[serde(default)]
    pub semantic: Vec<(DocId, f64)>,
}

#[derive(Serialize)]
pub struct HybridResponse {
    pub query: String,
    pub ready: bool,
    pub doc_ids: Vec<DocId>,
}

/// Loaded engine, swapped wholesale on reload. Readers clone the inner `Arc`
/// and never hold the lock while ranking.
pub type SharedEngine = Arc<RwLock<Option<Arc<RankingEngine>>>>;

#[derive(Clone)]
pub struct AppState {
    pub artifacts: ArtifactPaths,
    pub config: EngineConfig,
    pub engine: SharedEngine,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Try to load the snapshot under `artifacts`. A failed load leaves the
    /// state not ready instead of failing startup.
    pub fn new(artifacts: ArtifactPaths, config: EngineConfig, admin_token: Option<String>) -> Self {
        let engine = match RankingEngine::load(&artifacts, config.ranking.clone()) {
            Ok(e) => Some(Arc::new(e)),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), root = %artifacts.root.display(), "no usable snapshot; serving empty results");
                None
            }
        };
        Self { artifacts, config, engine: Arc::new(RwLock::new(engine)), admin_token }
    }

    pub fn engine(&self) -> Option<Arc<RankingEngine>> { self.engine.read().clone() }

    pub fn is_ready(&self) -> bool { self.engine.read().is_some() }
}

pub fn build_app(index_dir: String, config: EngineConfig) -> Result<Router> {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let state = AppState::new(ArtifactPaths::new(&index_dir), config, admin_token);
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/hybrid", post(hybrid_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let k = clamp_k(params.k);
    let engine = state.engine();
    let ready = engine.is_some();
    let results = match engine {
        Some(engine) => engine.rank(&params.q, k),
        None => Vec::new(),
    };
    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, k, hits = results.len(), ready, "search");
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits: results.len(), ready, results })
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Json<serde_json::Value> {
    let found = state
        .engine()
        .and_then(|engine| engine.document(&doc_id).and_then(|d| serde_json::to_value(d).ok()));
    match found {
        Some(doc) => Json(doc),
        None => Json(serde_json::json!({ "error": "not found" })),
    }
}

pub async fn hybrid_handler(State(state): State<AppState>, Json(req): Json<HybridRequest>) -> Json<HybridResponse> {
    let k = clamp_k(req.k);
    let engine = state.engine();
    let ready = engine.is_some();
    let doc_ids = match engine {
        Some(engine) => {
            let semantic = PrecomputedRanking::new(req.semantic);
            hybrid_retrieve(&engine, &semantic, &req.query, k)
        }
        None => Vec::new(),
    };
    Json(HybridResponse { query: req.query, ready, doc_ids })
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let artifacts = state.artifacts.clone();
    let ranking = state.config.ranking.clone();
    let loaded = tokio::task::spawn_blocking(move || RankingEngine::load(&artifacts, ranking))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    match loaded {
        Ok(engine) => {
            let num_docs = engine.index().num_docs();
            *state.engine.write() = Some(Arc::new(engine));
            tracing::info!(num_docs, "snapshot reloaded");
            Ok(Json(serde_json::json!({ "reloaded": true, "num_docs": num_docs })))
        }
        Err(e) => {
            // the previous snapshot, if any, keeps serving
            tracing::warn!(error = %format!("{e:#}"), "reload failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("reload failed: {e:#}")))
        }
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
