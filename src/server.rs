//! HTTP surface: axum router and handlers
//!
//! The canvas UI talks to this API. Transparency endpoints (preview) are
//! read-only; execute/stream drive the full lifecycle.

use axum::extract::{Path, Query, State};
use axum::http::{header, Method};
use axum::response::sse::Sse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::error::Result;
use crate::models::{AgentRole, Artifact, ControlPosition};
use crate::registry::{ExecutionSummary, Registry};
use crate::relay::{self, WireStream};
use crate::roster::{self, Roster};
use crate::steering::PromptPlan;

pub struct AppState {
    pub config: Config,
    pub registry: Arc<Registry>,
    pub store: Arc<ArtifactStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<ArtifactStore>) -> Self {
        // abandoned pending runs get the same patience as a stalled stream
        let registry = Arc::new(Registry::new(
            store.clone(),
            config.execution_cap,
            config.stall_timeout,
        ));
        Self {
            config,
            registry,
            store,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// API Types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct SteeringRequest {
    pub query: String,
    #[serde(default)]
    pub position: ControlPosition,
    #[serde(default)]
    pub role: AgentRole,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub execution_id: String,
    /// Full prompt breakdown, echoed for the transparency panel.
    pub prompt: PromptPlan,
    pub stream_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct ArtifactList {
    pub total: usize,
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionList {
    pub total: usize,
    pub executions: Vec<ExecutionSummary>,
}

#[derive(Debug, Deserialize)]
pub struct RosterRequest {
    pub goal: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════
// Handlers
// ═══════════════════════════════════════════════════════════════

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model: state.config.model.clone(),
        timestamp: Utc::now(),
    })
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "synapse",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "prompt_preview": "/api/v1/prompt/preview",
            "execute": "/api/v1/agent/execute",
            "stream": "/api/v1/agent/stream/{execution_id}",
            "generate_roster": "/api/v1/agent/generate-roster",
            "get_artifact": "/api/v1/artifacts/{artifact_id}",
            "list_artifacts": "/api/v1/artifacts",
            "list_executions": "/api/v1/executions",
        },
    }))
}

/// Show the exact prompt and temperature a position would produce, without
/// executing anything.
async fn preview_prompt(Json(req): Json<SteeringRequest>) -> Result<Json<PromptPlan>> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(crate::Error::Validation("query must not be empty".into()));
    }
    Ok(Json(PromptPlan::build(query, req.position, req.role)))
}

/// Create an execution and return immediately; generation starts when the
/// caller connects to the stream URL.
async fn execute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SteeringRequest>,
) -> Result<Json<ExecuteResponse>> {
    let execution = state
        .registry
        .create(&req.query, req.position, req.role)
        .await?;

    let prompt = PromptPlan::build(&execution.query, execution.position, execution.role);
    Ok(Json(ExecuteResponse {
        stream_url: format!("/api/v1/agent/stream/{}", execution.id),
        execution_id: execution.id,
        prompt,
    }))
}

async fn stream_execution(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
) -> Result<Sse<WireStream>> {
    relay::subscribe(state.registry.clone(), &state.config, &execution_id).await
}

async fn get_artifact(
    State(state): State<Arc<AppState>>,
    Path(artifact_id): Path<String>,
) -> Result<Json<Artifact>> {
    Ok(Json(state.store.get(&artifact_id).await?))
}

async fn list_artifacts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Json<ArtifactList> {
    let artifacts = state.store.list(params.limit).await;
    Json(ArtifactList {
        total: artifacts.len(),
        artifacts,
    })
}

async fn list_executions(State(state): State<Arc<AppState>>) -> Json<ExecutionList> {
    let executions = state.registry.list().await;
    Json(ExecutionList {
        total: executions.len(),
        executions,
    })
}

async fn generate_roster(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RosterRequest>,
) -> Result<Json<Roster>> {
    Ok(Json(roster::generate_roster(&state.config, &req.goal).await?))
}

/// Build the application router with CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v1/prompt/preview", post(preview_prompt))
        .route("/api/v1/agent/execute", post(execute))
        .route("/api/v1/agent/stream/:execution_id", get(stream_execution))
        .route("/api/v1/agent/generate-roster", post(generate_roster))
        .route("/api/v1/artifacts", get(list_artifacts))
        .route("/api/v1/artifacts/:artifact_id", get(get_artifact))
        .route("/api/v1/executions", get(list_executions))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
