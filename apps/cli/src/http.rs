//! HTTP surface for `toolscout serve`: manual triggers, status, listing,
//! and the auto-trigger switch.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use toolscout_core::{AutoTrigger, BatchSummary, EnrichmentEngine, RecordOutcome, SilentProgress};
use toolscout_shared::{EnrichedPage, PipelineStatus, ToolscoutError};

/// Shared handler state.
#[derive(Clone)]
pub(crate) struct AppState {
    pub engine: Arc<EnrichmentEngine>,
    pub trigger: AutoTrigger,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/pipeline/run", post(run_all))
        .route("/api/pipeline/run/:id", post(run_one))
        .route("/api/pipeline/status", get(status))
        .route(
            "/api/pipeline/auto-trigger",
            get(get_auto_trigger).put(put_auto_trigger),
        )
        .route("/api/tools", get(list_tools))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug)]
pub(crate) struct ApiError(ToolscoutError);

impl From<ToolscoutError> for ApiError {
    fn from(e: ToolscoutError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            ToolscoutError::NotPending { .. } => (StatusCode::NOT_FOUND, "NOT_PENDING"),
            e => {
                error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/pipeline/run
async fn run_all(State(state): State<AppState>) -> ApiResult<BatchSummary> {
    info!("manual batch run requested");
    let summary = state.engine.run_all_pending(&SilentProgress).await?;
    Ok(Json(summary))
}

/// POST /api/pipeline/run/:id
async fn run_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RecordOutcome> {
    info!(%id, "manual single run requested");
    let outcome = state.engine.run_single(&id).await?;
    Ok(Json(outcome))
}

/// GET /api/pipeline/status
async fn status(State(state): State<AppState>) -> ApiResult<PipelineStatus> {
    Ok(Json(state.engine.pipeline_status().await?))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_page_size")]
    page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

/// GET /api/tools?page=&page_size=
async fn list_tools(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<EnrichedPage> {
    Ok(Json(
        state
            .engine
            .enriched_page(query.page, query.page_size)
            .await?,
    ))
}

#[derive(Debug, Serialize, Deserialize)]
struct AutoTriggerBody {
    enabled: bool,
}

/// GET /api/pipeline/auto-trigger
async fn get_auto_trigger(State(state): State<AppState>) -> Json<AutoTriggerBody> {
    Json(AutoTriggerBody {
        enabled: state.trigger.is_enabled(),
    })
}

/// PUT /api/pipeline/auto-trigger
async fn put_auto_trigger(
    State(state): State<AppState>,
    Json(body): Json<AutoTriggerBody>,
) -> Json<AutoTriggerBody> {
    state.trigger.set(body.enabled);
    Json(AutoTriggerBody {
        enabled: state.trigger.is_enabled(),
    })
}
