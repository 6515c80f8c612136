//! HTTP API for submitting analyses and retrieving reports.
//!
//! Submission only enqueues; a [`Worker`](crate::worker::Worker) running in
//! this or another process picks the job up.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `{prefix}/v1/analysis` | Validate and enqueue a job (202) |
//! | `GET`  | `{prefix}/v1/analysis/{id}` | Job status, plus the error for failed jobs |
//! | `GET`  | `{prefix}/v1/reports/{id}` | The completed report |
//! | `GET`  | `{prefix}/v1/health` | Health check |
//! | `GET`  | `/` | Service banner |
//!
//! `{prefix}` is `[server] api_prefix` (default `/api`).
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "analysis job not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `report_not_ready` (404),
//! `internal` (500).

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use cortex_atlas_core::models::{AnalysisOptions, Document, JobStatus, Report};
use cortex_atlas_core::store::JobStore;

use crate::config::Config;
use crate::input::validate_submission;
use crate::sqlite_store::SqliteJobStore;

/// Rough processing estimate returned on submission.
const ESTIMATED_TIME_SECONDS: u64 = 45;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn JobStore>,
}

/// Starts the API server against the configured SQLite database.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = SqliteJobStore::open(config).await?;
    run_server_with_store(config, Arc::new(store)).await
}

/// Starts the API server over an already constructed job store.
pub async fn run_server_with_store(config: &Config, store: Arc<dyn JobStore>) -> anyhow::Result<()> {
    let app = router(store, &config.server.api_prefix);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Cortex Atlas API listening on http://{}", config.server.bind);
    tracing::info!(bind = %config.server.bind, "api server started");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the application router. `api_prefix` is either empty or starts with `/`.
pub fn router(store: Arc<dyn JobStore>, api_prefix: &str) -> Router {
    let prefix = api_prefix.trim_end_matches('/');
    let state = AppState { store };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route(&format!("{}/v1/health", prefix), get(handle_health))
        .route(&format!("{}/v1/analysis", prefix), post(handle_submit))
        .route(&format!("{}/v1/analysis/{{id}}", prefix), get(handle_status))
        .route(&format!("{}/v1/reports/{{id}}", prefix), get(handle_report))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found() -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: "analysis job not found".to_string(),
    }
}

fn report_not_ready() -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "report_not_ready".to_string(),
        message: "report not available yet".to_string(),
    }
}

// ============ GET / and health ============

#[derive(Serialize)]
struct RootResponse {
    service: &'static str,
    version: &'static str,
    status: &'static str,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        service: "cortex-atlas",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ============ POST /v1/analysis ============

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    subject_id: String,
    documents: Vec<Document>,
    #[serde(default)]
    options: Option<AnalysisOptions>,
}

#[derive(Serialize)]
struct SubmitResponse {
    analysis_id: String,
    status: JobStatus,
    estimated_time_seconds: u64,
}

/// Parse and validate a submission body before anything is enqueued.
fn parse_submission(body: &[u8]) -> Result<SubmitRequest, AppError> {
    let mut req: SubmitRequest = serde_json::from_slice(body)
        .map_err(|e| bad_request(format!("invalid request body: {}", e)))?;

    req.subject_id = req.subject_id.trim().to_string();
    validate_submission(&req.subject_id, &req.documents).map_err(|e| bad_request(e.to_string()))?;

    Ok(req)
}

async fn handle_submit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let req = parse_submission(&body)?;

    let analysis_id = state
        .store
        .enqueue(&req.subject_id, &req.documents, req.options.as_ref())
        .await?;

    tracing::info!(
        analysis_id = %analysis_id,
        subject_id = %req.subject_id,
        documents = req.documents.len(),
        "analysis submitted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            analysis_id,
            status: JobStatus::Queued,
            estimated_time_seconds: ESTIMATED_TIME_SECONDS,
        }),
    ))
}

// ============ GET /v1/analysis/{id} ============

#[derive(Serialize)]
struct StatusResponse {
    analysis_id: String,
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let job = state.store.fetch(&id).await?.ok_or_else(not_found)?;
    Ok(Json(StatusResponse {
        analysis_id: job.analysis_id,
        status: job.status,
        error: job.error,
    }))
}

// ============ GET /v1/reports/{id} ============

async fn handle_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Report>, AppError> {
    let job = state.store.fetch(&id).await?.ok_or_else(not_found)?;
    job.report.map(Json).ok_or_else(report_not_ready)
}
