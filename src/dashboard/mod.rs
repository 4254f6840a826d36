use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::LabConfig;
use crate::error::LabError;
use crate::gate::{
    looks_like_safe_script_payload, markup::matched_script_patterns, safe_parse, sanitize_markup,
    target_rule,
};
use crate::jobs::{JobKind, JobRecord, JobStatus, Outcome};
use crate::orchestrator::{AttackPayload, BroadcastNotifier, Orchestrator, Submission};
use crate::stats::AttackStatistics;

pub const BANNER: &str = "XSS & SSRF Attack Lab API";

#[derive(Clone)]
pub struct DashboardState {
    pub orchestrator: Orchestrator,
    pub events: BroadcastNotifier,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    pub payload: Option<String>,
    pub xss_payload: Option<String>,
    pub ssrf_payload: Option<String>,
    pub target_url: String,
    #[serde(default)]
    pub user_id: String,
}

impl SimulateRequest {
    fn into_submission(self, kind: JobKind) -> Result<Submission, LabError> {
        let missing = |field: &str| LabError::ValidationRejected(format!("{field} is required"));
        let payload = match kind {
            JobKind::Xss => AttackPayload::Xss(self.payload.ok_or_else(|| missing("payload"))?),
            JobKind::Ssrf => AttackPayload::Ssrf(self.payload.ok_or_else(|| missing("payload"))?),
            JobKind::Combined => AttackPayload::Combined {
                xss: self.xss_payload.ok_or_else(|| missing("xssPayload"))?,
                ssrf: self.ssrf_payload.ok_or_else(|| missing("ssrfPayload"))?,
            },
        };
        Ok(Submission::new(payload, self.target_url, self.user_id))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    success: bool,
    job_id: Uuid,
    status: JobStatus,
    outcome: Option<Outcome>,
}

#[derive(Serialize)]
struct HistoryResponse {
    success: bool,
    attacks: Vec<JobRecord>,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Deserialize)]
struct HistoryParams {
    kind: Option<String>,
}

#[derive(Deserialize)]
struct XssCheckRequest {
    payload: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct XssCheckResponse {
    sanitized: String,
    safe: bool,
    matched_patterns: Vec<&'static str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SsrfCheckRequest {
    target_url: String,
}

#[derive(Serialize)]
struct SsrfCheckResponse {
    allowed: bool,
    rule: String,
}

#[derive(Deserialize)]
struct ValidateRequest {
    text: String,
}

#[derive(Serialize)]
struct ValidateResponse {
    accepted: bool,
}

/// Maps [`LabError`] onto HTTP status codes.
pub struct ApiError(pub LabError);

impl From<LabError> for ApiError {
    fn from(err: LabError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(LabError::ValidationRejected(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LabError::ValidationRejected(_) => StatusCode::BAD_REQUEST,
            LabError::NotFound(_) => StatusCode::NOT_FOUND,
            LabError::StoreFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn parse_kind(raw: &str) -> Result<JobKind, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError(LabError::ValidationRejected(e)))
}

/// All API routes, without CORS.
pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/attacks/history", get(history_handler))
        .route("/api/attacks/:kind/simulate", post(simulate_handler))
        .route("/api/attacks/:kind/history", get(kind_history_handler))
        .route("/api/jobs/:id", get(job_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/events", get(events_handler))
        .route("/api/protection/xss", post(xss_check_handler))
        .route("/api/protection/ssrf", post(ssrf_check_handler))
        .route("/api/protection/validate", post(validate_handler))
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Invalid CORS origin, allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}

/// Serve the API until `shutdown` is cancelled.
pub async fn run_dashboard(
    config: &LabConfig,
    state: DashboardState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr: SocketAddr = config.listen_addr;
    let app = router(state).layer(cors_layer(config.cors_origin.as_deref()));

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind API server");
        e
    })?;
    tracing::info!(addr = %addr, "Starting API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn index_handler() -> &'static str {
    BANNER
}

async fn simulate_handler(
    State(state): State<DashboardState>,
    Path(kind): Path<String>,
    request: Result<Json<SimulateRequest>, JsonRejection>,
) -> Result<Json<SimulateResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let Json(request) = request?;
    let submission = request.into_submission(kind)?;

    let record = state.orchestrator.submit(submission).await?;

    Ok(Json(SimulateResponse {
        success: true,
        job_id: record.id,
        status: record.status,
        outcome: record.outcome,
    }))
}

async fn history_handler(
    State(state): State<DashboardState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let kind = params.kind.as_deref().map(parse_kind).transpose()?;
    Ok(Json(HistoryResponse {
        success: true,
        attacks: state.orchestrator.history(kind).await,
    }))
}

async fn kind_history_handler(
    State(state): State<DashboardState>,
    Path(kind): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(HistoryResponse {
        success: true,
        attacks: state.orchestrator.history(Some(kind)).await,
    }))
}

async fn job_handler(
    State(state): State<DashboardState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRecord>, ApiError> {
    Ok(Json(state.orchestrator.job(&id).await?))
}

async fn stats_handler(State(state): State<DashboardState>) -> Json<AttackStatistics> {
    Json(AttackStatistics::collect(state.orchestrator.store()).await)
}

async fn events_handler(
    State(state): State<DashboardState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|message| match message {
        Ok(event) => Event::default()
            .event("attack:update")
            .json_data(&event)
            .ok()
            .map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "Event subscriber lagged");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn xss_check_handler(
    request: Result<Json<XssCheckRequest>, JsonRejection>,
) -> Result<Json<XssCheckResponse>, ApiError> {
    let Json(request) = request?;
    Ok(Json(XssCheckResponse {
        sanitized: sanitize_markup(&request.payload),
        safe: looks_like_safe_script_payload(&request.payload),
        matched_patterns: matched_script_patterns(&request.payload),
    }))
}

async fn ssrf_check_handler(
    request: Result<Json<SsrfCheckRequest>, JsonRejection>,
) -> Result<Json<SsrfCheckResponse>, ApiError> {
    let Json(request) = request?;
    let rule = target_rule(&request.target_url);
    Ok(Json(SsrfCheckResponse {
        allowed: rule.allows(),
        rule: rule.to_string(),
    }))
}

async fn validate_handler(
    request: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let Json(request) = request?;
    Ok(Json(ValidateResponse {
        accepted: safe_parse(&request.text).is_some(),
    }))
}
