//! JSON HTTP API.
//!
//! Exposes one shared diagnostic session and the feedback ledger to
//! browser or field-tablet clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Ask a question (`{ "question", "use_history"? }`) |
//! | `POST` | `/api/clear-history` | Reset the shared conversation |
//! | `GET`  | `/api/knowledge-summary` | Entry counts of the loaded knowledge base |
//! | `POST` | `/api/feedback` | Record a judgment on an answer |
//! | `GET`  | `/api/stats` | Accuracy stats plus the most recent feedback |
//! | `GET`  | `/api/export` | Feedback as CSV |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `rate_limited` (429), `engine_unavailable`
//! (503), `engine_error` (502), `timeout` (504), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::ask::build_session;
use crate::config::Config;
use crate::error::{EngineError, LedgerError};
use crate::feedback::{FeedbackLedger, LedgerSummary};
use crate::models::{ConfidenceTier, DiagnosticResult, FeedbackRecord, Judgment, KnowledgeSummary};
use crate::session::SessionEngine;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionEngine>,
    pub ledger: Arc<FeedbackLedger>,
}

/// Starts the HTTP server.
///
/// Loads the knowledge base, opens the ledger and binds to `[server].bind`.
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let session = build_session(config)?;
    let ledger = FeedbackLedger::open(&config.feedback.dir)?;

    let state = AppState {
        session: Arc::new(session),
        ledger: Arc::new(ledger),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "HTTP server listening");
    println!("Lift diagnostics API listening on http://{}", config.server.bind);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/clear-history", post(handle_clear_history))
        .route("/api/knowledge-summary", get(handle_knowledge_summary))
        .route("/api/feedback", post(handle_feedback))
        .route("/api/stats", get(handle_stats))
        .route("/api/export", get(handle_export))
        .route("/health", get(handle_health))
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

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::EmptyQuestion => bad_request(message),
            EngineError::Disabled | EngineError::MissingApiKey(_) => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "engine_unavailable", message)
            }
            EngineError::RateLimited(_) => {
                AppError::new(StatusCode::TOO_MANY_REQUESTS, "rate_limited", message)
            }
            EngineError::Timeout(_) => AppError::new(StatusCode::GATEWAY_TIMEOUT, "timeout", message),
            _ => AppError::new(StatusCode::BAD_GATEWAY, "engine_error", message),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        error!(error = %err, "feedback ledger failure");
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
    }
}

/// Run a ledger operation on the blocking pool; the ledger does synchronous
/// file I/O under its writer lock.
async fn with_ledger<T, F>(ledger: &Arc<FeedbackLedger>, op: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&FeedbackLedger) -> Result<T, LedgerError> + Send + 'static,
{
    let ledger = Arc::clone(ledger);
    tokio::task::spawn_blocking(move || op(&ledger))
        .await
        .map_err(|e| {
            error!(error = %e, "feedback ledger task failed");
            AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string())
        })?
        .map_err(AppError::from)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default = "default_use_history")]
    use_history: bool,
}

fn default_use_history() -> bool {
    true
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<DiagnosticResult>, AppError> {
    let result = state.session.query(&req.question, req.use_history).await?;
    Ok(Json(result))
}

// ============ POST /api/clear-history ============

async fn handle_clear_history(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.session.clear_history().await;
    Json(serde_json::json!({ "status": "ok" }))
}

// ============ GET /api/knowledge-summary ============

async fn handle_knowledge_summary(State(state): State<AppState>) -> Json<KnowledgeSummary> {
    Json(state.session.knowledge().summary())
}

// ============ POST /api/feedback ============

#[derive(Deserialize)]
struct FeedbackRequest {
    query: String,
    response: String,
    judgment: String,
    #[serde(default)]
    confidence_tier: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

async fn handle_feedback(
    State(state): State<AppState>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackRecord>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let judgment: Judgment = req.judgment.parse().map_err(bad_request)?;
    let tier = match req.confidence_tier.as_deref() {
        Some(t) => t.parse::<ConfidenceTier>().map_err(bad_request)?,
        None => ConfidenceTier::Medium,
    };

    let record = with_ledger(&state.ledger, move |ledger| {
        ledger.add_feedback(&req.query, &req.response, judgment, tier, req.notes.as_deref())
    })
    .await?;
    Ok(Json(record))
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<LedgerSummary>, AppError> {
    let summary = with_ledger(&state.ledger, |ledger| ledger.summary()).await?;
    Ok(Json(summary))
}

// ============ GET /api/export ============

async fn handle_export(State(state): State<AppState>) -> Result<Response, AppError> {
    let csv = with_ledger(&state.ledger, |ledger| ledger.export_csv()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"feedback.csv\""),
        ],
        csv,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::test_support::sample_kb;
    use crate::session::test_support::ScriptedEngine;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const REPLY: &str = "# F01 02\nKonfidenz: HOCH\nSeite: 113\n1. Kontakte prüfen\n";

    fn app(engine: ScriptedEngine) -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        let state = AppState {
            session: Arc::new(SessionEngine::new(
                Arc::new(sample_kb()),
                Arc::new(engine),
                &Config::minimal(),
            )),
            ledger: Arc::new(FeedbackLedger::open(dir.path()).unwrap()),
        };
        (dir, state)
    }

    async fn call(state: &AppState, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_structured_result() {
        let (_dir, state) = app(ScriptedEngine::replying(REPLY));
        let (status, body) = call(
            &state,
            post_json("/api/query", serde_json::json!({ "question": "F01 02?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let v = json(&body);
        assert_eq!(v["confidence_tier"], "HIGH");
        assert_eq!(v["codes_referenced"], serde_json::json!(["F01 02"]));
        assert_eq!(v["manual_pages"], serde_json::json!([113]));
        assert_eq!(state.session.turn_count().await, 2);
    }

    #[tokio::test]
    async fn test_blank_question_is_bad_request() {
        let (_dir, state) = app(ScriptedEngine::replying(REPLY));
        let (status, body) = call(
            &state,
            post_json("/api/query", serde_json::json!({ "question": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_disabled_engine_is_unavailable() {
        let (_dir, state) = app(ScriptedEngine::new(vec![Err(EngineError::Disabled)]));
        let (status, body) = call(
            &state,
            post_json("/api/query", serde_json::json!({ "question": "F01 02?" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json(&body)["error"]["code"], "engine_unavailable");
    }

    #[tokio::test]
    async fn test_clear_history() {
        let (_dir, state) = app(ScriptedEngine::replying(REPLY));
        state.session.query("F01 02?", true).await.unwrap();
        let (status, _) = call(
            &state,
            post_json("/api/clear-history", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.session.turn_count().await, 0);
    }

    #[tokio::test]
    async fn test_knowledge_summary() {
        let (_dir, state) = app(ScriptedEngine::replying(REPLY));
        let req = Request::get("/api/knowledge-summary").body(Body::empty()).unwrap();
        let (status, body) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let v = json(&body);
        assert_eq!(v["manufacturer"], "via");
        assert_eq!(v["error_codes"], 3);
    }

    #[tokio::test]
    async fn test_feedback_then_stats_and_export() {
        let (_dir, state) = app(ScriptedEngine::replying(REPLY));
        for judgment in ["correct", "correct", "correct", "incorrect"] {
            let (status, _) = call(
                &state,
                post_json(
                    "/api/feedback",
                    serde_json::json!({
                        "query": "F01 02",
                        "response": "Sicherheitskreis",
                        "judgment": judgment,
                        "confidence_tier": "HIGH"
                    }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let req = Request::get("/api/stats").body(Body::empty()).unwrap();
        let (_, body) = call(&state, req).await;
        let v = json(&body);
        assert_eq!(v["stats"]["accuracy"], 75.0);
        assert_eq!(v["recent"][0]["id"], 4);

        let req = Request::get("/api/export").body(Body::empty()).unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text.lines().count(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_feedback_gets_distinct_ids() {
        let (_dir, state) = app(ScriptedEngine::replying(REPLY));
        let mut handles = Vec::new();
        for i in 0..8 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                let (status, body) = call(
                    &state,
                    post_json(
                        "/api/feedback",
                        serde_json::json!({
                            "query": format!("F01 0{}", i),
                            "response": "r",
                            "judgment": "correct"
                        }),
                    ),
                )
                .await;
                assert_eq!(status, StatusCode::OK);
                json(&body)["id"].as_u64().unwrap()
            }));
        }

        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
        assert_eq!(state.ledger.get_stats().unwrap().total_validations, 8);
    }

    #[tokio::test]
    async fn test_invalid_judgment_rejected() {
        let (_dir, state) = app(ScriptedEngine::replying(REPLY));
        let (status, body) = call(
            &state,
            post_json(
                "/api/feedback",
                serde_json::json!({ "query": "q", "response": "r", "judgment": "maybe" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json(&body)["error"]["message"]
            .as_str()
            .unwrap()
            .contains("maybe"));
        assert_eq!(state.ledger.get_stats().unwrap().total_validations, 0);
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, state) = app(ScriptedEngine::replying(REPLY));
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "ok");
    }
}
