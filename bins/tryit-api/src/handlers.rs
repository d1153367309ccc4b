// HTTP route handlers for the Try It API

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};
use tryit_common::types::{Language, RunRequest, RunResponse, TracePayload};
use tryit_engine::EngineError;
use uuid::Uuid;

use crate::metrics;
use crate::AppState;

/// Safety limit to keep pathological payloads away from the engine.
const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB

/// Request-level failures.
///
/// Everything here is distinct from "the user's code failed": broken code
/// still produces a 200 with `error=true` / `success=false`. These map to
/// 4xx (caller mistakes) and 5xx (service trouble).
#[derive(Debug)]
pub enum ApiError {
    MissingCode(&'static str),
    SourceTooLarge,
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingCode(language) => (
                StatusCode::BAD_REQUEST,
                format!("{} code is required.", language),
            ),
            ApiError::SourceTooLarge => (
                StatusCode::BAD_REQUEST,
                format!(
                    "Source code exceeds the maximum size of {} bytes.",
                    MAX_SOURCE_CODE_BYTES
                ),
            ),
            ApiError::Engine(EngineError::InterpreterNotFound) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Python executable not found on the server.".to_string(),
            ),
            ApiError::Engine(e) => {
                error!(error = %e, "Execution infrastructure failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Code execution failed on the server.".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "success": false,
            "statusCode": status.as_u16(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

/// Reject missing, empty, or oversized code before anything is allocated
/// or spawned.
fn require_code(request: &RunRequest, language: &'static str) -> Result<String, ApiError> {
    match &request.code {
        Some(code) if !code.trim().is_empty() => {
            if code.len() > MAX_SOURCE_CODE_BYTES {
                return Err(ApiError::SourceTooLarge);
            }
            Ok(code.clone())
        }
        _ => Err(ApiError::MissingCode(language)),
    }
}

/// POST /api/code/run-cpp
pub async fn run_cpp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    run_language(state, payload, Language::Cpp, "C++", "run-cpp").await
}

/// POST /api/code/run-python
pub async fn run_python(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    run_language(state, payload, Language::Python, "Python", "run-python").await
}

async fn run_language(
    state: Arc<AppState>,
    payload: RunRequest,
    language: Language,
    language_label: &'static str,
    endpoint: &'static str,
) -> Result<Json<RunResponse>, ApiError> {
    let code = match require_code(&payload, language_label) {
        Ok(code) => code,
        Err(e) => {
            metrics::REQUESTS
                .with_label_values(&[endpoint, "bad_request"])
                .inc();
            return Err(e);
        }
    };

    let request_id = Uuid::new_v4();
    info!(
        request_id = %request_id,
        endpoint = endpoint,
        source_bytes = code.len(),
        "Received run request"
    );

    metrics::EXECUTIONS_IN_FLIGHT.inc();
    let result = state.engine.run(language, &code).await;
    metrics::EXECUTIONS_IN_FLIGHT.dec();

    match result {
        Ok(response) => {
            let outcome = if response.error { "user_error" } else { "ok" };
            metrics::REQUESTS.with_label_values(&[endpoint, outcome]).inc();
            info!(
                request_id = %request_id,
                error = response.error,
                kind = ?response.kind,
                "Run request finished"
            );
            Ok(Json(response))
        }
        Err(e) => {
            metrics::REQUESTS
                .with_label_values(&[endpoint, "infra_error"])
                .inc();
            error!(request_id = %request_id, error = %e, "Run request failed");
            Err(e.into())
        }
    }
}

/// POST /api/code/visualize-python
pub async fn visualize_python(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<TracePayload>, ApiError> {
    let endpoint = "visualize-python";
    let code = match require_code(&payload, "Python") {
        Ok(code) => code,
        Err(e) => {
            metrics::REQUESTS
                .with_label_values(&[endpoint, "bad_request"])
                .inc();
            return Err(e);
        }
    };

    let request_id = Uuid::new_v4();
    info!(
        request_id = %request_id,
        source_bytes = code.len(),
        "Received visualize request"
    );

    metrics::EXECUTIONS_IN_FLIGHT.inc();
    let result = state.engine.trace(&code).await;
    metrics::EXECUTIONS_IN_FLIGHT.dec();

    match result {
        Ok(trace) => {
            let outcome = if trace.success { "ok" } else { "user_error" };
            metrics::REQUESTS.with_label_values(&[endpoint, outcome]).inc();
            info!(
                request_id = %request_id,
                success = trace.success,
                events = trace.events.len(),
                truncated = trace.truncated,
                "Visualize request finished"
            );
            Ok(Json(trace))
        }
        Err(e) => {
            metrics::REQUESTS
                .with_label_values(&[endpoint, "infra_error"])
                .inc();
            error!(request_id = %request_id, error = %e, "Visualize request failed");
            Err(e.into())
        }
    }
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus exposition
pub async fn metrics_exposition() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
