// JSON handlers. Each one decodes its body into a ToolCall and maps
// ToolError onto an HTTP status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use super::{api_error, AppState};
use crate::api::{mcp, AnalyzeUserArgs, ClassifyTextArgs, ToolCall, ToolError};

/// POST /api/classify `{text}` → `{label, score}`
pub async fn classify(State(state): State<AppState>, Json(args): Json<ClassifyTextArgs>) -> Response {
    respond(&state, ToolCall::ClassifyText(args)).await
}

/// POST /api/analyze `{username, max_posts}` → user analysis
pub async fn analyze(State(state): State<AppState>, Json(args): Json<AnalyzeUserArgs>) -> Response {
    respond(&state, ToolCall::AnalyzeUser(args)).await
}

/// POST /mcp: a single JSON-RPC request over HTTP.
pub async fn mcp(State(state): State<AppState>, Json(request): Json<Value>) -> Response {
    match mcp::handle_request(&state.service, request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn respond(state: &AppState, call: ToolCall) -> Response {
    match state.service.call(call).await {
        Ok(output) => Json(output).into_response(),
        Err(e) => api_error(status_for(&e), &e.to_string()),
    }
}

fn status_for(error: &ToolError) -> StatusCode {
    match error {
        ToolError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ToolError::NoData(_) => StatusCode::NOT_FOUND,
        ToolError::Platform(_) => StatusCode::BAD_GATEWAY,
        ToolError::Unauthorized => StatusCode::UNAUTHORIZED,
    }
}
