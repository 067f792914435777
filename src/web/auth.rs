// Bearer-token middleware for the JSON API.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::AppState;

/// Reject requests without a matching `Authorization: Bearer` header.
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if state.service.token_is_valid(token) => next.run(request).await,
        _ => super::api_error(StatusCode::UNAUTHORIZED, "Authentication required"),
    }
}
