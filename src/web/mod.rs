// Web server: Axum JSON API over the same ToolService as the MCP server.
//
// Everything except /health requires `Authorization: Bearer <token>`
// matching TOXWATCH_API_TOKEN. The server refuses to start without a token.

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::ToolService;

pub mod auth;
pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: ToolService,
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(service: ToolService, port: u16, bind: &str) -> Result<()> {
    if !service.requires_token() {
        anyhow::bail!("TOXWATCH_API_TOKEN must be set to run the web server");
    }

    let app = build_router(AppState { service });

    let addr = format!("{bind}:{port}");
    info!("toxwatch API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let protected_api = Router::new()
        .route("/api/classify", post(handlers::classify))
        .route("/api/analyze", post(handlers::analyze))
        .route("/mcp", post(handlers::mcp))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    let public_api = Router::new().route("/health", get(health));

    Router::new()
        .merge(protected_api)
        .merge(public_api)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "status": "ok" })),
    )
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}
