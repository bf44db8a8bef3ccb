//! HTTP entry point: an axum router exposing the rendering function.
//!
//! ```text
//! GET|POST /api/htmltemplating   query: htmlTemplate, htmlUrl, responseType
//!                                body (JSON): any of the above + htmlContent, data, options
//! GET      /health
//! ```

use crate::config::ServiceConfig;
use crate::output::Artifact;
use crate::process::process;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Route of the rendering function.
pub const FUNCTION_ROUTE: &str = "/api/htmltemplating";

/// Shared, read-only state handed to every request.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "htmltemplating",
    })
}

/// Build the application router.
pub fn router(config: ServiceConfig) -> Router {
    let body_limit = config.max_body_bytes;
    Router::new()
        .route(FUNCTION_ROUTE, get(render_handler).post(render_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(config))
}

/// The rendering function itself.
pub async fn render_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Artifact {
    let body = parse_body(&body);
    process(&query, body.as_ref(), &state.config).await
}

/// An empty or non-JSON body counts as no body.
fn parse_body(raw: &[u8]) -> Option<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring request body that is not JSON: {}", e);
            None
        }
    }
}

impl IntoResponse for Artifact {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body.into_bytes(),
        )
            .into_response()
    }
}
